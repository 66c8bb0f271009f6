//! Global heartbeat.
//!
//! Once per tick every player and every monster is advanced by one step.
//! Each entity is processed in isolation: an error or panic while advancing
//! one is logged and the rest of the tick carries on.

use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, error, info, warn};
use mud_shared::GameEvent;
use tokio::time::{sleep, Instant};

use super::{info_lines, monster_ai, GameWorld, Outbound, SharedWorld};
use crate::entities::{effect, EffectOutcome, MonsterId, PlayerId};
use crate::error::TickError;
use crate::persistence::PersistenceHandle;

/// Run `step`, turning errors and panics into log lines
fn isolated(
    what: &str,
    out: &mut Vec<Outbound>,
    step: impl FnOnce() -> Result<Vec<Outbound>, TickError>,
) {
    match catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(events)) => out.extend(events),
        Ok(Err(e)) => warn!("Heartbeat skipped {}: {}", what, e),
        Err(_) => error!("Heartbeat step for {} panicked", what),
    }
}

fn died_this_tick(outcomes: &[EffectOutcome]) -> bool {
    outcomes
        .iter()
        .any(|o| matches!(o, EffectOutcome::Damage { died: true, .. }))
}

impl GameWorld {
    /// Advance the whole world by one tick
    pub fn tick(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();

        for id in self.player_ids() {
            isolated(&format!("player {}", id), &mut out, || self.tick_player(id, now));
        }

        let mut monsters: Vec<(String, MonsterId)> = self
            .rooms
            .iter()
            .flat_map(|(room, instance)| instance.monsters.iter().map(move |m| (room.clone(), m.id)))
            .collect();
        monsters.sort();
        for (room, id) in monsters {
            isolated(&format!("monster {} in {}", id, room), &mut out, || {
                self.tick_monster(&room, id, now)
            });
        }
        out
    }

    /// Effects, cooldowns, then death and revival
    fn tick_player(&mut self, id: PlayerId, now: Instant) -> Result<Vec<Outbound>, TickError> {
        let player = self.players.get_mut(&id).ok_or(TickError::MissingPlayer(id))?;
        let mut out = Vec::new();

        let mut died = false;
        if player.vitals.alive {
            let outcomes = effect::advance(&mut player.vitals, now);
            died = died_this_tick(&outcomes);
            out.extend(
                outcomes
                    .into_iter()
                    .map(|o| Outbound::to_room(&player.room, o.into_event(&player.name))),
            );
        }
        player.tick_cooldowns();

        if died {
            out.extend(self.handle_player_death(id));
        }
        out.extend(self.revive_if_due(id, now)?);
        Ok(out)
    }

    /// Death timer for a dead player; revives at the default room once it runs out
    fn revive_if_due(&mut self, id: PlayerId, now: Instant) -> Result<Vec<Outbound>, TickError> {
        let delay = self.config.death_respawn();
        let home = self.config.default_room.clone();
        let player = self.players.get_mut(&id).ok_or(TickError::MissingPlayer(id))?;
        if player.vitals.alive {
            return Ok(Vec::new());
        }

        let since = *player.dead_since.get_or_insert(now);
        if now.saturating_duration_since(since) < delay {
            return Ok(Vec::new());
        }

        let room_name = self
            .catalog
            .room(&home)
            .map(|r| r.name.clone())
            .ok_or_else(|| TickError::UnknownRoom(home.clone()))?;
        let half = (player.vitals.max_health / 2).max(1);
        player.vitals.revive(half);
        player.dead_since = None;
        player.target = None;
        player.room = home.clone();
        let name = player.name.clone();
        info!("{} revived in {}", name, home);

        let mut out = vec![
            Outbound::to_player(id, GameEvent::Awakened { room: room_name }),
            Outbound::to_room_except(&home, id, GameEvent::Appeared { name }),
        ];
        out.extend(info_lines(id, self.describe_room(id)));
        Ok(out)
    }

    /// Respawn if dead; otherwise effects, cooldowns, then AI
    fn tick_monster(&mut self, room_id: &str, id: MonsterId, now: Instant) -> Result<Vec<Outbound>, TickError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| TickError::UnknownRoom(room_id.to_string()))?;
        let Some(monster) = room.monster_mut(id) else {
            return Ok(Vec::new());
        };
        if !monster.is_alive() {
            return self.process_dead_monster(room_id, id, now);
        }

        let outcomes = effect::advance(&mut monster.vitals, now);
        let died = died_this_tick(&outcomes);
        let mut out: Vec<Outbound> = outcomes
            .into_iter()
            .map(|o| Outbound::to_room(room_id, o.into_event(&monster.name)))
            .collect();
        monster.tick_cooldowns();

        if died {
            out.extend(self.handle_monster_death(room_id, id, None, now));
            return Ok(out);
        }

        let turn = monster_ai::step(monster, &mut self.players, &self.config, self.dice.as_mut(), now);
        out.extend(turn.outbound);
        if let Some(victim) = turn.killed {
            out.extend(self.handle_player_death(victim));
        }
        Ok(out)
    }

    /// Queue a save of every connected player
    pub fn save_all(&self, persistence: &PersistenceHandle) {
        for player in self.players.values() {
            persistence.save_player(player.snapshot());
        }
    }
}

/// Heartbeat loop: tick, deliver, and periodically save
pub async fn run_heartbeat(world: SharedWorld, persistence: Option<PersistenceHandle>) {
    let (tick_duration, save_interval) = {
        let world = world.lock().await;
        (world.config.tick(), world.config.save_interval())
    };
    info!("Heartbeat running every {:?}", tick_duration);

    let mut tick_count: u64 = 0;
    let mut last_save = Instant::now();

    loop {
        let tick_start = Instant::now();
        {
            let mut world = world.lock().await;
            let outbound = world.tick(tick_start);
            world.deliver(&outbound);

            if last_save.elapsed() >= save_interval {
                if let Some(ref persistence) = persistence {
                    world.save_all(persistence);
                    info!("Periodic save complete");
                }
                last_save = Instant::now();
            }
        }

        tick_count += 1;
        if tick_count % 600 == 0 {
            debug!("Heartbeat tick {}", tick_count);
        }

        // Sleep until next tick
        let elapsed = tick_start.elapsed();
        if elapsed < tick_duration {
            sleep(tick_duration - elapsed).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::*;
    use crate::combat::dice::ScriptedDice;
    use crate::entities::{Effect, EntityRef};
    use crate::world::testing::*;
    use mud_shared::{ActionDef, ActionKind, Archetype, StatModifiers};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_player_effects_and_cooldowns_advance() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "trade_district");
        let t = Instant::now();
        {
            let player = world.player_mut(ada).unwrap();
            player.cooldowns.insert("cleave".into(), 2);
            effect::attach(&mut player.vitals, Effect::dot("Ignite", 5, 10, 2), t);
        }

        for n in 1..=10 {
            world.tick(t + secs(n));
        }
        let player = world.player(ada).unwrap();
        assert_eq!(player.vitals.health, 75);
        assert!(player.vitals.effects.is_empty());
        assert!(player.cooldowns.is_empty());
    }

    #[test]
    fn test_buff_reverts_after_duration() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "trade_district");
        let t = Instant::now();
        let before = world.player(ada).unwrap().vitals.power;
        effect::attach(
            &mut world.player_mut(ada).unwrap().vitals,
            Effect::buff("Battle Cry", StatModifiers::power(10), 5),
            t,
        );
        assert_eq!(world.player(ada).unwrap().vitals.power, before + 10);
        for n in 1..=4 {
            world.tick(t + secs(n));
        }
        assert_eq!(world.player(ada).unwrap().vitals.power, before + 10);
        world.tick(t + secs(5));
        assert_eq!(world.player(ada).unwrap().vitals.power, before);
    }

    #[test]
    fn test_expiring_max_health_buff_clamps_health() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "trade_district");
        let t = Instant::now();
        let base_max = world.player(ada).unwrap().vitals.max_health;
        {
            let vitals = &mut world.player_mut(ada).unwrap().vitals;
            effect::attach(
                vitals,
                Effect::buff("Fortify", StatModifiers { max_health: 50, ..StatModifiers::default() }, 3),
                t,
            );
            vitals.health = vitals.max_health;
        }
        assert_eq!(world.player(ada).unwrap().vitals.health, base_max + 50);

        for n in 1..=3 {
            world.tick(t + secs(n));
            let vitals = &world.player(ada).unwrap().vitals;
            assert!(vitals.health <= vitals.max_health);
        }
        let vitals = &world.player(ada).unwrap().vitals;
        assert!(vitals.effects.is_empty());
        assert_eq!((vitals.health, vitals.max_health), (base_max, base_max));
    }

    #[test]
    fn test_monster_dot_kills_player_on_later_tick() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Mage, "whispering_woods");
        {
            let room = world.room_mut("whispering_woods").unwrap();
            room.monsters.truncate(1);
            let wolf = &mut room.monsters[0];
            wolf.skills = vec![ActionDef::new("rot", "Rot", ActionKind::Dot).amount(4).timing(6, 1)];
            wolf.ai_countdown = 0.0;
        }
        world.player_mut(ada).unwrap().vitals.health = 6;
        let t = Instant::now();

        world.tick(t);
        assert_eq!(world.player(ada).unwrap().vitals.effects.len(), 1);
        world.tick(t + secs(1));
        assert_eq!(world.player(ada).unwrap().vitals.health, 2);

        let out = world.tick(t + secs(2));
        assert!(out.iter().any(|o| o.event == GameEvent::Fell { name: "Ada".into() }));
        let player = world.player(ada).unwrap();
        assert!(!player.vitals.alive);
        assert!(player.vitals.effects.is_empty());
        assert_eq!(player.dead_since, Some(t + secs(2)));
    }

    #[test]
    fn test_dead_player_revives_at_home() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "whispering_woods");
        let t = Instant::now();
        {
            let player = world.player_mut(ada).unwrap();
            player.vitals.lose_health(1000);
            player.target = Some(EntityRef::Monster(1));
        }
        world.handle_player_death(ada);

        for n in 0..15 {
            world.tick(t + secs(n));
            assert!(!world.player(ada).unwrap().vitals.alive, "revived early at T+{}", n);
        }
        let out = world.tick(t + secs(15));
        let player = world.player(ada).unwrap();
        assert!(player.vitals.alive);
        assert_eq!(player.vitals.health, 50);
        assert_eq!(player.room, "trade_district");
        assert!(player.dead_since.is_none());
        assert!(out
            .iter()
            .any(|o| o.event == GameEvent::Awakened { room: "Trade District".into() }));
    }

    #[test]
    fn test_dot_kill_on_monster_then_respawn() {
        let mut world = test_world();
        let t = Instant::now();
        let wolf = first_monster(&world, "whispering_woods");
        {
            let monster = world.room_mut("whispering_woods").unwrap().monster_mut(wolf).unwrap();
            monster.vitals.health = 3;
            effect::attach(&mut monster.vitals, Effect::dot("Ignite", 5, 10, 1), t);
        }

        let out = world.tick(t);
        assert!(out.iter().any(|o| o.event == GameEvent::Died { name: "Moonwolf".into() }));

        for n in 1..45 {
            world.tick(t + secs(n));
            let room = world.room("whispering_woods").unwrap();
            assert!(room.monster(wolf).is_some(), "replaced early at T+{}", n);
            assert_eq!(room.live_monsters().count(), 1);
        }
        world.tick(t + secs(45));
        let room = world.room("whispering_woods").unwrap();
        assert!(room.monster(wolf).is_none());
        assert_eq!(room.live_monsters().count(), 2);
    }

    #[test]
    fn test_command_kill_between_ticks_respawns_on_delay() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "whispering_woods");
        let t = Instant::now();
        world.tick(t);

        let wolf = first_monster(&world, "whispering_woods");
        world.room_mut("whispering_woods").unwrap().monster_mut(wolf).unwrap().vitals.health = 1;
        let resolution = world.player_attack(ada, "moon", t).unwrap();
        assert_eq!(resolution.killed, Some(EntityRef::Monster(wolf)));
        // out of reach of the other wolf
        world.player_mut(ada).unwrap().room = "city_gate".into();

        for n in 1..45 {
            world.tick(t + secs(n));
            assert!(world.room("whispering_woods").unwrap().monster(wolf).is_some());
        }
        world.tick(t + secs(45));
        let room = world.room("whispering_woods").unwrap();
        assert!(room.monster(wolf).is_none());
        assert_eq!(room.live_monsters().count(), 2);
    }

    #[test]
    fn test_one_bad_monster_does_not_stop_the_tick() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "trade_district");
        let t = Instant::now();
        // forgotten_acacia sorts ahead of whispering_woods, so the broken cultist goes first
        {
            let room = world.room_mut("forgotten_acacia").unwrap();
            let broken = &mut room.monsters[0];
            broken.template_id = "no_such_template".into();
            broken.vitals.lose_health(1000);
        }
        let wolf = first_monster(&world, "whispering_woods");
        world
            .room_mut("whispering_woods")
            .unwrap()
            .monster_mut(wolf)
            .unwrap()
            .vitals
            .lose_health(1000);
        world.tick(t);

        world.player_mut(ada).unwrap().cooldowns.insert("cleave".into(), 3);
        world.tick(t + secs(100));
        assert_eq!(world.player(ada).unwrap().cooldowns.get("cleave"), Some(&2));
        assert_eq!(world.room("forgotten_acacia").unwrap().live_monsters().count(), 0);
        assert_eq!(world.room("whispering_woods").unwrap().live_monsters().count(), 2);

        // still failing on later ticks without taking anything else down
        world.tick(t + secs(101));
        assert_eq!(world.player(ada).unwrap().cooldowns.get("cleave"), Some(&1));
    }

    #[test]
    fn test_aggressive_monster_attacks_player() {
        let mut world = test_world();
        set_dice(&mut world, ScriptedDice::new(vec![]));
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Mage, "whispering_woods");
        let t = Instant::now();
        for n in 0..5 {
            world.tick(t + secs(n));
        }
        let player = world.player(ada).unwrap();
        assert!(player.vitals.health < 100);
        assert!(player.vitals.in_combat(t + secs(5), world.config.combat_window()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_task_ticks_on_schedule() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "trade_district");
        world.player_mut(ada).unwrap().cooldowns.insert("cleave".into(), 5);
        let world: SharedWorld = Arc::new(Mutex::new(world));

        let task = tokio::spawn(run_heartbeat(world.clone(), None));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(world.lock().await.player(ada).unwrap().cooldowns.get("cleave"), Some(&2));
        task.abort();
    }
}
