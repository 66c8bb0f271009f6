//! Per-player background tasks: auto-attack and rest.
//!
//! Each player owns at most one auto-attack task and one rest task. Replacing
//! or stopping a task always aborts it and waits for it to finish before
//! anything else happens, so two loops never act for the same player.
//!
//! Tasks only touch the world while holding its lock, and never hold the lock
//! across a sleep.

use std::time::Duration;

use log::debug;
use mud_shared::GameEvent;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::entities::{EntityRef, Player, PlayerId};
use crate::error::ActionError;
use crate::world::{GameWorld, Outbound, Resolution, RestPulse, SharedWorld};

/// Background task handles owned by a player
#[derive(Debug, Default)]
pub struct PlayerTasks {
    auto_attack: Option<JoinHandle<()>>,
    rest: Option<JoinHandle<()>>,
}

impl PlayerTasks {
    pub fn auto_attack_running(&self) -> bool {
        self.auto_attack.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn resting(&self) -> bool {
        self.rest.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Abort a task and wait until it has actually stopped
async fn cancel_and_await(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        handle.abort();
        let _ = handle.await;
    }
}

/// Stop every auto-attack aimed at an entity that just died
pub async fn stop_auto_attacks_on(world: &mut GameWorld, target: EntityRef) {
    let handles: Vec<JoinHandle<()>> = world
        .players_mut()
        .filter(|p| p.target == Some(target))
        .filter_map(|p| p.tasks.auto_attack.take())
        .collect();
    for handle in handles {
        cancel_and_await(Some(handle)).await;
    }
}

/// Deliver a command's events and clean up after anything it killed
pub async fn settle(world: &mut GameWorld, resolution: Resolution) {
    world.deliver(&resolution.outbound);
    if let Some(killed) = resolution.killed {
        stop_auto_attacks_on(world, killed).await;
    }
}

// =============================================================================
// Auto-attack
// =============================================================================

/// `kill [monster]`: strike once now, then keep swinging until the target is gone.
///
/// A killing opening strike does not start a loop. Any previous auto-attack is
/// stopped before the new one starts.
pub async fn engage(world: &SharedWorld, id: PlayerId, query: Option<&str>) -> Result<(), ActionError> {
    let mut guard = world.lock().await;
    let now = Instant::now();
    let target = guard.resolve_engage_target(id, query)?;
    let resolution = guard.engage_strike(id, target, now)?;
    let killed = resolution.killed.is_some();
    settle(&mut guard, resolution).await;

    let previous = guard.player_mut(id).and_then(|p| p.tasks.auto_attack.take());
    cancel_and_await(previous).await;
    if killed {
        return Ok(());
    }

    let interval = guard.config.auto_attack_interval();
    let handle = tokio::spawn(auto_attack_loop(world.clone(), id, interval));
    match guard.player_mut(id) {
        Some(player) => player.tasks.auto_attack = Some(handle),
        None => handle.abort(),
    }
    debug!("player {} auto-attacking monster {}", id, target);
    Ok(())
}

async fn auto_attack_loop(world: SharedWorld, id: PlayerId, interval: Duration) {
    loop {
        sleep(interval).await;
        let mut guard = world.lock().await;
        let swing = guard.auto_swing(id, Instant::now());
        guard.deliver(&swing.outbound);
        if !swing.keep_going {
            if let Some(player) = guard.player_mut(id) {
                player.tasks.auto_attack = None;
            }
            debug!("player {} auto-attack ended", id);
            return;
        }
    }
}

// =============================================================================
// Rest
// =============================================================================

/// `rest`: heal in pulses until done, or until combat or death interrupts
pub async fn start_rest(world: &SharedWorld, id: PlayerId) -> Result<(), ActionError> {
    let mut guard = world.lock().await;
    guard.can_rest(id, Instant::now())?;
    let pulses = guard.config.rest_pulses.max(1);
    let interval = guard.config.rest_interval();
    let player = guard.player_mut(id).ok_or(ActionError::UnknownPlayer)?;
    if player.tasks.resting() {
        return Err(ActionError::AlreadyResting);
    }

    player.tasks.rest = Some(tokio::spawn(rest_loop(world.clone(), id, pulses, interval)));
    guard.deliver(&[Outbound::to_player(id, GameEvent::RestStarted)]);
    Ok(())
}

async fn rest_loop(world: SharedWorld, id: PlayerId, pulses: u32, interval: Duration) {
    for _ in 0..pulses {
        sleep(interval).await;
        let mut guard = world.lock().await;
        match guard.rest_pulse(id, Instant::now()) {
            RestPulse::Healed(out) => guard.deliver(&out),
            RestPulse::Interrupted(out) => {
                guard.deliver(&out);
                if let Some(player) = guard.player_mut(id) {
                    player.tasks.rest = None;
                }
                return;
            }
            RestPulse::Gone => return,
        }
    }

    let mut guard = world.lock().await;
    guard.deliver(&[Outbound::to_player(id, GameEvent::RestFinished)]);
    if let Some(player) = guard.player_mut(id) {
        player.tasks.rest = None;
    }
}

// =============================================================================
// Movement and disconnect
// =============================================================================

/// Walk through an exit. Stops auto-attack once the move is known to be allowed.
pub async fn move_player(world: &SharedWorld, id: PlayerId, direction: &str) -> Result<(), ActionError> {
    let mut guard = world.lock().await;
    let now = Instant::now();
    guard.check_move(id, direction, now)?;
    let previous = guard.player_mut(id).and_then(|p| p.tasks.auto_attack.take());
    cancel_and_await(previous).await;
    let out = guard.move_player(id, direction, now)?;
    guard.deliver(&out);
    Ok(())
}

/// Return to the default room. Same gating as [`move_player`].
pub async fn recall(world: &SharedWorld, id: PlayerId) -> Result<(), ActionError> {
    let mut guard = world.lock().await;
    let now = Instant::now();
    guard.check_recall(id, now)?;
    let previous = guard.player_mut(id).and_then(|p| p.tasks.auto_attack.take());
    cancel_and_await(previous).await;
    let out = guard.recall(id, now)?;
    guard.deliver(&out);
    Ok(())
}

/// Stop a player's tasks and take them out of the world
pub async fn release_player(world: &SharedWorld, id: PlayerId) -> Option<Player> {
    let mut guard = world.lock().await;
    let (auto_attack, rest) = match guard.player_mut(id) {
        Some(player) => (player.tasks.auto_attack.take(), player.tasks.rest.take()),
        None => (None, None),
    };
    cancel_and_await(auto_attack).await;
    cancel_and_await(rest).await;
    guard.remove_player(id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::*;
    use crate::entities::MonsterId;
    use crate::world::testing::*;
    use mud_shared::Archetype;

    fn shared(world: GameWorld) -> SharedWorld {
        Arc::new(Mutex::new(world))
    }

    async fn monster_health(world: &SharedWorld, room: &str, id: MonsterId) -> i32 {
        world.lock().await.room(room).unwrap().monster(id).unwrap().vitals.health
    }

    async fn set_monster_health(world: &SharedWorld, room: &str, id: MonsterId, health: i32) {
        let mut guard = world.lock().await;
        let vitals = &mut guard.room_mut(room).unwrap().monster_mut(id).unwrap().vitals;
        vitals.max_health = health;
        vitals.health = health;
    }

    async fn auto_running(world: &SharedWorld, id: PlayerId) -> bool {
        world.lock().await.player(id).unwrap().tasks.auto_attack_running()
    }

    async fn resting(world: &SharedWorld, id: PlayerId) -> bool {
        world.lock().await.player(id).unwrap().tasks.resting()
    }

    #[tokio::test(start_paused = true)]
    async fn test_killing_the_target_ends_auto_attack() {
        let mut world = test_world();
        let (ada, mut rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "whispering_woods");
        let wolf = first_monster(&world, "whispering_woods");
        let world = shared(world);
        set_monster_health(&world, "whispering_woods", wolf, 200).await;

        engage(&world, ada, None).await.unwrap();
        let hit = 200 - monster_health(&world, "whispering_woods", wolf).await;
        assert!(hit > 0);
        assert!(auto_running(&world, ada).await);

        // leave exactly one more swing's worth
        {
            let mut guard = world.lock().await;
            let vitals = &mut guard.room_mut("whispering_woods").unwrap().monster_mut(wolf).unwrap().vitals;
            vitals.health = hit;
        }
        sleep(Duration::from_millis(2600)).await;

        assert!(!auto_running(&world, ada).await);
        let guard = world.lock().await;
        assert!(!guard.room("whispering_woods").unwrap().monster(wolf).unwrap().is_alive());
        drop(guard);
        let lines = drain(&mut rx);
        assert!(lines.iter().any(|l| l == "* Moonwolf dies."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_engage_replaces_the_first() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "whispering_woods");
        let wolf = first_monster(&world, "whispering_woods");
        let world = shared(world);
        set_monster_health(&world, "whispering_woods", wolf, 500).await;

        engage(&world, ada, None).await.unwrap();
        let hit = 500 - monster_health(&world, "whispering_woods", wolf).await;
        engage(&world, ada, None).await.unwrap();
        assert_eq!(monster_health(&world, "whispering_woods", wolf).await, 500 - 2 * hit);

        sleep(Duration::from_millis(2600)).await;
        // a single surviving loop swings once per interval
        assert_eq!(monster_health(&world, "whispering_woods", wolf).await, 500 - 3 * hit);
        assert!(auto_running(&world, ada).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_killing_opener_starts_no_loop() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "whispering_woods");
        let wolf = first_monster(&world, "whispering_woods");
        let world = shared(world);
        set_monster_health(&world, "whispering_woods", wolf, 1).await;

        engage(&world, ada, Some("moon")).await.unwrap();
        assert!(!auto_running(&world, ada).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_by_command_stops_other_auto_attacks() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "whispering_woods");
        let (bo, _rx2) = add_test_player(&mut world, "Bo", Archetype::Warrior, "whispering_woods");
        let wolf = first_monster(&world, "whispering_woods");
        let world = shared(world);
        set_monster_health(&world, "whispering_woods", wolf, 500).await;

        engage(&world, ada, None).await.unwrap();
        assert!(auto_running(&world, ada).await);

        let mut guard = world.lock().await;
        guard.room_mut("whispering_woods").unwrap().monster_mut(wolf).unwrap().vitals.health = 1;
        let resolution = guard.player_attack(bo, "moon", Instant::now()).unwrap();
        assert_eq!(resolution.killed, Some(EntityRef::Monster(wolf)));
        settle(&mut guard, resolution).await;
        assert!(!guard.player(ada).unwrap().tasks.auto_attack_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_engage_with_no_enemies() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "trade_district");
        let world = shared(world);
        assert_eq!(engage(&world, ada, None).await.unwrap_err(), ActionError::NoEnemies);
        assert!(!auto_running(&world, ada).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rest_heals_and_rejects_a_second_rest() {
        let mut world = test_world();
        let (ada, mut rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "trade_district");
        world.player_mut(ada).unwrap().vitals.health = 40;
        let world = shared(world);

        start_rest(&world, ada).await.unwrap();
        assert_eq!(start_rest(&world, ada).await.unwrap_err(), ActionError::AlreadyResting);

        sleep(Duration::from_millis(10_100)).await;
        assert_eq!(world.lock().await.player(ada).unwrap().vitals.health, 56);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(world.lock().await.player(ada).unwrap().vitals.health, 100);
        assert!(!resting(&world, ada).await);
        assert!(drain(&mut rx).iter().any(|l| l == "You feel rested."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_combat_interrupts_rest() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "trade_district");
        world.player_mut(ada).unwrap().vitals.health = 40;
        let world = shared(world);

        start_rest(&world, ada).await.unwrap();
        sleep(Duration::from_secs(5)).await;
        world.lock().await.player_mut(ada).unwrap().vitals.flag_combat(Instant::now());
        sleep(Duration::from_millis(5_100)).await;

        assert!(!resting(&world, ada).await);
        assert_eq!(world.lock().await.player(ada).unwrap().vitals.health, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rest_refused_in_combat() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "trade_district");
        world.player_mut(ada).unwrap().vitals.flag_combat(Instant::now());
        let world = shared(world);
        assert_eq!(start_rest(&world, ada).await.unwrap_err(), ActionError::RestInCombat);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moving_stops_auto_attack() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "whispering_woods");
        let wolf = first_monster(&world, "whispering_woods");
        let world = shared(world);
        set_monster_health(&world, "whispering_woods", wolf, 500).await;

        engage(&world, ada, None).await.unwrap();
        assert_eq!(move_player(&world, ada, "west").await.unwrap_err(), ActionError::FleeInCombat);
        assert!(auto_running(&world, ada).await);

        world.lock().await.player_mut(ada).unwrap().vitals.last_combat = None;
        move_player(&world, ada, "west").await.unwrap();
        assert!(!auto_running(&world, ada).await);
        assert_eq!(world.lock().await.player(ada).unwrap().room, "city_gate");

        let before = monster_health(&world, "whispering_woods", wolf).await;
        sleep(Duration::from_secs(5)).await;
        assert_eq!(monster_health(&world, "whispering_woods", wolf).await, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_stops_everything() {
        let mut world = test_world();
        let (ada, _rx) = add_test_player(&mut world, "Ada", Archetype::Warrior, "whispering_woods");
        let wolf = first_monster(&world, "whispering_woods");
        let world = shared(world);
        set_monster_health(&world, "whispering_woods", wolf, 500).await;

        engage(&world, ada, None).await.unwrap();
        let before = monster_health(&world, "whispering_woods", wolf).await;
        let player = release_player(&world, ada).await.unwrap();
        assert_eq!(player.name, "Ada");
        assert!(world.lock().await.player(ada).is_none());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(monster_health(&world, "whispering_woods", wolf).await, before);
    }
}
