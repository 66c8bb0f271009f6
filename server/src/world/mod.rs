//! Game world management.
//!
//! [`GameWorld`] owns every mutable piece of the simulation: connected
//! players, per-room monster lists and ground items. It lives behind one
//! `tokio::sync::Mutex` ([`SharedWorld`]); commands, per-player tasks and
//! the heartbeat each lock it for one synchronous step at a time.

pub mod catalog;
mod heartbeat;
mod monster_ai;
mod respawn;
mod taunts;

pub use catalog::{Catalog, RoomDef};
pub use heartbeat::run_heartbeat;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use mud_shared::{ActionDef, EquipSlot, GameEvent, TargetType};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::combat::{self, resolver, ActionReport, Dice};
use crate::config::GameConfig;
use crate::entities::{effect, Combatant, EntityRef, Monster, MonsterId, Player, PlayerId};
use crate::error::{ActionError, ConfigError};

/// The world as shared between tasks
pub type SharedWorld = Arc<Mutex<GameWorld>>;

/// Mutable state of one room
#[derive(Debug, Default)]
pub struct RoomInstance {
    /// Live monsters plus dead ones awaiting replacement
    pub monsters: Vec<Monster>,
    /// Dead monster id -> time its death was first observed
    pub dead_at: HashMap<MonsterId, Instant>,
    /// Loose items lying on the floor
    pub ground: Vec<String>,
}

impl RoomInstance {
    pub fn monster(&self, id: MonsterId) -> Option<&Monster> {
        self.monsters.iter().find(|m| m.id == id)
    }

    pub fn monster_mut(&mut self, id: MonsterId) -> Option<&mut Monster> {
        self.monsters.iter_mut().find(|m| m.id == id)
    }

    pub fn live_monsters(&self) -> impl Iterator<Item = &Monster> {
        self.monsters.iter().filter(|m| m.is_alive())
    }
}

/// Who should see an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Player(PlayerId),
    Room {
        room: String,
        exclude: Option<PlayerId>,
    },
}

/// An event addressed to its audience
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub audience: Audience,
    pub event: GameEvent,
}

impl Outbound {
    pub fn to_player(id: PlayerId, event: GameEvent) -> Self {
        Self { audience: Audience::Player(id), event }
    }

    pub fn to_room(room: &str, event: GameEvent) -> Self {
        Self {
            audience: Audience::Room { room: room.to_string(), exclude: None },
            event,
        }
    }

    pub fn to_room_except(room: &str, exclude: PlayerId, event: GameEvent) -> Self {
        Self {
            audience: Audience::Room { room: room.to_string(), exclude: Some(exclude) },
            event,
        }
    }
}

/// One `Info` event per line, addressed to a single player
pub fn info_lines(id: PlayerId, lines: Vec<String>) -> Vec<Outbound> {
    lines
        .into_iter()
        .map(|line| Outbound::to_player(id, GameEvent::Info(line)))
        .collect()
}

/// Events from a command plus anything it killed
#[derive(Debug, Default)]
pub struct Resolution {
    pub outbound: Vec<Outbound>,
    pub killed: Option<EntityRef>,
}

/// Result of one auto-attack swing
#[derive(Debug)]
pub struct Swing {
    pub outbound: Vec<Outbound>,
    /// The loop should schedule another swing
    pub keep_going: bool,
}

/// Result of one rest pulse
#[derive(Debug, PartialEq, Eq)]
pub enum RestPulse {
    Healed(Vec<Outbound>),
    Interrupted(Vec<Outbound>),
    /// Player is gone; nothing to report
    Gone,
}

/// The game world containing all entities
pub struct GameWorld {
    players: HashMap<PlayerId, Player>,
    rooms: HashMap<String, RoomInstance>,
    next_monster_id: MonsterId,
    next_player_id: PlayerId,
    pub catalog: Arc<Catalog>,
    pub config: Arc<GameConfig>,
    dice: Box<dyn Dice>,
}

impl GameWorld {
    /// Build the world and spawn every room's monsters.
    ///
    /// Fails if a room spawns an unknown template or the default room is missing.
    pub fn new(
        catalog: Arc<Catalog>,
        config: Arc<GameConfig>,
        dice: Box<dyn Dice>,
    ) -> Result<Self, ConfigError> {
        if catalog.room(&config.default_room).is_none() {
            return Err(ConfigError::MissingDefaultRoom(config.default_room.clone()));
        }

        let mut world = Self {
            players: HashMap::new(),
            rooms: HashMap::new(),
            next_monster_id: 1,
            next_player_id: 1,
            catalog: catalog.clone(),
            config,
            dice,
        };

        let mut total_spawned = 0;
        for (room_id, room) in catalog.rooms() {
            let mut instance = RoomInstance::default();
            for template_id in &room.spawns {
                let monster = world.instantiate(template_id, room_id).ok_or_else(|| {
                    ConfigError::UnknownTemplate {
                        room: room_id.clone(),
                        template: template_id.clone(),
                    }
                })?;
                instance.monsters.push(monster);
                total_spawned += 1;
            }
            world.rooms.insert(room_id.clone(), instance);
        }

        info!(
            "Spawned {} monsters across {} rooms",
            total_spawned,
            world.rooms.len()
        );
        Ok(world)
    }

    /// Fresh monster from a template, or `None` if the template is unknown
    fn instantiate(&mut self, template_id: &str, room_id: &str) -> Option<Monster> {
        let template = self.catalog.template(template_id)?;
        let id = self.next_monster_id;
        self.next_monster_id += 1;
        Some(Monster::spawn(
            id,
            template_id,
            template,
            room_id,
            self.config.ai_period_secs,
            self.dice.as_mut(),
        ))
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Send events to their audiences. Delivery is best-effort.
    pub fn deliver(&self, outbound: &[Outbound]) {
        for out in outbound {
            let line = out.event.to_string();
            match &out.audience {
                Audience::Player(id) => {
                    if let Some(player) = self.players.get(id) {
                        player.outbox.send(line);
                    }
                }
                Audience::Room { room, exclude } => {
                    for player in self.players.values() {
                        if &player.room == room && Some(player.id) != *exclude {
                            player.outbox.send(line.clone());
                        }
                    }
                }
            }
        }
    }

    // =========================================================================
    // Players
    // =========================================================================

    pub fn allocate_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    /// Mutable access to the world's dice, e.g. for character creation
    pub fn dice(&mut self) -> &mut dyn Dice {
        self.dice.as_mut()
    }

    /// Put a player into the world and announce them
    pub fn add_player(&mut self, mut player: Player) -> Vec<Outbound> {
        if self.catalog.room(&player.room).is_none() {
            player.room = self.config.default_room.clone();
        }
        player.recompute_stats(&self.catalog);
        let id = player.id;
        let room = player.room.clone();
        let name = player.name.clone();
        self.players.insert(id, player);
        info!("{} entered the world in {}", name, room);

        let mut out = vec![Outbound::to_room_except(&room, id, GameEvent::Arrived { name })];
        out.extend(info_lines(id, self.describe_room(id)));
        out
    }

    /// Take a player out of the world. Tasks must already be stopped.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        self.deliver(&[Outbound::to_room(
            &player.room,
            GameEvent::Vanished { name: player.name.clone() },
        )]);
        info!("{} left the world", player.name);
        Some(player)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.values_mut()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<_> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Is a player of this name already connected?
    pub fn is_online(&self, name: &str) -> bool {
        self.players.values().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn room(&self, id: &str) -> Option<&RoomInstance> {
        self.rooms.get(id)
    }

    pub fn room_mut(&mut self, id: &str) -> Option<&mut RoomInstance> {
        self.rooms.get_mut(id)
    }

    fn require_player(&self, id: PlayerId) -> Result<&Player, ActionError> {
        self.players.get(&id).ok_or(ActionError::UnknownPlayer)
    }

    fn require_living(&self, id: PlayerId) -> Result<&Player, ActionError> {
        let player = self.require_player(id)?;
        if !player.vitals.alive {
            return Err(ActionError::Dead);
        }
        Ok(player)
    }

    pub fn in_combat(&self, id: PlayerId, now: Instant) -> bool {
        self.players
            .get(&id)
            .map(|p| p.vitals.in_combat(now, self.config.combat_window()))
            .unwrap_or(false)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Room name, description, exits, occupants and ground items
    pub fn describe_room(&self, id: PlayerId) -> Vec<String> {
        let Some(player) = self.players.get(&id) else {
            return Vec::new();
        };
        let Some(def) = self.catalog.room(&player.room) else {
            return vec!["You are nowhere.".to_string()];
        };

        let mut lines = vec![def.name.clone(), def.description.clone()];
        let exits: Vec<&str> = def.exits.keys().map(String::as_str).collect();
        lines.push(if exits.is_empty() {
            "Exits: none".to_string()
        } else {
            format!("Exits: {}", exits.join(", "))
        });

        let mut others: Vec<&str> = self
            .players
            .values()
            .filter(|p| p.room == player.room && p.id != id)
            .map(|p| p.name.as_str())
            .collect();
        others.sort_unstable();
        if !others.is_empty() {
            lines.push(format!("Also here: {}", others.join(", ")));
        }

        if let Some(room) = self.rooms.get(&player.room) {
            let monsters: Vec<String> = room
                .live_monsters()
                .map(|m| format!("{} ({}/{})", m.name, m.vitals.health, m.vitals.max_health))
                .collect();
            if !monsters.is_empty() {
                lines.push(format!("Monsters: {}", monsters.join(", ")));
            }
            if !room.ground.is_empty() {
                lines.push(format!("On the ground: {}", room.ground.join(", ")));
            }
        }
        lines
    }

    pub fn stats_lines(&self, id: PlayerId, now: Instant) -> Result<Vec<String>, ActionError> {
        let p = self.require_player(id)?;
        let v = &p.vitals;
        let s = &p.stats;
        let mut lines = vec![
            format!("{} the {} (level {}, {} xp, {} obols)", p.name, p.archetype, p.level, p.xp, p.obols),
            format!(
                "HP {}/{}  Power {}  Defense {}  Shield {}",
                v.health, v.max_health, v.power, v.defense, v.shield
            ),
            format!(
                "STR {}  INT {}  DEX {}  DEF {}  LCK {}",
                s.strength, s.intellect, s.dexterity, s.defense, s.luck
            ),
        ];
        if !v.effects.is_empty() {
            let effects: Vec<String> = v
                .effects
                .iter()
                .map(|e| format!("{} ({}s)", e.name, e.remaining))
                .collect();
            lines.push(format!("Effects: {}", effects.join(", ")));
        }
        if !v.alive {
            lines.push("You are dead.".to_string());
        } else if v.in_combat(now, self.config.combat_window()) {
            lines.push("You are in combat.".to_string());
        }
        Ok(lines)
    }

    /// Ability list with live cooldowns
    pub fn ability_lines(&self, id: PlayerId) -> Result<Vec<String>, ActionError> {
        let p = self.require_player(id)?;
        let mut lines = vec![format!("{} abilities:", p.archetype)];
        for ability in self.catalog.abilities_for(p.archetype) {
            let status = match p.cooldowns.get(&ability.id) {
                Some(remaining) => format!("cooldown {}s", remaining),
                None => "ready".to_string(),
            };
            lines.push(format!(
                "  {} ({}) [{}] {}",
                ability.name,
                ability.id,
                ability.kind.name(),
                status
            ));
        }
        Ok(lines)
    }

    pub fn who_lines(&self) -> Vec<String> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        let mut lines = vec![format!("{} adventurer(s) online:", players.len())];
        for p in players {
            let room = self
                .catalog
                .room(&p.room)
                .map(|r| r.name.as_str())
                .unwrap_or(p.room.as_str());
            lines.push(format!("  {} the {} ({})", p.name, p.archetype, room));
        }
        lines
    }

    pub fn inventory_lines(&self, id: PlayerId) -> Result<Vec<String>, ActionError> {
        let p = self.require_player(id)?;
        if p.inventory.is_empty() {
            return Ok(vec![format!("You carry nothing. ({} obols)", p.obols)]);
        }
        Ok(vec![format!("You carry: {} ({} obols)", p.inventory.join(", "), p.obols)])
    }

    pub fn gear_line(&self, id: PlayerId) -> Result<String, ActionError> {
        let eq = &self.require_player(id)?.equipment;
        let show = |slot: &Option<String>| slot.clone().unwrap_or_else(|| "(none)".to_string());
        Ok(format!(
            "Gear: Weapon: {} | Shield: {} | Set: {}",
            show(&eq.weapon),
            show(&eq.shield),
            show(&eq.set)
        ))
    }

    pub fn examine(&self, id: PlayerId, query: &str) -> Result<Vec<String>, ActionError> {
        let p = self.require_player(id)?;
        let name = p.find_carried(query).ok_or(ActionError::NotCarried)?;
        let Some(def) = self.catalog.item(&name) else {
            return Ok(vec![format!("{}: nothing special.", name)]);
        };
        let mut lines = vec![format!("{}: {}", def.name, def.description)];
        if !def.modifiers.is_empty() {
            lines.push(format!("Grants {}", def.modifiers.describe()));
        }
        Ok(lines)
    }

    // =========================================================================
    // Targeting
    // =========================================================================

    /// Live monster in `room` whose name starts with `query`
    pub fn find_monster(&self, room: &str, query: &str) -> Option<MonsterId> {
        let room = self.rooms.get(room)?;
        room.monsters.iter().find(|m| m.answers_to(query)).map(|m| m.id)
    }

    /// Monster or player in the same room matching `query` by name prefix
    pub fn find_target(&self, id: PlayerId, query: &str) -> Option<EntityRef> {
        let player = self.players.get(&id)?;
        if let Some(mid) = self.find_monster(&player.room, query) {
            return Some(EntityRef::Monster(mid));
        }
        let query = query.to_lowercase();
        let mut candidates: Vec<&Player> = self
            .players
            .values()
            .filter(|p| p.room == player.room && p.name.to_lowercase().starts_with(&query))
            .collect();
        candidates.sort_by_key(|p| p.id);
        candidates.first().map(|p| EntityRef::Player(p.id))
    }

    /// Is `target` alive and in `room` right now?
    fn is_present(&self, room: &str, target: EntityRef) -> bool {
        match target {
            EntityRef::Monster(mid) => self
                .rooms
                .get(room)
                .and_then(|r| r.monster(mid))
                .map(|m| m.is_alive())
                .unwrap_or(false),
            EntityRef::Player(pid) => self
                .players
                .get(&pid)
                .map(|p| p.room == room && p.vitals.alive)
                .unwrap_or(false),
        }
    }

    fn display_name(&self, room: &str, target: EntityRef) -> Option<String> {
        match target {
            EntityRef::Monster(mid) => self
                .rooms
                .get(room)
                .and_then(|r| r.monster(mid))
                .map(|m| m.name.clone()),
            EntityRef::Player(pid) => self.players.get(&pid).map(|p| p.name.clone()),
        }
    }

    pub fn set_target(&mut self, id: PlayerId, query: &str) -> Result<Vec<Outbound>, ActionError> {
        self.require_living(id)?;
        let target = self.find_target(id, query).ok_or(ActionError::NoTarget)?;
        let room = self.require_player(id)?.room.clone();
        let name = self.display_name(&room, target).unwrap_or_default();
        if let Some(player) = self.players.get_mut(&id) {
            player.target = Some(target);
        }
        Ok(vec![Outbound::to_player(id, GameEvent::info(format!("You target {}.", name)))])
    }

    // =========================================================================
    // Combat
    // =========================================================================

    /// One basic strike from a player against a monster in their room
    fn basic_strike(&mut self, id: PlayerId, mid: MonsterId, now: Instant) -> Result<Resolution, ActionError> {
        let player = self.players.get_mut(&id).ok_or(ActionError::UnknownPlayer)?;
        let room = player.room.clone();
        let monster = self
            .rooms
            .get_mut(&room)
            .and_then(|r| r.monster_mut(mid))
            .filter(|m| m.is_alive())
            .ok_or(ActionError::NoSuchMonster)?;

        let gross = player.strike_power();
        let (outcome, event) = resolver::strike(player, monster, gross, None, now, self.dice.as_mut());
        let mut resolution = Resolution {
            outbound: vec![Outbound::to_room(&room, event)],
            killed: None,
        };
        if outcome.killed() {
            resolution.outbound.extend(self.handle_monster_death(&room, mid, Some(id), now));
            resolution.killed = Some(EntityRef::Monster(mid));
        }
        Ok(resolution)
    }

    /// `attack <monster>`: a single immediate strike
    pub fn player_attack(&mut self, id: PlayerId, query: &str, now: Instant) -> Result<Resolution, ActionError> {
        let room = self.require_living(id)?.room.clone();
        let mid = self.find_monster(&room, query).ok_or(ActionError::NoSuchMonster)?;
        if let Some(player) = self.players.get_mut(&id) {
            player.target = Some(EntityRef::Monster(mid));
        }
        self.basic_strike(id, mid, now)
    }

    /// Resolve who an ability should land on
    fn ability_target(
        &self,
        id: PlayerId,
        ability: &ActionDef,
        query: Option<&str>,
    ) -> Result<Option<EntityRef>, ActionError> {
        let player = self.require_player(id)?;
        let target_type = ability.effective_target();
        if target_type == TargetType::SelfOnly {
            return Ok(None);
        }

        let found = match query {
            Some(query) => self.find_target(id, query),
            None => player.target.filter(|t| self.is_present(&player.room, *t)),
        };

        match (target_type, found) {
            (TargetType::Enemy, Some(EntityRef::Player(pid))) if pid == id => Err(ActionError::NoTarget),
            (TargetType::Enemy, Some(target)) => Ok(Some(target)),
            (TargetType::Enemy, None) => Err(ActionError::NoTarget),
            (_, Some(EntityRef::Player(pid))) if pid == id => Ok(None),
            (_, found) => Ok(found),
        }
    }

    /// Perform an ability with `id` as the actor, borrowing actor and target disjointly
    fn perform_as_player(
        &mut self,
        id: PlayerId,
        ability: &ActionDef,
        target: Option<EntityRef>,
        now: Instant,
    ) -> Result<ActionReport, ActionError> {
        let room = self.require_player(id)?.room.clone();
        match target {
            None => {
                let actor = self.players.get_mut(&id).ok_or(ActionError::UnknownPlayer)?;
                Ok(combat::perform(ability, actor, None, now, self.dice.as_mut()))
            }
            Some(EntityRef::Monster(mid)) => {
                let actor = self.players.get_mut(&id).ok_or(ActionError::UnknownPlayer)?;
                let monster = self
                    .rooms
                    .get_mut(&room)
                    .and_then(|r| r.monster_mut(mid))
                    .filter(|m| m.is_alive())
                    .ok_or(ActionError::NoTarget)?;
                Ok(combat::perform(
                    ability,
                    actor,
                    Some(monster as &mut dyn Combatant),
                    now,
                    self.dice.as_mut(),
                ))
            }
            Some(EntityRef::Player(other)) => {
                let mut actor = self.players.remove(&id).ok_or(ActionError::UnknownPlayer)?;
                let result = match self.players.get_mut(&other) {
                    Some(target) if target.room == room && target.vitals.alive => Ok(combat::perform(
                        ability,
                        &mut actor,
                        Some(target as &mut dyn Combatant),
                        now,
                        self.dice.as_mut(),
                    )),
                    _ => Err(ActionError::NoTarget),
                };
                self.players.insert(id, actor);
                result
            }
        }
    }

    /// `use <ability> [target]`
    pub fn use_ability(
        &mut self,
        id: PlayerId,
        query: &str,
        target_query: Option<&str>,
        now: Instant,
    ) -> Result<Resolution, ActionError> {
        let player = self.require_living(id)?;
        let room = player.room.clone();
        let ability = self
            .catalog
            .find_ability(player.archetype, query)
            .cloned()
            .ok_or(ActionError::UnknownAbility)?;
        if let Some(&remaining) = player.cooldowns.get(&ability.id) {
            return Err(ActionError::OnCooldown { name: ability.name.clone(), remaining });
        }

        let target = self.ability_target(id, &ability, target_query)?;
        let report = self.perform_as_player(id, &ability, target, now)?;
        debug!("player {} used {} on {:?}", id, ability.id, target);

        // a dodged or blocked ability can be tried again at once
        if ability.cooldown > 0 && !report.avoided {
            if let Some(player) = self.players.get_mut(&id) {
                player.cooldowns.insert(ability.id.clone(), ability.cooldown);
            }
        }

        let mut resolution = Resolution {
            outbound: report
                .events
                .into_iter()
                .map(|e| Outbound::to_room(&room, e))
                .collect(),
            killed: report.killed,
        };
        match report.killed {
            Some(EntityRef::Monster(mid)) => {
                resolution.outbound.extend(self.handle_monster_death(&room, mid, Some(id), now));
            }
            Some(EntityRef::Player(pid)) => {
                resolution.outbound.extend(self.handle_player_death(pid));
            }
            None => {}
        }
        Ok(resolution)
    }

    /// Death narration, rewards and loot for a monster that just died.
    ///
    /// The respawn delay counts from `now`, the moment of the kill.
    pub fn handle_monster_death(
        &mut self,
        room: &str,
        mid: MonsterId,
        killer: Option<PlayerId>,
        now: Instant,
    ) -> Vec<Outbound> {
        let Some(instance) = self.rooms.get_mut(room) else {
            return Vec::new();
        };
        let Some(monster) = instance.monster_mut(mid) else {
            return Vec::new();
        };
        effect::strip(&mut monster.vitals);
        monster.ai_state = crate::entities::AiState::Dead;
        let name = monster.name.clone();
        let loot = monster.loot.clone();
        instance.mark_dead(mid, now);

        let mut out = vec![Outbound::to_room(room, GameEvent::Died { name: name.clone() })];
        let Some(killer_id) = killer else {
            return out;
        };
        let Some(player) = self.players.get_mut(&killer_id) else {
            return out;
        };

        player.xp += 10;
        out.push(Outbound::to_player(killer_id, GameEvent::Experience { amount: 10 }));

        let dice = self.dice.as_mut();
        let drops: Vec<String> = loot
            .iter()
            .filter(|entry| player.lucky(entry.chance, 5, dice))
            .map(|entry| entry.item.clone())
            .collect();

        if player.lucky(50, 4, dice) {
            let coins = (dice.between(1, 3) + player.stats.luck / 10).max(1) as u32;
            player.obols += coins;
            out.push(Outbound::to_player(
                killer_id,
                GameEvent::CoinsLooted { player: player.name.clone(), amount: coins },
            ));
        }

        for item in drops {
            out.push(Outbound::to_room(
                room,
                GameEvent::LootDropped { monster: name.clone(), item: item.clone() },
            ));
            instance.ground.push(item);
        }
        info!("{} slain in {}", name, room);
        out
    }

    /// A player just hit 0 health
    pub fn handle_player_death(&mut self, id: PlayerId) -> Vec<Outbound> {
        let Some(player) = self.players.get_mut(&id) else {
            return Vec::new();
        };
        effect::strip(&mut player.vitals);
        player.recompute_stats(&self.catalog);
        player.target = None;
        info!("{} has fallen in {}", player.name, player.room);
        vec![Outbound::to_room(&player.room, GameEvent::Fell { name: player.name.clone() })]
    }

    // =========================================================================
    // Auto-attack and rest support
    // =========================================================================

    /// Pick the monster an engage should go after
    pub fn resolve_engage_target(&self, id: PlayerId, query: Option<&str>) -> Result<MonsterId, ActionError> {
        let room_id = self.require_living(id)?.room.clone();
        if let Some(query) = query {
            return self.find_monster(&room_id, query).ok_or(ActionError::NoSuchMonster);
        }
        let room = self.rooms.get(&room_id).ok_or(ActionError::NoEnemies)?;
        room.live_monsters()
            .find(|m| m.aggressive)
            .or_else(|| room.live_monsters().next())
            .map(|m| m.id)
            .ok_or(ActionError::NoEnemies)
    }

    /// Opening strike of an engage; sets the player's target
    pub fn engage_strike(&mut self, id: PlayerId, mid: MonsterId, now: Instant) -> Result<Resolution, ActionError> {
        let room = self.require_living(id)?.room.clone();
        let name = self
            .display_name(&room, EntityRef::Monster(mid))
            .ok_or(ActionError::NoSuchMonster)?;
        let player = self.players.get_mut(&id).ok_or(ActionError::UnknownPlayer)?;
        player.target = Some(EntityRef::Monster(mid));
        let engaged = Outbound::to_room(
            &room,
            GameEvent::Engaged { attacker: player.name.clone(), target: name },
        );
        let mut resolution = self.basic_strike(id, mid, now)?;
        resolution.outbound.insert(0, engaged);
        Ok(resolution)
    }

    /// One auto-attack iteration: revalidate the target, then swing
    pub fn auto_swing(&mut self, id: PlayerId, now: Instant) -> Swing {
        let Some(player) = self.players.get(&id) else {
            return Swing { outbound: Vec::new(), keep_going: false };
        };
        if !player.vitals.alive {
            return Swing { outbound: Vec::new(), keep_going: false };
        }
        let target = match player.target {
            Some(EntityRef::Monster(mid)) if self.is_present(&player.room, EntityRef::Monster(mid)) => mid,
            _ => {
                return Swing {
                    outbound: vec![Outbound::to_player(id, GameEvent::TargetGone)],
                    keep_going: false,
                }
            }
        };
        match self.basic_strike(id, target, now) {
            Ok(resolution) => Swing {
                keep_going: resolution.killed.is_none(),
                outbound: resolution.outbound,
            },
            Err(_) => Swing {
                outbound: vec![Outbound::to_player(id, GameEvent::TargetGone)],
                keep_going: false,
            },
        }
    }

    /// Check whether a rest may begin
    pub fn can_rest(&self, id: PlayerId, now: Instant) -> Result<(), ActionError> {
        let player = self.require_living(id)?;
        if player.vitals.in_combat(now, self.config.combat_window()) {
            return Err(ActionError::RestInCombat);
        }
        Ok(())
    }

    /// One rest pulse: heal a share of max health unless combat or death intervened
    pub fn rest_pulse(&mut self, id: PlayerId, now: Instant) -> RestPulse {
        let window = self.config.combat_window();
        let pulses = self.config.rest_pulses.max(1) as i32;
        let Some(player) = self.players.get_mut(&id) else {
            return RestPulse::Gone;
        };
        if !player.vitals.alive || player.vitals.in_combat(now, window) {
            return RestPulse::Interrupted(vec![Outbound::to_player(id, GameEvent::RestInterrupted)]);
        }
        let share = (player.vitals.max_health / pulses).max(1);
        player.vitals.restore_health(share);
        RestPulse::Healed(vec![Outbound::to_player(
            id,
            GameEvent::RestPulse {
                health: player.vitals.health,
                max_health: player.vitals.max_health,
            },
        )])
    }

    // =========================================================================
    // Movement
    // =========================================================================

    /// Destination of `direction` if the player may take it now
    pub fn check_move(&self, id: PlayerId, direction: &str, now: Instant) -> Result<String, ActionError> {
        let player = self.require_living(id)?;
        let def = self.catalog.room(&player.room).ok_or(ActionError::NoExit)?;
        let to = def.exits.get(direction).ok_or(ActionError::NoExit)?;
        if player.vitals.in_combat(now, self.config.combat_window()) {
            return Err(ActionError::FleeInCombat);
        }
        Ok(to.clone())
    }

    pub fn check_recall(&self, id: PlayerId, now: Instant) -> Result<(), ActionError> {
        let player = self.require_living(id)?;
        if player.vitals.in_combat(now, self.config.combat_window()) {
            return Err(ActionError::RecallInCombat);
        }
        Ok(())
    }

    fn relocate(&mut self, id: PlayerId, to: &str) -> Option<(String, String)> {
        let player = self.players.get_mut(&id)?;
        let from = std::mem::replace(&mut player.room, to.to_string());
        player.target = None;
        Some((from, player.name.clone()))
    }

    /// Walk through an exit
    pub fn move_player(&mut self, id: PlayerId, direction: &str, now: Instant) -> Result<Vec<Outbound>, ActionError> {
        let to = self.check_move(id, direction, now)?;
        let (from, name) = self.relocate(id, &to).ok_or(ActionError::UnknownPlayer)?;
        let mut out = vec![
            Outbound::to_room_except(
                &from,
                id,
                GameEvent::Departed { name: name.clone(), direction: direction.to_string() },
            ),
            Outbound::to_room_except(&to, id, GameEvent::Arrived { name }),
        ];
        out.extend(info_lines(id, self.describe_room(id)));
        Ok(out)
    }

    /// Return to the default room
    pub fn recall(&mut self, id: PlayerId, now: Instant) -> Result<Vec<Outbound>, ActionError> {
        self.check_recall(id, now)?;
        let to = self.config.default_room.clone();
        let (from, name) = self.relocate(id, &to).ok_or(ActionError::UnknownPlayer)?;
        let mut out = vec![
            Outbound::to_room_except(&from, id, GameEvent::Vanished { name: name.clone() }),
            Outbound::to_room_except(&to, id, GameEvent::Appeared { name }),
        ];
        out.extend(info_lines(id, self.describe_room(id)));
        Ok(out)
    }

    pub fn say(&self, id: PlayerId, message: &str) -> Result<Vec<Outbound>, ActionError> {
        let player = self.require_player(id)?;
        Ok(vec![Outbound::to_room(
            &player.room,
            GameEvent::Said { name: player.name.clone(), message: message.to_string() },
        )])
    }

    // =========================================================================
    // Items
    // =========================================================================

    pub fn pick_up(&mut self, id: PlayerId, query: &str) -> Result<Vec<Outbound>, ActionError> {
        let room_id = self.require_living(id)?.room.clone();
        let want = query.trim().to_lowercase();
        let room = self.rooms.get_mut(&room_id).ok_or(ActionError::NothingHere)?;
        let index = room
            .ground
            .iter()
            .position(|g| g.to_lowercase() == want)
            .or_else(|| room.ground.iter().position(|g| g.to_lowercase().starts_with(&want)))
            .filter(|_| !want.is_empty())
            .ok_or(ActionError::NothingHere)?;
        let item = room.ground.remove(index);
        let player = self.players.get_mut(&id).ok_or(ActionError::UnknownPlayer)?;
        player.inventory.push(item.clone());
        Ok(vec![Outbound::to_room(&room_id, GameEvent::PickedUp { name: player.name.clone(), item })])
    }

    pub fn drop_item(&mut self, id: PlayerId, query: &str) -> Result<Vec<Outbound>, ActionError> {
        let player = self.players.get_mut(&id).ok_or(ActionError::UnknownPlayer)?;
        let item = player.find_carried(query).ok_or(ActionError::NotCarried)?;
        if let Some(index) = player.inventory.iter().position(|i| *i == item) {
            player.inventory.remove(index);
        }
        if !player.inventory.contains(&item) {
            player.equipment.remove_item(&item);
        }
        player.recompute_stats(&self.catalog);
        let room_id = player.room.clone();
        let name = player.name.clone();
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.ground.push(item.clone());
        }
        Ok(vec![Outbound::to_room(&room_id, GameEvent::Dropped { name, item })])
    }

    pub fn equip(&mut self, id: PlayerId, query: &str) -> Result<Vec<Outbound>, ActionError> {
        let player = self.players.get_mut(&id).ok_or(ActionError::UnknownPlayer)?;
        let item = player.find_carried(query).ok_or(ActionError::NotCarried)?;
        let slot = self
            .catalog
            .item(&item)
            .and_then(|def| def.item_type.slot())
            .ok_or(ActionError::NotEquippable)?;
        *player.equipment.slot_mut(slot) = Some(item.clone());
        player.recompute_stats(&self.catalog);
        Ok(vec![Outbound::to_player(id, GameEvent::info(format!("You equip {}.", item)))])
    }

    pub fn unequip(&mut self, id: PlayerId, slot: &str) -> Result<Vec<Outbound>, ActionError> {
        let player = self.players.get_mut(&id).ok_or(ActionError::UnknownPlayer)?;
        let slot = EquipSlot::from_name(slot).ok_or(ActionError::SlotEmpty)?;
        let item = player.equipment.slot_mut(slot).take().ok_or(ActionError::SlotEmpty)?;
        player.recompute_stats(&self.catalog);
        Ok(vec![Outbound::to_player(id, GameEvent::info(format!("You unequip {}.", item)))])
    }
}

// =============================================================================
// Test helpers
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use tokio::sync::mpsc;

    use super::*;
    use crate::combat::dice::ScriptedDice;
    use crate::network::Outbox;
    use mud_shared::Archetype;

    /// Default catalog and config with scripted dice that never succeed a chance roll
    pub fn test_world() -> GameWorld {
        GameWorld::new(
            Arc::new(Catalog::with_defaults()),
            Arc::new(GameConfig::default()),
            Box::new(ScriptedDice::new(vec![])),
        )
        .unwrap()
    }

    pub fn set_dice(world: &mut GameWorld, dice: ScriptedDice) {
        world.dice = Box::new(dice);
    }

    /// Add a player and return its id plus a receiver for its lines
    pub fn add_test_player(
        world: &mut GameWorld,
        name: &str,
        archetype: Archetype,
        room: &str,
    ) -> (PlayerId, mpsc::UnboundedReceiver<String>) {
        let id = world.allocate_player_id();
        let mut player = Player::create(id, name.into(), archetype, room.into(), world.dice());
        let (tx, rx) = mpsc::unbounded_channel();
        player.outbox = Outbox::new(tx);
        world.add_player(player);
        (id, rx)
    }

    pub fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    pub fn first_monster(world: &GameWorld, room: &str) -> MonsterId {
        world.room(room).unwrap().monsters[0].id
    }
}
