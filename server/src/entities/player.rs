//! Server-side player entity.

use std::collections::HashMap;

use mud_shared::{Archetype, EquipSlot, PrimaryStats, StatModifiers};
use tokio::time::Instant;

use super::effect;
use super::vitals::Vitals;
use super::{Combatant, EntityRef, PlayerId};
use crate::combat::{Avoidance, Dice};
use crate::network::Outbox;
use crate::persistence::PlayerSnapshot;
use crate::tasks::PlayerTasks;
use crate::world::Catalog;

/// Base max health before gear
const BASE_HEALTH: i32 = 100;

/// Base power before primary stat scaling
const BASE_POWER: i32 = 10;

/// Item names worn in each slot. Equipped items stay in the inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Equipment {
    pub weapon: Option<String>,
    pub set: Option<String>,
    pub shield: Option<String>,
}

impl Equipment {
    pub fn get(&self, slot: EquipSlot) -> Option<&String> {
        match slot {
            EquipSlot::Weapon => self.weapon.as_ref(),
            EquipSlot::Set => self.set.as_ref(),
            EquipSlot::Shield => self.shield.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, slot: EquipSlot) -> &mut Option<String> {
        match slot {
            EquipSlot::Weapon => &mut self.weapon,
            EquipSlot::Set => &mut self.set,
            EquipSlot::Shield => &mut self.shield,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &String> {
        [&self.weapon, &self.set, &self.shield].into_iter().flatten()
    }

    /// Clear any slot holding `item`
    pub fn remove_item(&mut self, item: &str) {
        for slot in EquipSlot::ALL {
            let held = self.slot_mut(slot);
            if held.as_deref() == Some(item) {
                *held = None;
            }
        }
    }
}

/// Server-side player state
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub archetype: Archetype,
    pub room: String,
    pub vitals: Vitals,
    pub stats: PrimaryStats,
    pub level: u32,
    pub xp: u32,
    pub obols: u32,
    pub inventory: Vec<String>,
    pub equipment: Equipment,
    /// Ability id -> seconds remaining
    pub cooldowns: HashMap<String, u32>,
    pub target: Option<EntityRef>,
    /// Set the first tick the player is seen dead
    pub dead_since: Option<Instant>,
    pub tasks: PlayerTasks,
    pub outbox: Outbox,
}

impl Player {
    /// Create a fresh character, rolling primary stats for the archetype
    pub fn create(
        id: PlayerId,
        name: String,
        archetype: Archetype,
        room: String,
        dice: &mut dyn Dice,
    ) -> Self {
        let base = archetype.base_stats();
        let mut roll = |value: i32| value + dice.between(0, 3);
        let stats = PrimaryStats {
            strength: roll(base.strength),
            intellect: roll(base.intellect),
            dexterity: roll(base.dexterity),
            defense: roll(base.defense),
            luck: roll(base.luck),
        };
        Self {
            id,
            name,
            archetype,
            room,
            vitals: Vitals::new(BASE_HEALTH, BASE_POWER, 0),
            stats,
            level: 1,
            xp: 0,
            obols: 0,
            inventory: Vec::new(),
            equipment: Equipment::default(),
            cooldowns: HashMap::new(),
            target: None,
            dead_since: None,
            tasks: PlayerTasks::default(),
            outbox: Outbox::detached(),
        }
    }

    /// Rebuild a player from a saved snapshot
    pub fn from_snapshot(id: PlayerId, snapshot: PlayerSnapshot) -> Self {
        let mut vitals = Vitals::new(snapshot.max_health, snapshot.power, snapshot.defense);
        vitals.health = snapshot.health.clamp(0, vitals.max_health);
        vitals.shield = snapshot.shield.max(0);
        vitals.alive = vitals.health > 0;
        Self {
            id,
            name: snapshot.name,
            archetype: snapshot.archetype,
            room: snapshot.room,
            vitals,
            stats: snapshot.stats,
            level: snapshot.level,
            xp: snapshot.xp,
            obols: snapshot.obols,
            inventory: snapshot.inventory,
            equipment: Equipment {
                weapon: snapshot.equipment.get(&EquipSlot::Weapon).cloned(),
                set: snapshot.equipment.get(&EquipSlot::Set).cloned(),
                shield: snapshot.equipment.get(&EquipSlot::Shield).cloned(),
            },
            cooldowns: snapshot.cooldowns,
            target: None,
            dead_since: None,
            tasks: PlayerTasks::default(),
            outbox: Outbox::detached(),
        }
    }

    /// Flat record handed to persistence
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            name: self.name.clone(),
            archetype: self.archetype,
            room: self.room.clone(),
            health: self.vitals.health,
            max_health: self.vitals.max_health,
            power: self.vitals.power,
            defense: self.vitals.defense,
            shield: self.vitals.shield,
            level: self.level,
            xp: self.xp,
            obols: self.obols,
            stats: self.stats,
            inventory: self.inventory.clone(),
            equipment: EquipSlot::ALL
                .into_iter()
                .filter_map(|slot| self.equipment.get(slot).map(|item| (slot, item.clone())))
                .collect(),
            cooldowns: self.cooldowns.clone(),
        }
    }

    /// Sum of modifiers from equipped gear
    pub fn gear_modifiers(&self, catalog: &Catalog) -> StatModifiers {
        self.equipment
            .items()
            .filter_map(|name| catalog.item(name))
            .fold(StatModifiers::default(), |acc, item| acc + item.modifiers)
    }

    /// Recompute power, defense and max health from archetype, stats and gear.
    ///
    /// Active buffs are layered back on top so their later reversal stays exact.
    pub fn recompute_stats(&mut self, catalog: &Catalog) {
        let s = self.stats;
        let (power, defense) = match self.archetype {
            Archetype::Warrior => (BASE_POWER + s.strength / 3, s.defense / 4),
            Archetype::Mage => (BASE_POWER + s.intellect / 3, 0),
            Archetype::Rogue => (BASE_POWER + s.dexterity / 3 + s.strength / 6, 0),
            Archetype::Healer => (BASE_POWER + s.intellect / 4, 0),
        };
        let gear = self.gear_modifiers(catalog);
        let buffs = effect::active_modifiers(&self.vitals);

        self.vitals.power = (power + gear.power).max(1) + buffs.power;
        self.vitals.defense = (defense + gear.defense).max(0) + buffs.defense;
        self.vitals.max_health = (BASE_HEALTH + gear.max_health).max(1) + buffs.max_health;
        self.vitals.clamp_health();
    }

    /// Count every cooldown down by one second, dropping finished ones
    pub fn tick_cooldowns(&mut self) {
        self.cooldowns.retain(|_, remaining| {
            *remaining = remaining.saturating_sub(1);
            *remaining > 0
        });
    }

    /// Find a carried item by case-insensitive name or prefix
    pub fn find_carried(&self, query: &str) -> Option<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        self.inventory
            .iter()
            .find(|item| item.to_lowercase() == query)
            .or_else(|| self.inventory.iter().find(|item| item.to_lowercase().starts_with(&query)))
            .cloned()
    }

    /// Roll `pct` percent plus the luck bonus
    pub fn lucky(&self, pct: i32, divisor: i32, dice: &mut dyn Dice) -> bool {
        dice.chance(pct + self.stats.luck / divisor)
    }
}

impl Combatant for Player {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::Player(self.id)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    fn vitals_mut(&mut self) -> &mut Vitals {
        &mut self.vitals
    }

    fn avoidance(&self) -> Option<Avoidance> {
        Some(Avoidance {
            dexterity: self.stats.dexterity,
            defense: self.stats.defense,
        })
    }

    fn strike_power(&self) -> i32 {
        self.vitals.power + self.stats.strength / 5
    }

    fn action_scaling(&self) -> i32 {
        match self.archetype {
            Archetype::Mage => self.stats.intellect / 4,
            Archetype::Rogue => self.stats.dexterity / 4,
            Archetype::Healer => self.stats.intellect / 5,
            Archetype::Warrior => self.stats.strength / 4,
        }
    }

    fn heal_bonus(&self) -> i32 {
        self.stats.intellect / 3
    }

    fn drain_bonus(&self) -> i32 {
        self.stats.intellect / 4
    }
}
