//! Shared entity definitions.

use std::fmt;
use std::ops::{Add, AddAssign, Neg};

use serde::{Deserialize, Serialize};

use crate::ActionDef;

// =============================================================================
// Player Archetypes
// =============================================================================

/// Combat role that drives how primary stats turn into derived stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Warrior,
    Mage,
    Rogue,
    Healer,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [Self::Warrior, Self::Mage, Self::Rogue, Self::Healer];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Warrior => "Warrior",
            Self::Mage => "Mage",
            Self::Rogue => "Rogue",
            Self::Healer => "Healer",
        }
    }

    /// Case-insensitive lookup by name or unambiguous prefix
    pub fn from_name(value: &str) -> Option<Self> {
        let query = value.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|a| a.name().to_lowercase().starts_with(&query))
    }

    /// Starting primary stats before the creation roll
    pub fn base_stats(&self) -> PrimaryStats {
        let (strength, intellect, dexterity, defense, luck) = match self {
            Self::Warrior => (14, 8, 10, 6, 10),
            Self::Mage => (8, 15, 10, 3, 10),
            Self::Rogue => (11, 10, 15, 4, 12),
            Self::Healer => (9, 14, 10, 4, 11),
        };
        PrimaryStats { strength, intellect, dexterity, defense, luck }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Primary stats of a player character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryStats {
    pub strength: i32,
    pub intellect: i32,
    pub dexterity: i32,
    pub defense: i32,
    pub luck: i32,
}

impl Default for PrimaryStats {
    fn default() -> Self {
        Self {
            strength: 10,
            intellect: 10,
            dexterity: 10,
            defense: 0,
            luck: 10,
        }
    }
}

// =============================================================================
// Stat Modifiers
// =============================================================================

/// Deltas to the modifiable scalar attributes of a combatant.
///
/// Used by gear bundles and by buff effects. A buff applies its modifiers once
/// when attached and subtracts the very same deltas once when it expires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatModifiers {
    pub power: i32,
    pub defense: i32,
    pub max_health: i32,
    pub shield: i32,
}

impl StatModifiers {
    /// A bundle that only touches power
    pub fn power(amount: i32) -> Self {
        Self { power: amount, ..Self::default() }
    }

    pub fn defense(amount: i32) -> Self {
        Self { defense: amount, ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Human readable form, e.g. `power+10, defense-2`
    pub fn describe(&self) -> String {
        let parts: Vec<String> = [
            ("power", self.power),
            ("defense", self.defense),
            ("max_health", self.max_health),
            ("shield", self.shield),
        ]
        .iter()
        .filter(|(_, v)| *v != 0)
        .map(|(k, v)| format!("{}{:+}", k, v))
        .collect();
        parts.join(", ")
    }
}

impl Add for StatModifiers {
    type Output = StatModifiers;

    fn add(self, rhs: StatModifiers) -> StatModifiers {
        StatModifiers {
            power: self.power + rhs.power,
            defense: self.defense + rhs.defense,
            max_health: self.max_health + rhs.max_health,
            shield: self.shield + rhs.shield,
        }
    }
}

impl AddAssign for StatModifiers {
    fn add_assign(&mut self, rhs: StatModifiers) {
        *self = *self + rhs;
    }
}

impl Neg for StatModifiers {
    type Output = StatModifiers;

    fn neg(self) -> StatModifiers {
        StatModifiers {
            power: -self.power,
            defense: -self.defense,
            max_health: -self.max_health,
            shield: -self.shield,
        }
    }
}

// =============================================================================
// Monster Templates
// =============================================================================

fn default_monster_health() -> i32 {
    60
}

fn default_monster_power() -> i32 {
    8
}

fn default_respawn_secs() -> u64 {
    45
}

fn default_loot_chance() -> i32 {
    25
}

/// Immutable catalog record a monster instance is built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub name: String,
    #[serde(default = "default_monster_health")]
    pub health: i32,
    #[serde(default = "default_monster_power")]
    pub power: i32,
    #[serde(default)]
    pub defense: i32,
    /// Attacks players on sight instead of waiting to be struck
    #[serde(default)]
    pub aggressive: bool,
    #[serde(default)]
    pub loot: Vec<LootEntry>,
    /// Seconds between death and replacement
    #[serde(default = "default_respawn_secs")]
    pub respawn_secs: u64,
    #[serde(default)]
    pub skills: Vec<ActionDef>,
}

impl MonsterTemplate {
    pub fn new(name: impl Into<String>, health: i32, power: i32, defense: i32) -> Self {
        Self {
            name: name.into(),
            health,
            power,
            defense,
            aggressive: false,
            loot: Vec::new(),
            respawn_secs: default_respawn_secs(),
            skills: Vec::new(),
        }
    }
}

/// Loot table entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LootEntry {
    pub item: String,
    /// Base drop chance in percent (luck adds to it)
    #[serde(default = "default_loot_chance")]
    pub chance: i32,
}
