//! Ability and monster skill definitions.
//!
//! Player abilities and monster skills share one record type, [`ActionDef`],
//! so both are resolved by the same combat code on the server.

use serde::{Deserialize, Serialize};

use crate::{Archetype, StatModifiers};

// =============================================================================
// Action Types
// =============================================================================

/// What an action does when it lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Direct damage, subject to dodge/block and defense
    Damage,
    /// Damage over time
    Dot,
    /// Heal over time
    Hot,
    /// Temporary stat modifiers on the actor
    Buff,
    /// Flat shield added to the target
    Shield,
    /// Instant heal
    Heal,
    /// Damage that heals the actor by what got through the shield
    Lifesteal,
}

impl ActionKind {
    /// Hostile actions need an enemy target and put both sides in combat
    pub fn is_hostile(&self) -> bool {
        matches!(self, Self::Damage | Self::Dot | Self::Lifesteal)
    }

    /// Magnitude used when a definition leaves `amount` out
    pub fn default_amount(&self) -> i32 {
        match self {
            Self::Damage => 0,
            Self::Dot | Self::Hot => 5,
            Self::Buff => 5,
            Self::Shield => 50,
            Self::Heal => 30,
            Self::Lifesteal => 20,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Damage => "damage",
            Self::Dot => "dot",
            Self::Hot => "hot",
            Self::Buff => "buff",
            Self::Shield => "shield",
            Self::Heal => "heal",
            Self::Lifesteal => "lifesteal",
        }
    }
}

/// Target type for actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Targets a single enemy
    #[default]
    Enemy,
    /// Targets self only
    #[serde(rename = "self")]
    SelfOnly,
    /// Targets a single ally, falling back to self
    Ally,
}

fn default_duration() -> i32 {
    10
}

fn default_tick() -> i32 {
    1
}

/// Ability or monster skill definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    /// Unique id, used as the cooldown key
    pub id: String,
    /// Display name
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub target: TargetType,
    /// Magnitude (damage, per-tick amount, shield, heal); see [`ActionKind::default_amount`]
    #[serde(default, alias = "per_tick")]
    pub amount: Option<i32>,
    /// Flat bonus added to the actor's power for direct damage
    #[serde(default)]
    pub flat: i32,
    /// Effect duration in ticks
    #[serde(default = "default_duration")]
    pub duration: i32,
    /// Ticks between effect activations
    #[serde(default = "default_tick")]
    pub tick: i32,
    /// Explicit buff modifiers; buffs default to `power + amount`
    #[serde(default, alias = "mod")]
    pub modifiers: Option<StatModifiers>,
    /// Cooldown in seconds (0 = none)
    #[serde(default, alias = "cd")]
    pub cooldown: u32,
}

impl ActionDef {
    pub fn new(id: &str, name: &str, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            target: TargetType::Enemy,
            amount: None,
            flat: 0,
            duration: default_duration(),
            tick: default_tick(),
            modifiers: None,
            cooldown: 0,
        }
    }

    pub fn amount(mut self, amount: i32) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn flat(mut self, flat: i32) -> Self {
        self.flat = flat;
        self
    }

    pub fn timing(mut self, duration: i32, tick: i32) -> Self {
        self.duration = duration;
        self.tick = tick;
        self
    }

    pub fn targets(mut self, target: TargetType) -> Self {
        self.target = target;
        self
    }

    pub fn modifiers(mut self, modifiers: StatModifiers) -> Self {
        self.modifiers = Some(modifiers);
        self
    }

    pub fn cooldown(mut self, seconds: u32) -> Self {
        self.cooldown = seconds;
        self
    }

    /// Configured magnitude or the kind's default
    pub fn magnitude(&self) -> i32 {
        self.amount.unwrap_or_else(|| self.kind.default_amount())
    }

    /// Case-insensitive match on id or display name
    pub fn matches(&self, query: &str) -> bool {
        self.id.eq_ignore_ascii_case(query) || self.name.eq_ignore_ascii_case(query)
    }

    /// Buffs always land on the actor whatever the definition says.
    /// Other friendly kinds left on the `Enemy` default land on the actor too.
    pub fn effective_target(&self) -> TargetType {
        match self.kind {
            ActionKind::Buff => TargetType::SelfOnly,
            kind if !kind.is_hostile() && self.target == TargetType::Enemy => TargetType::SelfOnly,
            _ => self.target,
        }
    }

    pub fn buff_modifiers(&self) -> StatModifiers {
        match self.modifiers {
            Some(mods) if !mods.is_empty() => mods,
            _ => StatModifiers::power(self.magnitude()),
        }
    }
}

// =============================================================================
// Ability Definitions
// =============================================================================

/// Built-in ability kit for each archetype
pub fn default_abilities(archetype: Archetype) -> Vec<ActionDef> {
    match archetype {
        Archetype::Warrior => vec![
            ActionDef::new("cleave", "Cleave", ActionKind::Damage)
                .amount(6)
                .flat(2)
                .cooldown(6),
            ActionDef::new("battle_cry", "Battle Cry", ActionKind::Buff)
                .amount(6)
                .timing(10, 1)
                .cooldown(30),
            ActionDef::new("shield_wall", "Shield Wall", ActionKind::Shield)
                .amount(25)
                .targets(TargetType::SelfOnly)
                .cooldown(20),
        ],
        Archetype::Mage => vec![
            ActionDef::new("firebolt", "Firebolt", ActionKind::Damage)
                .amount(10)
                .cooldown(4),
            ActionDef::new("ignite", "Ignite", ActionKind::Dot)
                .amount(5)
                .timing(10, 2)
                .cooldown(12),
            ActionDef::new("mana_shield", "Mana Shield", ActionKind::Shield)
                .amount(30)
                .targets(TargetType::SelfOnly)
                .cooldown(25),
        ],
        Archetype::Rogue => vec![
            ActionDef::new("backstab", "Backstab", ActionKind::Damage)
                .amount(8)
                .flat(4)
                .cooldown(8),
            ActionDef::new("poison_blade", "Poison Blade", ActionKind::Dot)
                .amount(4)
                .timing(8, 1)
                .cooldown(12),
            ActionDef::new("evasion", "Evasion", ActionKind::Buff)
                .modifiers(StatModifiers::defense(5))
                .timing(8, 1)
                .cooldown(30),
        ],
        Archetype::Healer => vec![
            ActionDef::new("mend", "Mend", ActionKind::Heal)
                .amount(25)
                .targets(TargetType::Ally)
                .cooldown(5),
            ActionDef::new("renew", "Renew", ActionKind::Hot)
                .amount(6)
                .timing(10, 2)
                .targets(TargetType::Ally)
                .cooldown(15),
            ActionDef::new("drain_life", "Drain Life", ActionKind::Lifesteal)
                .amount(15)
                .cooldown(8),
        ],
    }
}
