//! Narrated event protocol between the simulation and the session layer.
//!
//! The simulation never writes text directly. Every action and heartbeat tick
//! produces [`GameEvent`]s which the session layer renders with `Display` and
//! sends line by line.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::StatModifiers;

/// Default listen port
pub const DEFAULT_PORT: u16 = 4000;

/// First lines a fresh connection receives
pub const WELCOME_BANNER: &str = "Welcome to the Acacia Reaches.\r\nBy what name are you known?";

/// Line terminator used on the wire
pub const LINE_ENDING: &str = "\r\n";

// =============================================================================
// Game Events
// =============================================================================

/// Something observable that happened in the world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    // Combat
    /// A strike landed; `action` is the ability or skill name, `None` for a basic attack
    Hit {
        attacker: String,
        target: String,
        action: Option<String>,
        dealt: i32,
        absorbed: i32,
    },
    Dodged {
        attacker: String,
        target: String,
        action: Option<String>,
    },
    Blocked {
        attacker: String,
        target: String,
        action: Option<String>,
    },
    /// A monster died
    Died { name: String },
    /// A player was struck down
    Fell { name: String },

    // Effects and support actions
    Afflicted { actor: String, target: String, effect: String },
    Blessed { actor: String, target: String, effect: String },
    Empowered {
        actor: String,
        effect: String,
        modifiers: StatModifiers,
        duration: i32,
    },
    Shielded { target: String, amount: i32 },
    Healed { actor: String, target: String, amount: i32 },
    Drained {
        actor: String,
        target: String,
        action: String,
        dealt: i32,
        leeched: i32,
    },
    EffectDamage { target: String, effect: String, amount: i32 },
    EffectHeal { target: String, effect: String, amount: i32 },
    EffectExpired { target: String, effect: String },

    // World
    MonsterArrived { name: String },
    Awakened { room: String },
    LootDropped { monster: String, item: String },
    CoinsLooted { player: String, amount: u32 },
    Experience { amount: u32 },
    Taunt { text: String },

    // Auto-attack and rest
    Engaged { attacker: String, target: String },
    TargetGone,
    RestStarted,
    RestPulse { health: i32, max_health: i32 },
    RestInterrupted,
    RestFinished,

    // Movement and social
    Departed { name: String, direction: String },
    Arrived { name: String },
    Vanished { name: String },
    Appeared { name: String },
    Said { name: String, message: String },
    PickedUp { name: String, item: String },
    Dropped { name: String, item: String },

    /// Free-form line (command replies, queries)
    Info(String),
}

impl GameEvent {
    pub fn info(text: impl Into<String>) -> Self {
        Self::Info(text.into())
    }
}

fn possessive(name: &str, action: &Option<String>) -> String {
    match action {
        Some(action) => format!("{}'s {}", name, action),
        None => format!("{}'s strike", name),
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit { attacker, target, action: Some(action), dealt, absorbed } => write!(
                f,
                "* {} uses {} on {} for {} ({} absorbed).",
                attacker, action, target, dealt, absorbed
            ),
            Self::Hit { attacker, target, action: None, dealt, absorbed } => {
                write!(f, "* {} hits {} for {} ({} absorbed).", attacker, target, dealt, absorbed)
            }
            Self::Dodged { attacker, target, action } => {
                write!(f, "* {} misses {} (dodged).", possessive(attacker, action), target)
            }
            Self::Blocked { attacker, target, action } => {
                write!(f, "* {} blocks {}.", target, possessive(attacker, action))
            }
            Self::Died { name } => write!(f, "* {} dies.", name),
            Self::Fell { name } => write!(f, "* {} falls!", name),
            Self::Afflicted { actor, target, effect } => {
                write!(f, "* {} afflicts {} with {}.", actor, target, effect)
            }
            Self::Blessed { actor, target, effect } => {
                write!(f, "* {} blesses {} with {}.", actor, target, effect)
            }
            Self::Empowered { actor, effect, modifiers, duration } => write!(
                f,
                "* {} is empowered by {} ({}) for {}s.",
                actor,
                effect,
                modifiers.describe(),
                duration
            ),
            Self::Shielded { target, amount } => {
                write!(f, "* A shield of {} surrounds {}.", amount, target)
            }
            Self::Healed { actor, target, amount } => {
                write!(f, "* {} heals {} for {} HP.", actor, target, amount)
            }
            Self::Drained { actor, target, action, dealt, leeched } => write!(
                f,
                "* {} drains {} life from {} with {} ({} dealt).",
                actor, leeched, target, action, dealt
            ),
            Self::EffectDamage { target, effect, amount } => {
                write!(f, "* {} suffers {} from {}.", target, amount, effect)
            }
            Self::EffectHeal { target, effect, amount } => {
                write!(f, "* {} recovers {} from {}.", target, amount, effect)
            }
            Self::EffectExpired { target, effect } => {
                write!(f, "* {} fades from {}.", effect, target)
            }
            Self::MonsterArrived { name } => write!(f, "* A {} prowls in from the wilds.", name),
            Self::Awakened { room } => write!(f, "You awaken at {}.", room),
            Self::LootDropped { monster, item } => {
                write!(f, "* {} drops {} on the ground.", monster, item)
            }
            Self::CoinsLooted { player, amount } => {
                write!(f, "* {} loots {} obols.", player, amount)
            }
            Self::Experience { amount } => write!(f, "You gain {} experience.", amount),
            Self::Taunt { text } => write!(f, "* {}", text),
            Self::Engaged { attacker, target } => {
                write!(f, "* {} engages {}!", attacker, target)
            }
            Self::TargetGone => f.write_str("Your target is gone."),
            Self::RestStarted => f.write_str("You sit down to rest."),
            Self::RestPulse { health, max_health } => {
                write!(f, "You rest... ({}/{} HP)", health, max_health)
            }
            Self::RestInterrupted => f.write_str("Your rest is interrupted!"),
            Self::RestFinished => f.write_str("You feel rested."),
            Self::Departed { name, direction } => write!(f, "* {} leaves {}.", name, direction),
            Self::Arrived { name } => write!(f, "* {} arrives.", name),
            Self::Vanished { name } => write!(f, "* {} vanishes in a swirl of dust.", name),
            Self::Appeared { name } => write!(f, "* {} appears in a swirl of dust.", name),
            Self::Said { name, message } => write!(f, "{} says: {}", name, message),
            Self::PickedUp { name, item } => write!(f, "* {} picks up {}.", name, item),
            Self::Dropped { name, item } => write!(f, "* {} drops {}.", name, item),
            Self::Info(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strike_narration() {
        let hit = GameEvent::Hit {
            attacker: "Moonwolf".into(),
            target: "Ada".into(),
            action: None,
            dealt: 7,
            absorbed: 3,
        };
        assert_eq!(hit.to_string(), "* Moonwolf hits Ada for 7 (3 absorbed).");

        let dodged = GameEvent::Dodged {
            attacker: "Moonwolf".into(),
            target: "Ada".into(),
            action: Some("Bite".into()),
        };
        assert_eq!(dodged.to_string(), "* Moonwolf's Bite misses Ada (dodged).");
    }
}
