//! Server-side entity definitions.

pub mod effect;
pub mod monster;
pub mod player;
pub mod vitals;

pub use effect::{Effect, EffectKind, EffectOutcome};
pub use monster::{AiState, Monster};
pub use player::{Equipment, Player};
pub use vitals::Vitals;

use crate::combat::Avoidance;

pub type PlayerId = u64;
pub type MonsterId = u64;

/// Identifies a combatant without borrowing it. Targets are stored as these
/// and re-resolved against the current room on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Player(PlayerId),
    Monster(MonsterId),
}

/// Capabilities the combat code needs from players and monsters alike
pub trait Combatant {
    fn entity_ref(&self) -> EntityRef;
    fn name(&self) -> &str;
    fn vitals(&self) -> &Vitals;
    fn vitals_mut(&mut self) -> &mut Vitals;

    /// Dodge/block stats; only players roll avoidance
    fn avoidance(&self) -> Option<Avoidance> {
        None
    }

    /// Gross damage of a basic attack
    fn strike_power(&self) -> i32 {
        self.vitals().power
    }

    /// Bonus added to damage abilities
    fn action_scaling(&self) -> i32 {
        0
    }

    fn heal_bonus(&self) -> i32 {
        0
    }

    fn drain_bonus(&self) -> i32 {
        0
    }
}
