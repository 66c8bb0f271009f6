//! Combat math shared by players and monsters.

pub mod actions;
pub mod dice;
pub mod resolver;

pub use actions::{perform, ActionReport};
pub use dice::{Dice, RandDice};
pub use resolver::{resolve_attack, AttackOutcome, Avoidance, HitReport};
