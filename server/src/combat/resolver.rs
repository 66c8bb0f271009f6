//! Attack resolution: avoidance, defense, shield, then health.
//!
//! Every hostile strike in the game, from players and monsters alike, goes
//! through [`resolve_attack`].

use mud_shared::GameEvent;
use tokio::time::Instant;

use super::dice::Dice;
use crate::entities::{Combatant, Vitals};

/// Hard cap on dodge chance in percent
pub const DODGE_CAP: i32 = 40;

/// Hard cap on block chance in percent
pub const BLOCK_CAP: i32 = 25;

/// Primary stats that let a defender avoid a blow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Avoidance {
    pub dexterity: i32,
    pub defense: i32,
}

impl Avoidance {
    pub fn dodge_chance(&self) -> i32 {
        (5 + self.dexterity / 3).min(DODGE_CAP)
    }

    pub fn block_chance(&self) -> i32 {
        (self.defense / 3).min(BLOCK_CAP)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Avoided {
    Dodge,
    Block,
}

/// Dodge is rolled first; block only gets a roll when the dodge fails.
pub fn roll_avoidance(avoidance: Avoidance, dice: &mut dyn Dice) -> Option<Avoided> {
    if dice.chance(avoidance.dodge_chance()) {
        return Some(Avoided::Dodge);
    }
    if dice.chance(avoidance.block_chance()) {
        return Some(Avoided::Block);
    }
    None
}

/// Damage that made it past avoidance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitReport {
    /// Damage after defense, before the shield
    pub dealt: i32,
    /// Part of `dealt` soaked by the shield
    pub absorbed: i32,
    /// This hit took the defender from alive to dead
    pub defender_died: bool,
}

impl HitReport {
    /// Health actually lost
    pub fn net(&self) -> i32 {
        self.dealt - self.absorbed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackOutcome {
    Dodged,
    Blocked,
    Hit(HitReport),
}

impl AttackOutcome {
    pub fn killed(&self) -> bool {
        matches!(self, Self::Hit(HitReport { defender_died: true, .. }))
    }

    /// Dodged or blocked
    pub fn avoided(&self) -> bool {
        matches!(self, Self::Dodged | Self::Blocked)
    }
}

/// Apply gross damage to a defender: defense first, then shield, then health.
pub fn apply_damage(defender: &mut Vitals, gross: i32, now: Instant) -> HitReport {
    let dealt = (gross - defender.defense.max(0)).max(0);
    let absorbed = defender.absorb(dealt);
    let defender_died = defender.lose_health(dealt - absorbed);
    defender.flag_combat(now);
    HitReport { dealt, absorbed, defender_died }
}

/// Resolve one hostile strike. Player defenders get their avoidance rolls.
pub fn resolve_attack(
    attacker: &mut dyn Combatant,
    defender: &mut dyn Combatant,
    gross: i32,
    now: Instant,
    dice: &mut dyn Dice,
) -> AttackOutcome {
    attacker.vitals_mut().flag_combat(now);
    defender.vitals_mut().flag_combat(now);

    if let Some(avoidance) = defender.avoidance() {
        match roll_avoidance(avoidance, dice) {
            Some(Avoided::Dodge) => return AttackOutcome::Dodged,
            Some(Avoided::Block) => return AttackOutcome::Blocked,
            None => {}
        }
    }
    AttackOutcome::Hit(apply_damage(defender.vitals_mut(), gross, now))
}

/// Narrate an attack outcome
pub fn describe(
    attacker: &str,
    defender: &str,
    action: Option<&str>,
    outcome: &AttackOutcome,
) -> GameEvent {
    let attacker = attacker.to_string();
    let target = defender.to_string();
    let action = action.map(str::to_string);
    match outcome {
        AttackOutcome::Dodged => GameEvent::Dodged { attacker, target, action },
        AttackOutcome::Blocked => GameEvent::Blocked { attacker, target, action },
        AttackOutcome::Hit(hit) => GameEvent::Hit {
            attacker,
            target,
            action,
            dealt: hit.dealt,
            absorbed: hit.absorbed,
        },
    }
}

/// Resolve a strike and narrate it in one go
pub fn strike(
    attacker: &mut dyn Combatant,
    defender: &mut dyn Combatant,
    gross: i32,
    action: Option<&str>,
    now: Instant,
    dice: &mut dyn Dice,
) -> (AttackOutcome, GameEvent) {
    let outcome = resolve_attack(attacker, defender, gross, now, dice);
    let event = describe(attacker.name(), defender.name(), action, &outcome);
    (outcome, event)
}

/// Heal up to the missing health. Returns the amount restored.
pub fn heal(target: &mut Vitals, amount: i32) -> i32 {
    target.restore_health(amount)
}

/// Damage the defender and heal the attacker by what got past the shield.
/// Returns the outcome and the amount leeched.
pub fn lifesteal(
    attacker: &mut dyn Combatant,
    defender: &mut dyn Combatant,
    gross: i32,
    now: Instant,
    dice: &mut dyn Dice,
) -> (AttackOutcome, i32) {
    let outcome = resolve_attack(attacker, defender, gross, now, dice);
    let leeched = match outcome {
        AttackOutcome::Hit(hit) => attacker.vitals_mut().restore_health(hit.net().max(0)),
        _ => 0,
    };
    (outcome, leeched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::dice::ScriptedDice;
    use crate::entities::{EntityRef, Vitals};

    struct Dummy {
        vitals: Vitals,
        avoidance: Option<Avoidance>,
    }

    impl Dummy {
        fn new(health: i32, avoidance: Option<Avoidance>) -> Self {
            Self { vitals: Vitals::new(health, 10, 0), avoidance }
        }
    }

    impl Combatant for Dummy {
        fn entity_ref(&self) -> EntityRef {
            EntityRef::Monster(0)
        }
        fn name(&self) -> &str {
            "Dummy"
        }
        fn vitals(&self) -> &Vitals {
            &self.vitals
        }
        fn vitals_mut(&mut self) -> &mut Vitals {
            &mut self.vitals
        }
        fn avoidance(&self) -> Option<Avoidance> {
            self.avoidance
        }
    }

    const CAPPED: Avoidance = Avoidance { dexterity: 200, defense: 200 };

    #[test]
    fn test_shield_absorbs_first() {
        let mut defender = Vitals::new(100, 10, 0);
        defender.shield = 20;
        let hit = apply_damage(&mut defender, 30, Instant::now());
        assert_eq!(hit, HitReport { dealt: 30, absorbed: 20, defender_died: false });
        assert_eq!(defender.shield, 0);
        assert_eq!(defender.health, 90);
    }

    #[test]
    fn test_defense_floors_at_zero() {
        let mut defender = Vitals::new(100, 10, 50);
        let hit = apply_damage(&mut defender, 30, Instant::now());
        assert_eq!(hit.dealt, 0);
        assert_eq!(defender.health, 100);
    }

    #[test]
    fn test_caps() {
        assert_eq!(CAPPED.dodge_chance(), 40);
        assert_eq!(CAPPED.block_chance(), 25);
        let low = Avoidance { dexterity: 12, defense: 6 };
        assert_eq!((low.dodge_chance(), low.block_chance()), (9, 2));
    }

    #[test]
    fn test_dodge_short_circuits_block() {
        let mut attacker = Dummy::new(100, None);
        let mut defender = Dummy::new(100, Some(CAPPED));
        let mut dice = ScriptedDice::new(vec![40]);
        let outcome = resolve_attack(&mut attacker, &mut defender, 30, Instant::now(), &mut dice);
        assert_eq!(outcome, AttackOutcome::Dodged);
        assert_eq!(dice.rolls, 1);
        assert_eq!(defender.vitals.health, 100);
    }

    #[test]
    fn test_failed_dodge_still_rolls_block() {
        let mut attacker = Dummy::new(100, None);
        let mut defender = Dummy::new(100, Some(CAPPED));
        defender.vitals.shield = 5;
        let mut dice = ScriptedDice::new(vec![41, 25]);
        let outcome = resolve_attack(&mut attacker, &mut defender, 30, Instant::now(), &mut dice);
        assert_eq!(outcome, AttackOutcome::Blocked);
        assert_eq!(dice.rolls, 2);
        assert_eq!(defender.vitals.shield, 5);
    }

    #[test]
    fn test_monsters_never_roll_avoidance() {
        let mut attacker = Dummy::new(100, Some(CAPPED));
        let mut defender = Dummy::new(100, None);
        let mut dice = ScriptedDice::new(vec![1, 1]);
        let outcome = resolve_attack(&mut attacker, &mut defender, 30, Instant::now(), &mut dice);
        assert!(matches!(outcome, AttackOutcome::Hit(_)));
        assert_eq!(dice.rolls, 0);
        assert!(attacker.vitals.last_combat.is_some());
        assert!(defender.vitals.last_combat.is_some());
    }

    #[test]
    fn test_lifesteal_heals_net_damage() {
        let mut attacker = Dummy::new(100, None);
        attacker.vitals.health = 50;
        let mut defender = Dummy::new(100, None);
        defender.vitals.shield = 4;
        let mut dice = ScriptedDice::new(vec![]);
        let (_, leeched) = lifesteal(&mut attacker, &mut defender, 20, Instant::now(), &mut dice);
        assert_eq!(leeched, 16);
        assert_eq!(attacker.vitals.health, 66);
        assert_eq!(defender.vitals.health, 84);
    }

    #[test]
    fn test_killing_blow_reports_once() {
        let mut attacker = Dummy::new(100, None);
        let mut defender = Dummy::new(10, None);
        let mut dice = ScriptedDice::new(vec![]);
        let now = Instant::now();
        let first = resolve_attack(&mut attacker, &mut defender, 15, now, &mut dice);
        let second = resolve_attack(&mut attacker, &mut defender, 15, now, &mut dice);
        assert!(first.killed());
        assert!(!second.killed());
        assert_eq!(defender.vitals.health, 0);
    }

    #[test]
    fn test_heal_clamps() {
        let mut target = Vitals::new(100, 10, 0);
        target.health = 95;
        assert_eq!(heal(&mut target, 30), 5);
        assert_eq!(target.health, 100);
    }
}
