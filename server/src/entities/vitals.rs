//! Health, combat scalars and combat timing shared by players and monsters.

use std::time::Duration;

use mud_shared::StatModifiers;
use tokio::time::Instant;

use super::effect::Effect;

/// Mutable combat state common to every combatant.
///
/// `health` stays within `0..=max_health` after every mutation made through
/// these methods. `alive` flips to false exactly once when health reaches 0
/// and only [`Vitals::revive`] sets it back.
#[derive(Debug, Clone)]
pub struct Vitals {
    pub health: i32,
    pub max_health: i32,
    pub power: i32,
    pub defense: i32,
    pub shield: i32,
    pub alive: bool,
    /// Active effects in application order
    pub effects: Vec<Effect>,
    /// Last time this entity dealt or took damage or was acted upon
    pub last_combat: Option<Instant>,
}

impl Vitals {
    pub fn new(max_health: i32, power: i32, defense: i32) -> Self {
        let max_health = max_health.max(1);
        Self {
            health: max_health,
            max_health,
            power,
            defense,
            shield: 0,
            alive: true,
            effects: Vec::new(),
            last_combat: None,
        }
    }

    pub fn flag_combat(&mut self, now: Instant) {
        self.last_combat = Some(now);
    }

    /// True while the last combat activity is younger than `window`
    pub fn in_combat(&self, now: Instant, window: Duration) -> bool {
        match self.last_combat {
            Some(at) => now.saturating_duration_since(at) < window,
            None => false,
        }
    }

    pub fn clamp_health(&mut self) {
        self.health = self.health.clamp(0, self.max_health.max(0));
    }

    /// Reduce health, flooring at 0. Returns true if this call killed the entity.
    pub fn lose_health(&mut self, amount: i32) -> bool {
        self.health = (self.health - amount.max(0)).clamp(0, self.max_health.max(0));
        if self.health == 0 && self.alive {
            self.alive = false;
            return true;
        }
        false
    }

    /// Raise health up to `max_health`. Returns the amount actually restored.
    pub fn restore_health(&mut self, amount: i32) -> i32 {
        let healed = amount.clamp(0, (self.max_health - self.health).max(0));
        self.health += healed;
        healed
    }

    /// Shield soaks up to `pending`; returns the absorbed part
    pub fn absorb(&mut self, pending: i32) -> i32 {
        let absorbed = self.shield.clamp(0, pending.max(0));
        self.shield -= absorbed;
        absorbed
    }

    pub fn apply_modifiers(&mut self, mods: &StatModifiers) {
        self.power += mods.power;
        self.defense += mods.defense;
        self.shield = (self.shield + mods.shield).max(0);
        if mods.max_health != 0 {
            self.max_health += mods.max_health;
            self.clamp_health();
        }
    }

    /// Subtract exactly the deltas a matching [`Vitals::apply_modifiers`] added
    pub fn revert_modifiers(&mut self, mods: &StatModifiers) {
        self.apply_modifiers(&-*mods);
    }

    /// Bring a dead entity back with the given health
    pub fn revive(&mut self, health: i32) {
        self.alive = true;
        self.health = health.clamp(1, self.max_health.max(1));
        self.shield = 0;
        self.last_combat = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_death_flips_once() {
        let mut vitals = Vitals::new(20, 5, 0);
        assert!(!vitals.lose_health(15));
        assert!(vitals.lose_health(10));
        assert_eq!(vitals.health, 0);
        assert!(!vitals.alive);
        assert!(!vitals.lose_health(10));
    }

    #[test]
    fn test_restore_never_exceeds_max() {
        let mut vitals = Vitals::new(100, 5, 0);
        vitals.health = 90;
        assert_eq!(vitals.restore_health(25), 10);
        assert_eq!(vitals.health, 100);
    }

    #[test]
    fn test_max_health_modifier_clamps_health() {
        let mut vitals = Vitals::new(100, 5, 0);
        let mods = StatModifiers { max_health: -30, ..StatModifiers::default() };
        vitals.apply_modifiers(&mods);
        assert_eq!((vitals.health, vitals.max_health), (70, 70));
        vitals.revert_modifiers(&mods);
        assert_eq!((vitals.health, vitals.max_health), (70, 100));
    }

    #[test]
    fn test_negative_max_health_floors_at_zero() {
        let mut vitals = Vitals::new(20, 5, 0);
        vitals.apply_modifiers(&StatModifiers { max_health: -50, ..StatModifiers::default() });
        assert_eq!(vitals.max_health, -30);
        assert!(vitals.lose_health(5));
        assert_eq!(vitals.health, 0);
        assert!(!vitals.alive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_combat_window() {
        let mut vitals = Vitals::new(100, 5, 0);
        let start = Instant::now();
        assert!(!vitals.in_combat(start, Duration::from_secs(10)));
        vitals.flag_combat(start);
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(vitals.in_combat(Instant::now(), Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!vitals.in_combat(Instant::now(), Duration::from_secs(10)));
    }
}
