//! Timed effects: damage over time, heal over time and temporary buffs.
//!
//! Effects count whole heartbeat ticks. Damage and heal effects fire every
//! `tick_interval` ticks. Buffs never fire; their modifiers are applied once
//! by [`attach`] and reverted once when they expire in [`advance`].

use mud_shared::{GameEvent, StatModifiers};
use tokio::time::Instant;

use super::vitals::Vitals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Dot,
    Hot,
    Buff,
}

/// One active effect instance. Reapplying the same named effect adds a
/// second independent instance.
#[derive(Debug, Clone)]
pub struct Effect {
    pub name: String,
    pub kind: EffectKind,
    /// Per-activation magnitude for dot/hot
    pub amount: i32,
    /// Ticks left before expiry
    pub remaining: i32,
    pub tick_interval: i32,
    pub next_tick_in: i32,
    /// Deltas applied on attach and reverted on expiry (buffs only)
    pub modifiers: StatModifiers,
}

impl Effect {
    fn new(name: &str, kind: EffectKind, amount: i32, duration: i32, tick: i32) -> Self {
        let tick_interval = tick.max(1);
        Self {
            name: name.to_string(),
            kind,
            amount,
            remaining: duration.max(0),
            tick_interval,
            next_tick_in: tick_interval,
            modifiers: StatModifiers::default(),
        }
    }

    pub fn dot(name: &str, amount: i32, duration: i32, tick: i32) -> Self {
        Self::new(name, EffectKind::Dot, amount, duration, tick)
    }

    pub fn hot(name: &str, amount: i32, duration: i32, tick: i32) -> Self {
        Self::new(name, EffectKind::Hot, amount, duration, tick)
    }

    pub fn buff(name: &str, modifiers: StatModifiers, duration: i32) -> Self {
        Self {
            modifiers,
            ..Self::new(name, EffectKind::Buff, 0, duration, 1)
        }
    }
}

/// What happened to an entity's effects during one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectOutcome {
    Damage { effect: String, amount: i32, died: bool },
    Heal { effect: String, amount: i32 },
    Expired { effect: String },
}

impl EffectOutcome {
    pub fn into_event(self, target: &str) -> GameEvent {
        let target = target.to_string();
        match self {
            Self::Damage { effect, amount, .. } => GameEvent::EffectDamage { target, effect, amount },
            Self::Heal { effect, amount } => GameEvent::EffectHeal { target, effect, amount },
            Self::Expired { effect } => GameEvent::EffectExpired { target, effect },
        }
    }
}

/// Add an effect to an entity. Buff modifiers take hold immediately.
pub fn attach(vitals: &mut Vitals, effect: Effect, now: Instant) {
    if effect.kind == EffectKind::Buff {
        vitals.apply_modifiers(&effect.modifiers);
    }
    vitals.effects.push(effect);
    vitals.flag_combat(now);
}

/// Advance every effect by one tick.
///
/// All effects that expire this tick have their modifiers reverted before the
/// outcomes are returned.
pub fn advance(vitals: &mut Vitals, now: Instant) -> Vec<EffectOutcome> {
    let mut outcomes = Vec::new();
    let mut expired = Vec::new();
    let mut active = std::mem::take(&mut vitals.effects);

    for effect in active.iter_mut() {
        effect.remaining -= 1;
        effect.next_tick_in -= 1;

        if effect.next_tick_in <= 0 {
            effect.next_tick_in = effect.tick_interval;
            match effect.kind {
                EffectKind::Dot if vitals.alive => {
                    let died = vitals.lose_health(effect.amount);
                    vitals.flag_combat(now);
                    outcomes.push(EffectOutcome::Damage {
                        effect: effect.name.clone(),
                        amount: effect.amount,
                        died,
                    });
                }
                EffectKind::Hot if vitals.alive => {
                    let amount = vitals.restore_health(effect.amount);
                    outcomes.push(EffectOutcome::Heal { effect: effect.name.clone(), amount });
                }
                _ => {}
            }
        }
    }

    active.retain(|effect| {
        if effect.remaining <= 0 {
            expired.push(effect.clone());
            false
        } else {
            true
        }
    });

    for effect in &expired {
        if effect.kind == EffectKind::Buff {
            vitals.revert_modifiers(&effect.modifiers);
        }
        outcomes.push(EffectOutcome::Expired { effect: effect.name.clone() });
    }

    vitals.effects = active;
    outcomes
}

/// Remove every effect at once, reverting buffs. Used on death.
pub fn strip(vitals: &mut Vitals) {
    for effect in std::mem::take(&mut vitals.effects) {
        if effect.kind == EffectKind::Buff {
            vitals.revert_modifiers(&effect.modifiers);
        }
    }
}

/// Sum of the modifiers of all active buffs
pub fn active_modifiers(vitals: &Vitals) -> StatModifiers {
    vitals
        .effects
        .iter()
        .filter(|e| e.kind == EffectKind::Buff)
        .fold(StatModifiers::default(), |acc, e| acc + e.modifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_fires_on_interval() {
        let now = Instant::now();
        let mut vitals = Vitals::new(100, 10, 0);
        attach(&mut vitals, Effect::dot("Ignite", 5, 10, 2), now);

        let mut fired = 0;
        for _ in 0..10 {
            for outcome in advance(&mut vitals, now) {
                if matches!(outcome, EffectOutcome::Damage { .. }) {
                    fired += 1;
                }
            }
        }
        assert_eq!(fired, 5);
        assert_eq!(vitals.health, 75);
        assert!(vitals.effects.is_empty());
    }

    #[test]
    fn test_stacked_buffs_revert_independently() {
        let now = Instant::now();
        let mut vitals = Vitals::new(100, 10, 0);
        attach(&mut vitals, Effect::buff("Battle Cry", StatModifiers::power(10), 5), now);
        assert_eq!(vitals.power, 20);
        advance(&mut vitals, now);
        attach(&mut vitals, Effect::buff("Battle Cry", StatModifiers::power(3), 2), now);
        assert_eq!(vitals.power, 23);

        for _ in 0..2 {
            advance(&mut vitals, now);
        }
        assert_eq!(vitals.power, 20);
        assert_eq!(vitals.effects.len(), 1);

        for _ in 0..2 {
            advance(&mut vitals, now);
        }
        assert_eq!(vitals.power, 10);
        assert!(vitals.effects.is_empty());
    }

    #[test]
    fn test_zero_duration_buff_applies_then_reverts() {
        let now = Instant::now();
        let mut vitals = Vitals::new(100, 10, 0);
        attach(&mut vitals, Effect::buff("Flash", StatModifiers::power(4), 0), now);
        assert_eq!(vitals.power, 14);
        let outcomes = advance(&mut vitals, now);
        assert_eq!(outcomes, vec![EffectOutcome::Expired { effect: "Flash".into() }]);
        assert_eq!(vitals.power, 10);
    }

    #[test]
    fn test_dot_can_kill_and_stops_after_death() {
        let now = Instant::now();
        let mut vitals = Vitals::new(100, 10, 0);
        vitals.health = 4;
        attach(&mut vitals, Effect::dot("Curse", 5, 3, 1), now);
        let outcomes = advance(&mut vitals, now);
        assert!(matches!(outcomes[0], EffectOutcome::Damage { died: true, .. }));
        assert_eq!(vitals.health, 0);
        assert!(advance(&mut vitals, now).iter().all(|o| !matches!(o, EffectOutcome::Damage { .. })));
    }

    #[test]
    fn test_hot_clamps_to_max() {
        let now = Instant::now();
        let mut vitals = Vitals::new(100, 10, 0);
        vitals.health = 97;
        attach(&mut vitals, Effect::hot("Renew", 6, 2, 1), now);
        let outcomes = advance(&mut vitals, now);
        assert_eq!(outcomes, vec![EffectOutcome::Heal { effect: "Renew".into(), amount: 3 }]);
        assert_eq!(vitals.health, 100);
    }
}
