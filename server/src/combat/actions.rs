//! Ability and skill resolution shared by player `use` and monster AI.

use mud_shared::{ActionDef, ActionKind, GameEvent};
use tokio::time::Instant;

use super::dice::Dice;
use super::resolver::{self, AttackOutcome};
use crate::entities::effect::{self, Effect};
use crate::entities::{Combatant, EntityRef};

/// Result of performing one action
#[derive(Debug, Default)]
pub struct ActionReport {
    pub events: Vec<GameEvent>,
    /// Entity this action killed, if any
    pub killed: Option<EntityRef>,
    /// The target dodged or blocked
    pub avoided: bool,
}

/// Run `f` on the explicit target, or on the actor when there is none
fn on_target<R>(
    actor: &mut dyn Combatant,
    target: Option<&mut dyn Combatant>,
    f: impl FnOnce(&mut dyn Combatant) -> R,
) -> R {
    match target {
        Some(target) => f(target),
        None => f(actor),
    }
}

/// Resolve an action with `actor` as its source.
///
/// `target` is `None` for self-targeted actions. Hostile actions without a
/// target do nothing; callers resolve targets before getting here.
pub fn perform(
    action: &ActionDef,
    actor: &mut dyn Combatant,
    target: Option<&mut dyn Combatant>,
    now: Instant,
    dice: &mut dyn Dice,
) -> ActionReport {
    let mut report = ActionReport::default();
    let amount = action.magnitude();
    let actor_name = actor.name().to_string();

    match action.kind {
        ActionKind::Damage => {
            let Some(target) = target else {
                return report;
            };
            let gross = actor.vitals().power + action.flat + amount + actor.action_scaling();
            let (outcome, event) =
                resolver::strike(actor, target, gross, Some(&action.name), now, dice);
            report.events.push(event);
            report.avoided = outcome.avoided();
            if outcome.killed() {
                report.killed = Some(target.entity_ref());
            }
        }
        ActionKind::Dot => {
            let Some(target) = target else {
                return report;
            };
            effect::attach(
                target.vitals_mut(),
                Effect::dot(&action.name, amount, action.duration, action.tick),
                now,
            );
            actor.vitals_mut().flag_combat(now);
            report.events.push(GameEvent::Afflicted {
                actor: actor_name,
                target: target.name().to_string(),
                effect: action.name.clone(),
            });
        }
        ActionKind::Hot => {
            let target_name = on_target(actor, target, |t| {
                effect::attach(
                    t.vitals_mut(),
                    Effect::hot(&action.name, amount, action.duration, action.tick),
                    now,
                );
                t.name().to_string()
            });
            report.events.push(GameEvent::Blessed {
                actor: actor_name,
                target: target_name,
                effect: action.name.clone(),
            });
        }
        ActionKind::Buff => {
            let modifiers = action.buff_modifiers();
            effect::attach(
                actor.vitals_mut(),
                Effect::buff(&action.name, modifiers, action.duration),
                now,
            );
            report.events.push(GameEvent::Empowered {
                actor: actor_name,
                effect: action.name.clone(),
                modifiers,
                duration: action.duration,
            });
        }
        ActionKind::Shield => {
            let target_name = on_target(actor, target, |t| {
                let vitals = t.vitals_mut();
                vitals.shield += amount.max(0);
                t.name().to_string()
            });
            report.events.push(GameEvent::Shielded { target: target_name, amount });
        }
        ActionKind::Heal => {
            let total = amount + actor.heal_bonus();
            let (target_name, healed) = on_target(actor, target, |t| {
                let healed = resolver::heal(t.vitals_mut(), total);
                (t.name().to_string(), healed)
            });
            report.events.push(GameEvent::Healed {
                actor: actor_name,
                target: target_name,
                amount: healed,
            });
        }
        ActionKind::Lifesteal => {
            let Some(target) = target else {
                return report;
            };
            let gross = amount + actor.drain_bonus();
            let (outcome, leeched) = resolver::lifesteal(actor, target, gross, now, dice);
            let event = match outcome {
                AttackOutcome::Hit(hit) => GameEvent::Drained {
                    actor: actor_name,
                    target: target.name().to_string(),
                    action: action.name.clone(),
                    dealt: hit.dealt,
                    leeched,
                },
                other => resolver::describe(&actor_name, target.name(), Some(&action.name), &other),
            };
            report.events.push(event);
            report.avoided = outcome.avoided();
            if outcome.killed() {
                report.killed = Some(target.entity_ref());
            }
        }
    }
    report
}
