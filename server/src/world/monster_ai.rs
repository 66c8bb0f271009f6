//! Monster AI: countdown, target choice, skill-or-strike, chatter.
//!
//! Each live monster carries its own countdown so monsters never act in
//! lockstep. A monster only decides when its countdown has run out and it is
//! either aggressive or already fighting.

use std::collections::HashMap;

use log::debug;
use mud_shared::TargetType;
use tokio::time::Instant;

use super::taunts::{self, TauntKind};
use super::Outbound;
use crate::combat::{self, resolver, Dice};
use crate::config::GameConfig;
use crate::entities::{AiState, Combatant, EntityRef, Monster, Player, PlayerId};

/// What one AI step produced
#[derive(Debug, Default)]
pub struct AiTurn {
    pub outbound: Vec<Outbound>,
    /// Player this monster just killed
    pub killed: Option<PlayerId>,
}

/// Advance a live monster's AI by one tick
pub fn step(
    monster: &mut Monster,
    players: &mut HashMap<PlayerId, Player>,
    config: &GameConfig,
    dice: &mut dyn Dice,
    now: Instant,
) -> AiTurn {
    let mut turn = AiTurn::default();
    monster.ai_countdown = (monster.ai_countdown - config.tick_secs).max(0.0);

    let mut candidates: Vec<PlayerId> = players
        .values()
        .filter(|p| p.room == monster.room && p.vitals.alive)
        .map(|p| p.id)
        .collect();
    candidates.sort_unstable();

    // rolled every tick, whether or not the monster gets to act
    if !candidates.is_empty()
        && monster.is_wounded()
        && dice.chance(taunts::LOW_HEALTH_CHECK_CHANCE)
    {
        if let Some(event) = taunts::taunt(
            TauntKind::LowHealth,
            &monster.name,
            None,
            taunts::LOW_HEALTH_TAUNT_CHANCE,
            dice,
        ) {
            turn.outbound.push(Outbound::to_room(&monster.room, event));
        }
    }

    let eligible =
        monster.aggressive || monster.vitals.in_combat(now, config.combat_window());
    if monster.ai_countdown > 0.0 || !eligible {
        monster.ai_state = AiState::Idle;
        return turn;
    }

    monster.ai_state = AiState::Deciding;
    if !candidates.is_empty() {
        let victim = candidates[dice.pick(candidates.len())];
        if let Some(player) = players.get_mut(&victim) {
            act(monster, player, dice, now, &mut turn);
        }
    }

    let jitter = config.ai_jitter_secs.abs();
    monster.ai_countdown = (config.ai_period_secs + dice.range(-jitter, jitter)).max(0.0);
    if monster.is_alive() {
        monster.ai_state = AiState::Idle;
    }
    turn
}

/// Use a ready skill if there is one, otherwise strike
fn act(monster: &mut Monster, player: &mut Player, dice: &mut dyn Dice, now: Instant, turn: &mut AiTurn) {
    monster.ai_state = AiState::Acting;
    let room = monster.room.clone();
    let victim = player.name.clone();

    let ready: Vec<_> = monster.ready_skills().into_iter().cloned().collect();
    let (killed, chatter) = if ready.is_empty() {
        let gross = monster.strike_power();
        let (outcome, event) = resolver::strike(monster, player, gross, None, now, dice);
        turn.outbound.push(Outbound::to_room(&room, event));
        (outcome.killed(), taunts::ATTACK_TAUNT_CHANCE)
    } else {
        let skill = &ready[dice.pick(ready.len())];
        debug!("{} ({}) uses {} on {}", monster.name, monster.id, skill.id, victim);
        let target = match skill.effective_target() {
            TargetType::Enemy => Some(&mut *player as &mut dyn Combatant),
            TargetType::SelfOnly | TargetType::Ally => None,
        };
        let report = combat::perform(skill, monster, target, now, dice);
        if skill.cooldown > 0 {
            monster.skill_cooldowns.insert(skill.id.clone(), skill.cooldown);
        }
        turn.outbound
            .extend(report.events.into_iter().map(|e| Outbound::to_room(&room, e)));
        (
            report.killed == Some(EntityRef::Player(player.id)),
            taunts::SKILL_TAUNT_CHANCE,
        )
    };

    let taunt = if killed {
        turn.killed = Some(player.id);
        taunts::taunt(TauntKind::Kill, &monster.name, Some(&victim), taunts::KILL_TAUNT_CHANCE, dice)
    } else {
        taunts::taunt(TauntKind::Attack, &monster.name, Some(&victim), chatter, dice)
    };
    if let Some(event) = taunt {
        turn.outbound.push(Outbound::to_room(&room, event));
    }
}
