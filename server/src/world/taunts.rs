//! Monster chatter.

use mud_shared::GameEvent;

use crate::combat::Dice;

/// Moment in a fight that can set a monster talking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TauntKind {
    Spawn,
    Attack,
    LowHealth,
    Kill,
}

/// Percent chance to speak after using a skill
pub const SKILL_TAUNT_CHANCE: i32 = 40;
/// Percent chance to speak after a basic attack
pub const ATTACK_TAUNT_CHANCE: i32 = 30;
pub const KILL_TAUNT_CHANCE: i32 = 70;
pub const SPAWN_TAUNT_CHANCE: i32 = 25;
/// Per-tick chance that a wounded monster considers speaking, then the odds it does
pub const LOW_HEALTH_CHECK_CHANCE: i32 = 10;
pub const LOW_HEALTH_TAUNT_CHANCE: i32 = 60;

const SPAWN: &[&str] = &["{me}: *prowls into view*"];

const ATTACK: &[&str] = &[
    "{me}: *snarl*",
    "{me}: You'll feed the crows, {you}!",
    "{me}: Pathetic swing!",
    "{me}: Kneel!",
    "{me}: Your bones will sing!",
];

const LOW_HEALTH: &[&str] = &["{me}: I still... stand...", "{me}: Is that all you have?"];

const KILL: &[&str] = &["{me}: Another one falls!", "{me}: The hunt continues."];

impl TauntKind {
    fn lines(self) -> &'static [&'static str] {
        match self {
            Self::Spawn => SPAWN,
            Self::Attack => ATTACK,
            Self::LowHealth => LOW_HEALTH,
            Self::Kill => KILL,
        }
    }
}

/// Roll `chance` and, on success, pick a line for `kind`
pub fn taunt(
    kind: TauntKind,
    me: &str,
    you: Option<&str>,
    chance: i32,
    dice: &mut dyn Dice,
) -> Option<GameEvent> {
    if !dice.chance(chance) {
        return None;
    }
    let lines = kind.lines();
    let line = lines[dice.pick(lines.len())];
    let text = line
        .replace("{me}", me)
        .replace("{you}", you.unwrap_or("you"));
    Some(GameEvent::Taunt { text })
}
