//! Server-side monster entity.

use std::collections::HashMap;
use std::time::Duration;

use mud_shared::{ActionDef, LootEntry, MonsterTemplate};

use super::vitals::Vitals;
use super::{Combatant, EntityRef, MonsterId};
use crate::combat::Dice;

/// Where a monster is in its decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiState {
    /// Counting down to the next decision
    Idle,
    /// Countdown expired and the monster is eligible to act
    Deciding,
    /// Resolving a skill or basic attack
    Acting,
    /// Waiting for the respawn manager to replace it
    Dead,
}

/// A live (or freshly dead) monster instance
#[derive(Debug)]
pub struct Monster {
    pub id: MonsterId,
    pub template_id: String,
    pub name: String,
    pub room: String,
    pub vitals: Vitals,
    pub aggressive: bool,
    pub skills: Vec<ActionDef>,
    /// Skill id -> seconds remaining
    pub skill_cooldowns: HashMap<String, u32>,
    /// Seconds until the next AI decision
    pub ai_countdown: f64,
    pub ai_state: AiState,
    pub respawn_delay: Duration,
    pub loot: Vec<LootEntry>,
}

impl Monster {
    /// Instantiate a template at full health with its AI timer desynchronized
    pub fn spawn(
        id: MonsterId,
        template_id: &str,
        template: &MonsterTemplate,
        room: &str,
        ai_period_secs: f64,
        dice: &mut dyn Dice,
    ) -> Self {
        let period = ai_period_secs.max(0.0).round() as i32;
        Self {
            id,
            template_id: template_id.to_string(),
            name: template.name.clone(),
            room: room.to_string(),
            vitals: Vitals::new(template.health, template.power, template.defense),
            aggressive: template.aggressive,
            skills: template.skills.clone(),
            skill_cooldowns: HashMap::new(),
            ai_countdown: dice.between(0, period) as f64,
            ai_state: AiState::Idle,
            respawn_delay: Duration::from_secs(template.respawn_secs),
            loot: template.loot.clone(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.vitals.alive
    }

    /// Case-insensitive name prefix match against a live monster
    pub fn answers_to(&self, query: &str) -> bool {
        self.vitals.alive && self.name.to_lowercase().starts_with(&query.to_lowercase())
    }

    pub fn tick_cooldowns(&mut self) {
        self.skill_cooldowns.retain(|_, remaining| {
            *remaining = remaining.saturating_sub(1);
            *remaining > 0
        });
    }

    /// Skills whose cooldown has run out
    pub fn ready_skills(&self) -> Vec<&ActionDef> {
        self.skills
            .iter()
            .filter(|skill| self.skill_cooldowns.get(&skill.id).copied().unwrap_or(0) == 0)
            .collect()
    }

    /// Low enough on health to start muttering about it
    pub fn is_wounded(&self) -> bool {
        self.vitals.health <= (self.vitals.max_health / 4).max(5)
    }
}

impl Combatant for Monster {
    fn entity_ref(&self) -> EntityRef {
        EntityRef::Monster(self.id)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    fn vitals_mut(&mut self) -> &mut Vitals {
        &mut self.vitals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::dice::ScriptedDice;
    use mud_shared::ActionKind;

    fn template() -> MonsterTemplate {
        let mut template = MonsterTemplate::new("Moonwolf", 60, 8, 1);
        template.skills = vec![
            ActionDef::new("bite", "Bite", ActionKind::Damage).amount(6).cooldown(6),
            ActionDef::new("howl", "Howl", ActionKind::Buff).amount(2).cooldown(20),
        ];
        template
    }

    #[test]
    fn test_spawn_from_template() {
        let mut dice = ScriptedDice::new(vec![]);
        let monster = Monster::spawn(3, "moonwolf", &template(), "woods", 3.0, &mut dice);
        assert_eq!(monster.vitals.health, 60);
        assert_eq!(monster.respawn_delay, Duration::from_secs(45));
        assert_eq!(monster.ai_state, AiState::Idle);
        assert!((0.0..=3.0).contains(&monster.ai_countdown));
        assert!(monster.answers_to("MOON"));
    }

    #[test]
    fn test_ready_skills_skip_cooling() {
        let mut dice = ScriptedDice::new(vec![]);
        let mut monster = Monster::spawn(3, "moonwolf", &template(), "woods", 3.0, &mut dice);
        monster.skill_cooldowns.insert("bite".into(), 1);
        let ready: Vec<_> = monster.ready_skills().iter().map(|s| s.id.clone()).collect();
        assert_eq!(ready, vec!["howl".to_string()]);
        monster.tick_cooldowns();
        assert_eq!(monster.ready_skills().len(), 2);
    }
}
