//! Dead monster bookkeeping and replacement.
//!
//! A dead monster stays in its room's list until its replacement spawns, so
//! the time since death can always be read from `dead_at`.

use log::info;
use tokio::time::Instant;

use super::taunts::{self, TauntKind};
use super::{GameWorld, Outbound, RoomInstance};
use crate::entities::{AiState, MonsterId};
use crate::error::TickError;
use mud_shared::GameEvent;

impl RoomInstance {
    /// Record the time of death. Kills record it as they happen; deaths
    /// nothing recorded are stamped on the first tick that sees them.
    /// Later calls keep the first time.
    pub fn mark_dead(&mut self, id: MonsterId, now: Instant) -> Instant {
        *self.dead_at.entry(id).or_insert(now)
    }
}

impl GameWorld {
    /// Called every tick for a dead monster; swaps in a fresh one once its delay has passed
    pub(super) fn process_dead_monster(
        &mut self,
        room_id: &str,
        id: MonsterId,
        now: Instant,
    ) -> Result<Vec<Outbound>, TickError> {
        let template_id = {
            let room = self
                .rooms
                .get_mut(room_id)
                .ok_or_else(|| TickError::UnknownRoom(room_id.to_string()))?;
            let died_at = room.mark_dead(id, now);
            let Some(monster) = room.monster_mut(id) else {
                room.dead_at.remove(&id);
                return Ok(Vec::new());
            };
            monster.ai_state = AiState::Dead;
            if now.saturating_duration_since(died_at) < monster.respawn_delay {
                return Ok(Vec::new());
            }
            monster.template_id.clone()
        };

        let fresh = self
            .instantiate(&template_id, room_id)
            .ok_or_else(|| TickError::UnknownTemplate(template_id.clone()))?;
        let name = fresh.name.clone();

        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| TickError::UnknownRoom(room_id.to_string()))?;
        room.dead_at.remove(&id);
        match room.monsters.iter().position(|m| m.id == id) {
            Some(index) => room.monsters[index] = fresh,
            None => room.monsters.push(fresh),
        }
        info!("Respawned {} in {}", name, room_id);

        let mut out = vec![Outbound::to_room(room_id, GameEvent::MonsterArrived { name: name.clone() })];
        if let Some(event) = taunts::taunt(
            TauntKind::Spawn,
            &name,
            None,
            taunts::SPAWN_TAUNT_CHANCE,
            self.dice.as_mut(),
        ) {
            out.push(Outbound::to_room(room_id, event));
        }
        Ok(out)
    }
}
