//! Persistence layer for the MUD server.
//!
//! Player saves and loads happen in a background task so that no world lock is
//! ever held across file I/O. The game side only talks to it through a
//! [`PersistenceHandle`].

mod store;

use store::JsonStore;

use std::collections::HashMap;
use std::path::Path;

use log::{error, info, warn};
use mud_shared::{Archetype, EquipSlot, PrimaryStats};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::PersistenceError;

/// Everything about a player that survives a disconnect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub name: String,
    pub archetype: Archetype,
    pub room: String,
    pub health: i32,
    pub max_health: i32,
    pub power: i32,
    pub defense: i32,
    #[serde(default)]
    pub shield: i32,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub xp: u32,
    #[serde(default)]
    pub obols: u32,
    pub stats: PrimaryStats,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub equipment: HashMap<EquipSlot, String>,
    /// Ability id -> seconds remaining at save time
    #[serde(default)]
    pub cooldowns: HashMap<String, u32>,
}

fn default_level() -> u32 {
    1
}

/// Commands sent to the persistence background task
#[derive(Debug)]
pub enum PersistenceCommand {
    /// Write a player's snapshot to disk
    SavePlayer { snapshot: PlayerSnapshot },
    /// Load a player by name (response sent via oneshot channel)
    LoadPlayer {
        name: String,
        response: oneshot::Sender<Option<PlayerSnapshot>>,
    },
    /// Stop after everything queued ahead of this has been handled
    Shutdown { done: oneshot::Sender<()> },
}

/// Handle for sending commands to the persistence task
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceHandle {
    /// Save a snapshot (fire and forget - non-blocking)
    pub fn save_player(&self, snapshot: PlayerSnapshot) {
        let name = snapshot.name.clone();
        if let Err(e) = self.sender.try_send(PersistenceCommand::SavePlayer { snapshot }) {
            warn!("Dropped save for {}: {}", name, e);
        }
    }

    /// Save a snapshot, waiting for queue space instead of dropping it
    pub async fn save_player_now(&self, snapshot: PlayerSnapshot) -> Result<(), PersistenceError> {
        self.sender
            .send(PersistenceCommand::SavePlayer { snapshot })
            .await
            .map_err(|_| PersistenceError::Closed)
    }

    /// Load a player's snapshot, `None` if there is no save
    pub async fn load_player(&self, name: &str) -> Option<PlayerSnapshot> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(PersistenceCommand::LoadPlayer { name: name.to_string(), response: tx })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Shut down the persistence task once queued saves are written
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(PersistenceCommand::Shutdown { done: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// Open the save directory and spawn the background task.
/// Returns a handle for sending commands.
pub async fn init(save_dir: &Path) -> Result<PersistenceHandle, PersistenceError> {
    let store = JsonStore::open(save_dir).await?;
    info!("Player saves live in {:?}", save_dir);

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(persistence_task(store, rx));
    info!("Persistence background task started");

    Ok(PersistenceHandle { sender: tx })
}

/// Background task that handles all persistence operations
async fn persistence_task(store: JsonStore, mut rx: mpsc::Receiver<PersistenceCommand>) {
    info!("Persistence task running");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            PersistenceCommand::SavePlayer { snapshot } => {
                if let Err(e) = store.save(&snapshot).await {
                    error!("Failed to save {}: {}", snapshot.name, e);
                }
            }

            PersistenceCommand::LoadPlayer { name, response } => {
                let result = match store.load(&name).await {
                    Ok(Some(snapshot)) => {
                        info!("Loaded {} from disk", name);
                        Some(snapshot)
                    }
                    Ok(None) => {
                        info!("No saved data for {}", name);
                        None
                    }
                    Err(e) => {
                        error!("Failed to load {}: {}", name, e);
                        None
                    }
                };
                let _ = response.send(result);
            }

            PersistenceCommand::Shutdown { done } => {
                info!("Persistence task shutting down");
                let _ = done.send(());
                break;
            }
        }
    }

    info!("Persistence task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> PlayerSnapshot {
        PlayerSnapshot {
            name: name.to_string(),
            archetype: Archetype::Rogue,
            room: "city_gate".into(),
            health: 80,
            max_health: 100,
            power: 14,
            defense: 0,
            shield: 0,
            level: 1,
            xp: 30,
            obols: 4,
            stats: Archetype::Rogue.base_stats(),
            inventory: vec!["Buckler".into()],
            equipment: HashMap::from([(EquipSlot::Shield, "Buckler".to_string())]),
            cooldowns: HashMap::from([("backstab".to_string(), 3)]),
        }
    }

    #[tokio::test]
    async fn test_save_then_load_through_task() {
        let dir = std::env::temp_dir().join(format!("mud-persist-{}", std::process::id()));
        let handle = init(&dir).await.unwrap();

        assert!(handle.load_player("Nobody").await.is_none());
        handle.save_player(sample("Vex"));
        let loaded = handle.load_player("vex").await.unwrap();
        assert_eq!(loaded, sample("Vex"));

        handle.shutdown().await;
        assert!(handle.load_player("Vex").await.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_snapshot_defaults_missing_fields() {
        let json = r#"{
            "name": "Old", "archetype": "Mage", "room": "trade_district",
            "health": 50, "max_health": 100, "power": 12, "defense": 0,
            "stats": {"strength": 8, "intellect": 15, "dexterity": 10, "defense": 3, "luck": 10}
        }"#;
        let snapshot: PlayerSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.level, 1);
        assert!(snapshot.inventory.is_empty());
        assert!(snapshot.equipment.is_empty());
    }
}
