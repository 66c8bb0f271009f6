//! Error types for the game server.
//!
//! Startup problems are [`ConfigError`]s and stop the process. Everything a
//! player can get wrong is an [`ActionError`], reported back as one line and
//! never mutating state. Heartbeat failures are [`TickError`]s scoped to a
//! single entity.

use std::path::PathBuf;

/// Fatal problems while loading configuration or building the world.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A config or catalog file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config or catalog file is not valid JSON for its schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A room spawn names a monster template the catalog does not define.
    #[error("room {room} spawns unknown monster template {template}")]
    UnknownTemplate { room: String, template: String },

    /// The respawn/recall room is missing from the catalog.
    #[error("default room {0} is not in the catalog")]
    MissingDefaultRoom(String),
}

/// Rejections reported to the acting player.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown ability.")]
    UnknownAbility,

    #[error("{name} is still cooling down ({remaining}s).")]
    OnCooldown { name: String, remaining: u32 },

    #[error("No valid target.")]
    NoTarget,

    #[error("There is nothing here to fight.")]
    NoEnemies,

    #[error("No such monster here.")]
    NoSuchMonster,

    #[error("You can't go that way.")]
    NoExit,

    #[error("You can't leave while in combat!")]
    FleeInCombat,

    #[error("You can't recall while in combat!")]
    RecallInCombat,

    #[error("You can't rest while in combat!")]
    RestInCombat,

    #[error("You are already resting.")]
    AlreadyResting,

    #[error("You are dead.")]
    Dead,

    #[error("You don't see that here.")]
    NothingHere,

    #[error("You don't have that.")]
    NotCarried,

    #[error("You can't equip that.")]
    NotEquippable,

    #[error("Nothing equipped there.")]
    SlotEmpty,

    #[error("No such player.")]
    UnknownPlayer,
}

/// Failures while advancing a single entity during a heartbeat tick.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A dead monster's template vanished from the catalog.
    #[error("monster template {0} is not in the catalog")]
    UnknownTemplate(String),

    /// An entity points at a room the world does not know.
    #[error("room {0} does not exist")]
    UnknownRoom(String),

    /// A player disappeared between lookup and update.
    #[error("player {0} vanished mid-tick")]
    MissingPlayer(u64),
}

/// Failures in the player save store.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("save file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("save file is malformed: {0}")]
    Serde(#[from] serde_json::Error),

    /// The background task has shut down.
    #[error("persistence task is closed")]
    Closed,
}
