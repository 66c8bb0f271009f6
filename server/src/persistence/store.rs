//! One JSON file per player under the save directory.

use std::path::{Path, PathBuf};

use super::PlayerSnapshot;
use crate::error::PersistenceError;

/// File-backed player store
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Create the save directory if needed
    pub async fn open(dir: &Path) -> Result<Self, PersistenceError> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    /// Save files are keyed by lowercase name, so lookups ignore case
    fn path_for(&self, name: &str) -> PathBuf {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_lowercase();
        self.dir.join(format!("{}.json", key))
    }

    /// Write through a temp file so a crash never leaves half a save
    pub async fn save(&self, snapshot: &PlayerSnapshot) -> Result<(), PersistenceError> {
        let path = self.path_for(&snapshot.name);
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn load(&self, name: &str) -> Result<Option<PlayerSnapshot>, PersistenceError> {
        match tokio::fs::read_to_string(self.path_for(name)).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
