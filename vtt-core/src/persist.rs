//! Table persistence for save/load.
//!
//! A save captures the table configuration, board snapshot, roster and chat
//! log as pretty-printed JSON. Loading checks the format version before
//! rebuilding the table.

use crate::board::{Board, BoardError, BoardSnapshot};
use crate::catalog::Catalog;
use crate::chat::ChatLog;
use crate::entity::Roster;
use crate::tabletop::{Tabletop, TabletopConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid board in save: {0}")]
    InvalidBoard(#[from] BoardError),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// A saved table with everything needed to resume play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTable {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// Seconds since the Unix epoch when the save was created.
    pub saved_at: String,

    pub config: TabletopConfig,

    /// Occupancy and terrain keyed by `"row,col"`.
    pub board: BoardSnapshot,

    pub roster: Roster,

    #[serde(default)]
    pub chat: ChatLog,
}

impl SavedTable {
    /// Capture the current state of a table.
    pub fn capture(table: &Tabletop) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: chrono_now(),
            config: table.config().clone(),
            board: table.snapshot(),
            roster: table.roster().clone(),
            chat: table.chat_log().clone(),
        }
    }

    /// Rebuild a table. The catalog is reference data and is not saved.
    pub fn into_tabletop(self, catalog: Arc<Catalog>) -> Result<Tabletop, PersistError> {
        let board = Board::from_snapshot(&self.board)?;
        let mut table = Tabletop::with_parts(self.config, catalog, board, self.roster);
        *table.chat_log_mut() = self.chat;
        Ok(table)
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a save, rejecting other format versions.
    pub fn from_json(content: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = self.to_json()?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Read the name and timestamp of a save without loading the roster.
    pub async fn peek(path: impl AsRef<Path>) -> Result<SaveInfo, PersistError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            saved_at: String,
            config: PartialConfig,
        }

        #[derive(Deserialize)]
        struct PartialConfig {
            name: String,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(SaveInfo {
            path: path.to_path_buf(),
            name: partial.config.name,
            saved_at: partial.saved_at,
        })
    }
}

/// Summary of a save file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveInfo {
    pub path: PathBuf,
    pub name: String,
    pub saved_at: String,
}

/// List readable saves in a directory, newest first.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(info) = SavedTable::peek(&path).await {
                saves.push(info);
            }
        }
    }

    saves.sort_by(|a, b| {
        let a_time = a.saved_at.parse::<u64>().unwrap_or(0);
        let b_time = b.saved_at.parse::<u64>().unwrap_or(0);
        b_time.cmp(&a_time).then_with(|| a.path.cmp(&b.path))
    });
    Ok(saves)
}

/// File name for a table's save inside `base_dir`.
pub fn save_path(base_dir: impl AsRef<Path>, table_name: &str) -> PathBuf {
    let sanitized = table_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

/// Seconds since the Unix epoch, as a string.
fn chrono_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::TerrainEffect;
    use crate::entity::{Character, EntityRef, Monster, StatBlock, User};
    use crate::grid::Cell;

    fn sample_table() -> Tabletop {
        let mut table = Tabletop::new(
            TabletopConfig::new("Goblin Cave"),
            Arc::new(Catalog::standard()),
        );
        let dm = User::dm("gm");
        let hero = table.add_character(Character::new(1, "alice", StatBlock::new("Aria", 12)));
        let goblin = table.add_monster(Monster::new(1, StatBlock::new("Goblin", 7)));
        table.place(&dm, hero, Cell::new(2, 2)).unwrap();
        table.place(&dm, goblin, Cell::new(2, 4)).unwrap();
        table.chat_log_mut().narrate("The torches flicker.");
        table
    }

    #[test]
    fn test_capture_and_rebuild() {
        let table = sample_table();
        let saved = SavedTable::capture(&table);
        assert_eq!(saved.version, SAVE_VERSION);
        assert_eq!(saved.board.occupancy.len(), 2);

        let json = saved.to_json().unwrap();
        let loaded = SavedTable::from_json(&json).unwrap();
        let rebuilt = loaded.into_tabletop(Arc::new(Catalog::standard())).unwrap();

        assert_eq!(rebuilt.name(), "Goblin Cave");
        assert_eq!(rebuilt.board(), table.board());
        assert!(rebuilt.roster().character(1).unwrap().placed);
        assert_eq!(rebuilt.chat_log().len(), 1);
    }

    #[test]
    fn test_version_mismatch() {
        let mut saved = SavedTable::capture(&sample_table());
        saved.version = 99;
        let json = saved.to_json().unwrap();
        assert!(matches!(
            SavedTable::from_json(&json),
            Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: 99
            })
        ));
    }

    #[test]
    fn test_corrupt_board_is_rejected() {
        let mut saved = SavedTable::capture(&sample_table());
        saved
            .board
            .occupancy
            .insert("-1,0".to_string(), EntityRef::monster(1));
        assert!(matches!(
            saved.into_tabletop(Arc::new(Catalog::standard())),
            Err(PersistError::InvalidBoard(_))
        ));
    }

    #[test]
    fn test_terrain_survives() {
        let mut table = sample_table();
        let mut snapshot = table.snapshot();
        snapshot
            .terrain
            .insert("0,0".to_string(), TerrainEffect::new("acidic ground", 5));
        table.restore(&snapshot).unwrap();

        let json = SavedTable::capture(&table).to_json().unwrap();
        let rebuilt = SavedTable::from_json(&json)
            .unwrap()
            .into_tabletop(Arc::new(Catalog::standard()))
            .unwrap();
        assert_eq!(
            rebuilt.board().terrain_at(Cell::new(0, 0)).map(|t| t.kind.as_str()),
            Some("acidic ground")
        );
    }

    #[test]
    fn test_save_path_sanitizes() {
        let path = save_path("/tmp/saves", "Goblin Cave: Part 2");
        assert_eq!(path, PathBuf::from("/tmp/saves/Goblin_Cave__Part_2.json"));
    }

    #[tokio::test]
    async fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_path(dir.path(), "Goblin Cave");

        SavedTable::capture(&sample_table())
            .save_json(&path)
            .await
            .unwrap();
        let loaded = SavedTable::load_json(&path).await.unwrap();
        assert_eq!(loaded.config.name, "Goblin Cave");

        let saves = list_saves(dir.path()).await.unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].name, "Goblin Cave");
    }
}
