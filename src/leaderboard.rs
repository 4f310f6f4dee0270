//! Flat-file leaderboard
//!
//! A JSON array of the best scores, rewritten wholesale on each save.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Maximum entries kept on disk
pub const MAX_ENTRIES: usize = 10;

/// One leaderboard line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
    pub wave: u32,
    pub kills: u32,
}

/// Leaderboard persistence errors
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("Leaderboard I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Leaderboard JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory leaderboard bound to its file
#[derive(Debug, Clone)]
pub struct Leaderboard {
    path: PathBuf,
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Empty board that will save to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Load from disk. A missing or corrupt file yields an empty board.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(LeaderboardError::Io(e)) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Ignoring unreadable leaderboard {}: {}", path.display(), e);
                Vec::new()
            }
        };

        let mut board = Self { path, entries };
        board.normalize();
        board
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge new results, keeping the top entries by score
    pub fn record(&mut self, results: impl IntoIterator<Item = LeaderboardEntry>) {
        self.entries.extend(results);
        self.normalize();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Rewrite the whole file
    pub fn save(&self) -> Result<(), LeaderboardError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        info!("Leaderboard saved ({} entries)", self.entries.len());
        Ok(())
    }

    fn normalize(&mut self) {
        // Stable sort keeps earlier entries ahead on ties
        self.entries.sort_by(|a, b| b.score.cmp(&a.score));
        self.entries.truncate(MAX_ENTRIES);
    }
}

fn read_entries(path: &Path) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
