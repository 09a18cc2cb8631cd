//! Bounded record of finished careers, newest first.
//!
//! The list itself is pure; reading and writing it goes through a
//! [`HistoryStore`], whose failures never reach the simulation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::types::{MAX_HISTORY_ENTRIES, SimulationSummary};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    entries: Vec<SimulationSummary>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most the first [`MAX_HISTORY_ENTRIES`] of `entries`.
    pub fn from_entries(mut entries: Vec<SimulationSummary>) -> Self {
        entries.truncate(MAX_HISTORY_ENTRIES);
        Self { entries }
    }

    pub fn record(&mut self, summary: SimulationSummary) {
        self.entries.insert(0, summary);
        self.entries.truncate(MAX_HISTORY_ENTRIES);
    }

    pub fn entries(&self) -> &[SimulationSummary] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.entries
            .iter()
            .map(|entry| entry.score)
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Loads from `store`, starting fresh if the store cannot be read.
    pub fn load(store: &dyn HistoryStore) -> Self {
        match store.load() {
            Ok(entries) => {
                log::info!("Loaded {} past careers", entries.len());
                Self::from_entries(entries)
            }
            Err(e) => {
                log::warn!("Failed to load career history, starting fresh: {e}");
                Self::new()
            }
        }
    }

    /// Best-effort write; a failing store is logged and skipped.
    pub fn persist(&self, store: &dyn HistoryStore) -> bool {
        match store.save(&self.entries) {
            Ok(()) => {
                log::info!("Career history saved ({} entries)", self.entries.len());
                true
            }
            Err(e) => {
                log::warn!("Skipping career history save: {e}");
                false
            }
        }
    }
}

pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Result<Vec<SimulationSummary>, String>;
    fn save(&self, entries: &[SimulationSummary]) -> Result<(), String>;
}

/// JSON array on disk. A missing file is an empty history.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> Result<Vec<SimulationSummary>, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("cannot read {}: {e}", self.path.display())),
        };
        serde_json::from_str(&raw)
            .map_err(|e| format!("cannot parse {}: {e}", self.path.display()))
    }

    fn save(&self, entries: &[SimulationSummary]) -> Result<(), String> {
        let json = serde_json::to_string(entries)
            .map_err(|e| format!("cannot serialize history: {e}"))?;
        fs::write(&self.path, json)
            .map_err(|e| format!("cannot write {}: {e}", self.path.display()))
    }
}
