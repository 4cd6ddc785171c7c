//! Durable catalog of finished episodes.
//!
//! One JSON Lines file, one `{id, episode}` envelope per line, appended and
//! fsynced on every save. Ids are assigned here and are the join key into
//! the vector index; they start at 1 and never repeat, even across reopens.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::episode::Episode;
use crate::error::MemoryError;

#[derive(Serialize, Deserialize)]
struct CatalogRecord {
    id: u64,
    episode: Episode,
}

pub struct EpisodeCatalog {
    path: PathBuf,
    records: BTreeMap<u64, Episode>,
    next_id: u64,
}

impl EpisodeCatalog {
    /// Opens the catalog at `path`, replaying the file if it exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let path = path.into();
        let mut records = BTreeMap::new();

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            for (line_no, line) in contents.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: CatalogRecord = serde_json::from_str(line).map_err(|e| {
                    MemoryError::Corrupt(format!(
                        "catalog line {} unreadable: {e}",
                        line_no + 1
                    ))
                })?;
                records.insert(record.id, record.episode);
            }
            info!(
                path = %path.display(),
                episodes = records.len(),
                "Restored episode catalog"
            );
        }

        let next_id = records.keys().next_back().map_or(1, |max| max + 1);
        Ok(Self {
            path,
            records,
            next_id,
        })
    }

    /// Appends `episode` under a freshly assigned id and returns the id.
    /// The line is flushed and synced before this returns.
    pub fn save(&mut self, episode: &Episode) -> Result<u64, MemoryError> {
        let id = self.next_id;
        let record = CatalogRecord {
            id,
            episode: episode.clone(),
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| MemoryError::Corrupt(format!("failed to encode episode: {e}")))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.sync_all()?;

        self.records.insert(id, record.episode);
        self.next_id += 1;
        debug!(id, episodes = self.records.len(), "Catalogued episode");
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Result<Episode, MemoryError> {
        self.records
            .get(&id)
            .cloned()
            .ok_or(MemoryError::NotFound(id))
    }

    /// All records in insertion order. Diagnostics, not hot-path retrieval.
    pub fn all(&self) -> Vec<(u64, Episode)> {
        self.records
            .iter()
            .map(|(id, episode)| (*id, episode.clone()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }
}
