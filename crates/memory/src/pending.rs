//! Single-slot store for the one episode awaiting reflection.
//!
//! Not a queue: `put` overwrites whatever was there, `clear` empties the
//! slot. The slot is a lone JSON file written atomically, so the pending
//! episode survives a restart between decision and reflection.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::episode::Episode;
use crate::error::MemoryError;

pub struct PendingSlot {
    path: PathBuf,
}

impl PendingSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stores `episode`, replacing any previous occupant.
    pub fn put(&mut self, episode: &Episode) -> Result<(), MemoryError> {
        let json = serde_json::to_string_pretty(episode)
            .map_err(|e| MemoryError::Corrupt(format!("failed to encode pending episode: {e}")))?;

        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Stored pending episode");
        Ok(())
    }

    /// The current occupant, or `None` for an empty slot.
    pub fn get(&self) -> Result<Option<Episode>, MemoryError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let episode = serde_json::from_str(&json)
            .map_err(|e| MemoryError::Corrupt(format!("unreadable pending episode: {e}")))?;
        Ok(Some(episode))
    }

    /// Empties the slot. Clearing an already-empty slot is a no-op.
    pub fn clear(&mut self) -> Result<(), MemoryError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Cleared pending episode");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use moneta_common::Portfolio;
    use tempfile::TempDir;

    use crate::episode::Experience;

    use super::*;

    fn slot(dir: &TempDir) -> PendingSlot {
        PendingSlot::new(dir.path().join("pending.json"))
    }

    fn episode(news: &str) -> Episode {
        let date = Utc.with_ymd_and_hms(2024, 1, 21, 10, 0, 0).unwrap();
        Episode::new(Experience::new(date, news, Portfolio::new()))
    }

    #[test]
    fn empty_slot_reads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(slot(&dir).get().unwrap().is_none());
    }

    #[test]
    fn put_overwrites_the_previous_occupant() {
        let dir = TempDir::new().unwrap();
        let mut slot = slot(&dir);
        slot.put(&episode("first")).unwrap();
        slot.put(&episode("second")).unwrap();

        let stored = slot.get().unwrap().unwrap();
        assert_eq!(stored.experience.perception.news_text, "second");
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut slot = slot(&dir);
        slot.clear().unwrap();

        slot.put(&episode("short lived")).unwrap();
        slot.clear().unwrap();
        slot.clear().unwrap();
        assert!(slot.get().unwrap().is_none());
    }

    #[test]
    fn occupant_survives_a_new_handle() {
        let dir = TempDir::new().unwrap();
        slot(&dir).put(&episode("persisted")).unwrap();

        let stored = slot(&dir).get().unwrap().unwrap();
        assert_eq!(stored.experience.perception.news_text, "persisted");
    }
}
