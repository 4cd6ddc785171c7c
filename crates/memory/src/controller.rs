//! Orchestrates catalog, index, pending slot and embedder into one episodic
//! memory.
//!
//! Each episode moves through a two-state machine: pending (in the slot,
//! unembedded, unsearchable) then finished (catalogued and indexed under the
//! same id). `finalize` writes the catalog before the index, so a crash in
//! between leaves at worst an orphaned catalog record; the index never holds
//! an id the catalog cannot resolve unless storage is damaged out-of-band,
//! and that case surfaces as an error instead of a silently shorter result.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::catalog::EpisodeCatalog;
use crate::embedding::Embedder;
use crate::episode::{Episode, ScoredEpisode};
use crate::error::MemoryError;
use crate::index::VectorIndex;
use crate::pending::PendingSlot;

pub const CATALOG_FILE: &str = "episodes.jsonl";
pub const INDEX_FILE: &str = "embeddings.idx";
pub const PENDING_FILE: &str = "pending.json";

pub struct MemoryController {
    catalog: EpisodeCatalog,
    index: VectorIndex,
    slot: PendingSlot,
    embedder: Arc<dyn Embedder>,
}

impl MemoryController {
    /// Opens (or creates) the memory rooted at `dir`. The index is bound to
    /// the embedder's dimension; reopening with a different embedder fails
    /// here rather than at the first add.
    pub fn open(dir: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, MemoryError> {
        std::fs::create_dir_all(dir)?;
        let index = VectorIndex::open(dir.join(INDEX_FILE), embedder.dimension())?;
        let catalog = EpisodeCatalog::open(dir.join(CATALOG_FILE))?;
        let slot = PendingSlot::new(dir.join(PENDING_FILE));

        info!(
            dir = %dir.display(),
            episodes = catalog.count(),
            indexed = index.len(),
            dimension = embedder.dimension(),
            "Opened episodic memory"
        );
        Ok(Self {
            catalog,
            index,
            slot,
            embedder,
        })
    }

    /// Parks a not-yet-reflected episode in the pending slot, replacing any
    /// previous occupant. Rejected before any write if the episode already
    /// carries a reflection.
    pub fn save_pending(&mut self, episode: &Episode) -> Result<(), MemoryError> {
        if episode.is_finished() {
            return Err(MemoryError::InvalidState(
                "a pending episode must not carry a reflection",
            ));
        }
        self.slot.put(episode)
    }

    /// The episode currently awaiting reflection, if any.
    pub fn get_pending(&self) -> Result<Option<Episode>, MemoryError> {
        self.slot.get()
    }

    /// Commits a finished episode to long-term memory and returns its id.
    ///
    /// Runs catalog save, render, embed, index add, slot clear, in that
    /// order; each step is a separate failure point and nothing is rolled
    /// back on error.
    #[instrument(skip(self, episode))]
    pub async fn finalize(&mut self, episode: &Episode) -> Result<u64, MemoryError> {
        if episode.is_pending() {
            return Err(MemoryError::InvalidState(
                "an episode needs a reflection before it can be finalized",
            ));
        }

        let id = self.catalog.save(episode)?;
        let text = episode.to_string();
        let vector = self.embedder.embed(&text).await?;
        self.index.add(&vector, id)?;
        self.slot.clear()?;

        info!(id, episodes = self.catalog.count(), "Finalized episode");
        Ok(id)
    }

    /// The `k` finished episodes most similar to `query`, nearest first, or
    /// `None` if nothing has ever been finalized.
    ///
    /// Every index hit is resolved through the catalog; an id the catalog
    /// cannot resolve is a consistency error, not a skippable hit.
    #[instrument(skip(self, query))]
    pub async fn retrieve_similar(
        &self,
        query: &Episode,
        k: usize,
    ) -> Result<Option<Vec<ScoredEpisode>>, MemoryError> {
        if self.catalog.count() == 0 {
            debug!("No finished episodes yet, nothing to retrieve");
            return Ok(None);
        }

        let vector = self.embedder.embed(&query.to_string()).await?;
        let hits = self.index.search(&vector, k)?;

        let mut results = Vec::with_capacity(hits.len());
        for (id, distance) in hits {
            let episode = self.catalog.get(id)?;
            results.push(ScoredEpisode {
                id,
                distance,
                episode,
            });
        }
        debug!(hits = results.len(), "Retrieved similar episodes");
        Ok(Some(results))
    }

    /// Point lookup of a finished episode.
    pub fn get_episode(&self, id: u64) -> Result<Episode, MemoryError> {
        self.catalog.get(id)
    }

    /// Every finished episode in insertion order.
    pub fn all_episodes(&self) -> Vec<(u64, Episode)> {
        self.catalog.all()
    }

    /// Finished episodes in the catalog.
    pub fn episode_count(&self) -> usize {
        self.catalog.count()
    }

    /// Embeddings in the index. Equal to [`Self::episode_count`] unless a
    /// past finalize died between catalog and index write.
    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }
}
