//! Durable exact nearest-neighbor index over episode embeddings.
//!
//! Vectors live in a flat contiguous buffer keyed by external ids; search is
//! a brute-force squared-L2 scan, which is exact and plenty fast at
//! one-episode-per-day scale. Every `add` rewrites the snapshot through a
//! temp file and rename, so a crash never leaves a torn index on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::MemoryError;

#[derive(Serialize, Deserialize)]
struct IndexSnapshot {
    dimension: usize,
    ids: Vec<u64>,
    vectors: Vec<f32>,
}

pub struct VectorIndex {
    path: PathBuf,
    dimension: usize,
    ids: Vec<u64>,
    /// Row-major storage, `ids.len() * dimension` floats.
    vectors: Vec<f32>,
}

impl VectorIndex {
    /// Opens the index at `path`, restoring a persisted snapshot if one
    /// exists. A snapshot recorded with a different dimension is an error.
    pub fn open(path: impl Into<PathBuf>, dimension: usize) -> Result<Self, MemoryError> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), dimension, "Starting empty vector index");
            return Ok(Self {
                path,
                dimension,
                ids: Vec::new(),
                vectors: Vec::new(),
            });
        }

        let bytes = fs::read(&path)?;
        let snapshot: IndexSnapshot = bincode::deserialize(&bytes)
            .map_err(|e| MemoryError::Corrupt(format!("unreadable index snapshot: {e}")))?;
        if snapshot.dimension != dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                actual: snapshot.dimension,
            });
        }
        if snapshot.vectors.len() != snapshot.ids.len() * dimension {
            return Err(MemoryError::Corrupt(format!(
                "index snapshot holds {} floats for {} ids of dimension {}",
                snapshot.vectors.len(),
                snapshot.ids.len(),
                dimension
            )));
        }

        info!(
            path = %path.display(),
            entries = snapshot.ids.len(),
            dimension,
            "Restored vector index"
        );
        Ok(Self {
            path,
            dimension,
            ids: snapshot.ids,
            vectors: snapshot.vectors,
        })
    }

    /// Inserts `vector` under `id` and persists the index before returning.
    ///
    /// Duplicate ids are stored as separate entries; resolution through the
    /// catalog makes them redundant rather than wrong.
    pub fn add(&mut self, vector: &[f32], id: u64) -> Result<(), MemoryError> {
        self.check_dimension(vector)?;
        self.ids.push(id);
        self.vectors.extend_from_slice(vector);
        self.save()?;
        debug!(id, entries = self.ids.len(), "Indexed embedding");
        Ok(())
    }

    /// Returns up to `k` `(id, squared L2 distance)` pairs, nearest first.
    /// An empty index yields an empty result.
    pub fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(u64, f32)>, MemoryError> {
        self.check_dimension(vector)?;
        if self.ids.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(u64, f32)> = self
            .ids
            .iter()
            .enumerate()
            .map(|(row, &id)| {
                let start = row * self.dimension;
                let stored = &self.vectors[start..start + self.dimension];
                (id, squared_l2(vector, stored))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), MemoryError> {
        if vector.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Writes the snapshot to a sibling temp file, fsyncs it, then renames
    /// over the live file.
    fn save(&self) -> Result<(), MemoryError> {
        let snapshot = IndexSnapshot {
            dimension: self.dimension,
            ids: self.ids.clone(),
            vectors: self.vectors.clone(),
        };
        let bytes = bincode::serialize(&snapshot)
            .map_err(|e| MemoryError::Corrupt(format!("failed to encode index snapshot: {e}")))?;

        let tmp_path = tmp_path(&self.path);
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
