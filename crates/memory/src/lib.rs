//! Episodic memory for the Moneta trading agent.
//!
//! Every trading day produces an [`Episode`]: what the agent saw, what it
//! did, and (a day later) what it learned. Episodes flow through the
//! subsystem like this:
//!
//! ```text
//!   decision loop                reflection loop
//!        |                             |
//!        v                             v
//!  +-------------+    finalize   +----------------+
//!  | PendingSlot | ------------> | EpisodeCatalog |   (JSONL, id assigned)
//!  +-------------+               +----------------+
//!        ^                             |
//!        | get_pending                 | render + embed
//!        |                             v
//!  MemoryController              +----------------+
//!        |                       |  VectorIndex   |   (embedding at same id)
//!        +--- retrieve_similar --+----------------+
//! ```
//!
//! The catalog is written before the index, so a crash between the two
//! leaves an orphaned record rather than a dangling index id. Retrieval
//! resolves every index hit back through the catalog and surfaces any
//! mismatch as an error.

pub mod catalog;
pub mod controller;
pub mod embedding;
pub mod episode;
pub mod error;
pub mod index;
pub mod pending;

pub use catalog::EpisodeCatalog;
pub use controller::{MemoryController, CATALOG_FILE, INDEX_FILE, PENDING_FILE};
pub use embedding::{
    build_embedder, Embedder, EmbedderConfig, EmbeddingError, FastembedEmbedder, HashingEmbedder,
};
pub use episode::{Action, ActionType, Episode, Experience, Perception, Reflection, ScoredEpisode};
pub use error::MemoryError;
pub use index::VectorIndex;
pub use pending::PendingSlot;
