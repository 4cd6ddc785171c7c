//! End-to-end tests of the episodic memory over real files.
//!
//! Every test uses the deterministic hashing embedder so retrieval results
//! are reproducible without downloading a model.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use moneta_common::Portfolio;
use moneta_memory::{
    Episode, Experience, HashingEmbedder, MemoryController, MemoryError, Reflection, CATALOG_FILE,
};

fn fixed_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 21, 10, 0, 0).unwrap()
}

/// A funded portfolio with one open position and a pinned timestamp, so
/// episode renderings differ only in the text under test.
fn market_portfolio() -> Portfolio {
    let mut portfolio = Portfolio::new();
    portfolio.deposit(10_000.0).unwrap();
    portfolio.buy("AAPL", 4_000.0, 200.0).unwrap();
    portfolio.last_update_time = fixed_date();
    portfolio
}

fn pending_episode(news: &str) -> Episode {
    Episode::new(Experience::new(fixed_date(), news, market_portfolio()))
}

fn finished_episode(news: &str) -> Episode {
    pending_episode(news).with_reflection(Reflection {
        posterior_position: None,
        expectation_evaluation: "The move matched the expectation.".to_string(),
        learning: "Stay with the trend.".to_string(),
    })
}

fn open_memory(dir: &TempDir) -> MemoryController {
    let embedder = Arc::new(HashingEmbedder::new(128).unwrap());
    MemoryController::open(dir.path(), embedder).unwrap()
}

#[tokio::test]
async fn empty_memory_retrieves_nothing() {
    let dir = TempDir::new().unwrap();
    let memory = open_memory(&dir);

    assert!(memory.get_pending().unwrap().is_none());
    let result = memory
        .retrieve_similar(&pending_episode("anything at all"), 3)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn latest_pending_episode_wins() {
    let dir = TempDir::new().unwrap();
    let mut memory = open_memory(&dir);

    memory.save_pending(&pending_episode("first draft")).unwrap();
    memory
        .save_pending(&pending_episode("second draft"))
        .unwrap();

    let pending = memory.get_pending().unwrap().unwrap();
    assert_eq!(pending.experience.perception.news_text, "second draft");
}

#[tokio::test]
async fn finalize_catalogues_indexes_and_clears_the_slot() {
    let dir = TempDir::new().unwrap();
    let mut memory = open_memory(&dir);

    let pending = pending_episode("Tech stocks rally on strong chip demand");
    memory.save_pending(&pending).unwrap();

    let finished = pending.with_reflection(Reflection {
        posterior_position: None,
        expectation_evaluation: "The rally held.".to_string(),
        learning: "Chip demand is a leading signal.".to_string(),
    });
    let id = memory.finalize(&finished).await.unwrap();

    assert_eq!(id, 1);
    assert_eq!(memory.get_episode(id).unwrap(), finished);
    assert_eq!(memory.episode_count(), 1);
    assert_eq!(memory.indexed_count(), 1);
    assert!(memory.get_pending().unwrap().is_none());

    // Querying with the identical episode embeds to the identical vector.
    let hits = memory.retrieve_similar(&finished, 1).await.unwrap().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
    assert_eq!(hits[0].distance, 0.0);
    assert_eq!(hits[0].episode, finished);
}

#[tokio::test]
async fn retrieval_orders_hits_by_news_overlap() {
    let dir = TempDir::new().unwrap();
    let mut memory = open_memory(&dir);

    let full_match = memory
        .finalize(&finished_episode(
            "Solar subsidy boom lifts panel makers across Europe",
        ))
        .await
        .unwrap();
    let partial_match = memory
        .finalize(&finished_episode(
            "Solar subsidy program trimmed by parliament",
        ))
        .await
        .unwrap();
    let unrelated = memory
        .finalize(&finished_episode("Chip fabs idle as contract prices slump"))
        .await
        .unwrap();

    let query = pending_episode("Solar subsidy boom lifts panel makers across Europe");
    let hits = memory.retrieve_similar(&query, 2).await.unwrap().unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, full_match);
    assert_eq!(hits[1].id, partial_match);
    assert!(hits[0].distance <= hits[1].distance);

    let all_three = memory.retrieve_similar(&query, 10).await.unwrap().unwrap();
    assert_eq!(all_three.len(), 3);
    assert_eq!(all_three[2].id, unrelated);
}

#[tokio::test]
async fn full_episode_lifecycle() {
    let dir = TempDir::new().unwrap();
    let mut memory = open_memory(&dir);

    // Fresh memory: no pending episode, retrieval reports absence.
    assert!(memory.get_pending().unwrap().is_none());
    assert!(memory
        .retrieve_similar(&pending_episode("warmup query"), 1)
        .await
        .unwrap()
        .is_none());

    // An already-reflected episode goes straight to long-term memory.
    let first = finished_episode("Tech stocks rally on strong chip demand");
    assert_eq!(memory.finalize(&first).await.unwrap(), 1);

    // A new day opens a pending episode.
    let second = pending_episode("Bond yields spike after inflation surprise");
    memory.save_pending(&second).unwrap();
    let stored = memory.get_pending().unwrap().unwrap();
    assert_eq!(
        stored.experience.perception.news_text,
        "Bond yields spike after inflation surprise"
    );

    // Finalizing without a reflection is rejected before any write.
    let err = memory.finalize(&second).await.unwrap_err();
    assert!(matches!(err, MemoryError::InvalidState(_)));
    assert_eq!(memory.episode_count(), 1);
    assert!(memory.get_pending().unwrap().is_some());

    // With the reflection attached it commits and empties the slot.
    let second = second.with_reflection(Reflection {
        posterior_position: None,
        expectation_evaluation: "Yields kept climbing.".to_string(),
        learning: "Inflation prints move bonds first.".to_string(),
    });
    assert_eq!(memory.finalize(&second).await.unwrap(), 2);
    assert!(memory.get_pending().unwrap().is_none());
    assert_eq!(memory.episode_count(), 2);

    // A query about chips lands on the chip-demand day.
    let query = pending_episode("Tech stocks rally on strong chip demand");
    let hits = memory.retrieve_similar(&query, 1).await.unwrap().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 1);
}

#[tokio::test]
async fn memory_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut memory = open_memory(&dir);
        memory
            .finalize(&finished_episode("Oil spikes on supply fears"))
            .await
            .unwrap();
        memory
            .finalize(&finished_episode("Retail sales beat expectations"))
            .await
            .unwrap();
        memory
            .save_pending(&pending_episode("Fed minutes due tomorrow"))
            .unwrap();
    }

    let memory = open_memory(&dir);
    assert_eq!(memory.episode_count(), 2);
    assert_eq!(memory.indexed_count(), 2);
    assert_eq!(
        memory
            .get_pending()
            .unwrap()
            .unwrap()
            .experience
            .perception
            .news_text,
        "Fed minutes due tomorrow"
    );

    let query = pending_episode("Oil spikes on supply fears");
    let hits = memory.retrieve_similar(&query, 1).await.unwrap().unwrap();
    assert_eq!(hits[0].id, 1);
}

#[tokio::test]
async fn unresolvable_index_id_surfaces_as_error() {
    let dir = TempDir::new().unwrap();
    {
        let mut memory = open_memory(&dir);
        memory
            .finalize(&finished_episode("Solar subsidy boom lifts panel makers"))
            .await
            .unwrap();
        memory
            .finalize(&finished_episode("Chip fabs idle as contract prices slump"))
            .await
            .unwrap();
    }

    // Damage the store out-of-band: drop the second catalog record while the
    // index still holds its embedding.
    let catalog_path = dir.path().join(CATALOG_FILE);
    let contents = std::fs::read_to_string(&catalog_path).unwrap();
    let first_line = contents.lines().next().unwrap();
    std::fs::write(&catalog_path, format!("{first_line}\n")).unwrap();

    let memory = open_memory(&dir);
    assert_eq!(memory.episode_count(), 1);
    assert_eq!(memory.indexed_count(), 2);

    let query = pending_episode("Chip fabs idle as contract prices slump");
    let err = memory.retrieve_similar(&query, 2).await.unwrap_err();
    assert!(matches!(err, MemoryError::NotFound(2)));
}
