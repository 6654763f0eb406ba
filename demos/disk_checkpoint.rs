//! Merkle snapshot and re-open integrity check.
//!
//! Demonstrates:
//! - Persisting episodes and the BM25 index to a local store.
//! - Taking a Merkle snapshot and verifying it re-derives the same root.
//! - Re-opening the store (incremental init) and recalling normally.
//!
//! Run: cargo run --example disk_checkpoint

use engram::{AgentMemory, EngramConfig, RememberOptions, SearchOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("engram_checkpoint_example");
    let _ = std::fs::remove_dir_all(&dir);

    {
        let config = EngramConfig::new(&dir, "checkpoint-demo");
        let mut memory = AgentMemory::with_local_storage(config);
        memory.remember("task_1 completed with reward 0.8", RememberOptions::new())?;
        memory.remember("task_2 completed with reward 0.9", RememberOptions::new())?;

        let snapshot = memory.snapshot()?;
        println!("Stored 2 episodes. Snapshot root: {}", snapshot.root);
        assert!(snapshot.verify_self_consistency());
    }

    // Re-open: init() accepts the persisted index incrementally when no
    // episodes have changed since the last checkpoint.
    let config = EngramConfig::new(&dir, "checkpoint-demo");
    let mut memory = AgentMemory::with_local_storage(config);
    let results = memory.recall("completed task", &SearchOptions::default())?;
    println!("Re-opened store, recall returned {} episode(s).", results.len());
    for hit in &results {
        println!("  - {}", hit.episode.text);
    }

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
