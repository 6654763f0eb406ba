//! Example: async wrappers over `AgentMemory`.
//!
//! Run with: cargo run --example async_example --features async

use engram::async_api::{recall_async, remember_async};
use engram::{AgentMemory, EngramConfig, RememberOptions, SearchOptions};
use std::sync::Arc;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngramConfig::new("/tmp/engram_async_example", "async-demo");
    let memory = Arc::new(RwLock::new(AgentMemory::with_local_storage(config)));

    remember_async(
        memory.clone(),
        "async write path stores an episode off the runtime thread".to_string(),
        RememberOptions::new(),
    )
    .await?;

    let results = recall_async(
        memory.clone(),
        "async write path".to_string(),
        SearchOptions::default(),
    )
    .await?;
    println!("Recall returned {} episode(s)", results.len());
    for hit in results {
        println!("  - {}", hit.episode.text);
    }
    Ok(())
}
