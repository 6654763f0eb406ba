//! Minimal remember/recall example.
//!
//! Run with: cargo run --example basic

use engram::{AgentMemory, EngramConfig, RememberOptions, SearchOptions};

fn main() {
    let config = EngramConfig::new("/tmp/engram_demo_basic", "demo-agent");
    let mut memory = AgentMemory::with_local_storage(config);

    for (i, fact) in [
        "opened a long FXRP position sized at 200 units",
        "gas fees spiked on the bridging route this afternoon",
        "dark mode toggle moved to settings > appearance",
    ]
    .iter()
    .enumerate()
    {
        memory
            .remember(fact, RememberOptions::new().tags(vec![format!("note_{i}")]))
            .unwrap();
    }

    let results = memory.recall("flare xrp allocation", &SearchOptions::default()).unwrap();
    println!("Top {} matching episode(s):", results.len());
    for hit in results {
        println!("  [{:.3}] {}", hit.score, hit.episode.text);
    }
}
