//! Simulated agent loop using engram.
//!
//! This minimal example demonstrates the core write/recall flow:
//! 1. Recall memories relevant to the current situation.
//! 2. Take an action (simulated here).
//! 3. Remember the outcome, occasionally superseding a stale position.
//!
//! Run with: cargo run --example agent_sim

use engram::{AgentMemory, EngramConfig, EpisodeType, RememberOptions, SearchOptions};
use rand::Rng;

fn main() {
    let config = EngramConfig::new("/tmp/engram_demo_agent_sim", "sim-agent");
    let mut memory = AgentMemory::with_local_storage(config);
    let mut rng = rand::thread_rng();

    let mut open_position: Option<String> = None;
    let num_ticks = 20;
    println!("Simulating {num_ticks} agent ticks...");

    for tick in 0..num_ticks {
        let query = format!("position sizing tick {tick}");
        let similar = memory.recall(&query, &SearchOptions::default()).unwrap();
        println!("Tick {tick}: recalled {} related memories", similar.len());

        let size: u32 = rng.gen_range(50..500);
        let text = format!("opened position sized {size} units at tick {tick}");
        let opts = RememberOptions::new()
            .episode_type(EpisodeType::Position)
            .tags(vec!["position".into()])
            .importance(0.7);
        let opts = if let Some(old_id) = &open_position {
            opts.supersedes(vec![old_id.clone()])
        } else {
            opts
        };

        let saved = memory.remember(&text, opts).unwrap();
        open_position = saved.first().map(|ep| ep.id.clone());
    }

    println!("\nDone. Final position episode: {:?}", open_position);
}
