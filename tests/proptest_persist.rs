//! Property-based test for incremental reload correctness (spec §8.1
//! property 11): for arbitrary sequences of remembered episodes, a
//! fresh `AgentMemory` pointed at the same store after the writing
//! process exits must recover the same set of recallable episode ids
//! as the process that wrote them.

use engram::{AgentMemory, EngramConfig, RememberOptions};
use proptest::prelude::*;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_store(seed: u64) -> std::path::PathBuf {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!("engram_proptest_persist_{}_{now}_{seed}", std::process::id()))
}

fn episode_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    (".{1,120}", prop::collection::vec("[a-z]{1,10}", 0..4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn reopen_preserves_recall_result_set(
        episodes in prop::collection::vec(episode_strategy(), 1..15),
        seed in any::<u64>(),
    ) {
        let base = temp_store(seed);

        let orig_ids: HashSet<String> = {
            let mut memory = AgentMemory::with_local_storage(EngramConfig::new(&base, "agent"));
            let mut ids = Vec::new();
            for (text, tags) in &episodes {
                let saved = memory
                    .remember(text, RememberOptions::new().tags(tags.clone()))
                    .unwrap();
                ids.extend(saved.into_iter().map(|e| e.id));
            }
            memory.stats().unwrap();
            ids.into_iter().collect()
        };

        let mut reopened = AgentMemory::with_local_storage(EngramConfig::new(&base, "agent"));
        let stats = reopened.stats().unwrap();
        prop_assert_eq!(stats.episode_count, orig_ids.len());

        let reopened_ids: HashSet<String> = reopened
            .recent(orig_ids.len().max(1))
            .unwrap()
            .into_iter()
            .map(|recalled| recalled.episode.id)
            .collect();

        prop_assert_eq!(reopened_ids, orig_ids);

        let _ = std::fs::remove_dir_all(&base);
    }
}
