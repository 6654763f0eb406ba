//! End-to-end scenarios against the public `AgentMemory` API, covering
//! the episode lifecycle: remember, recall, tags, prune, forget,
//! supersession, Merkle snapshots and encryption at rest.

use engram::{AgentMemory, EngramConfig, EpisodeType, RememberOptions, SearchOptions};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_store(name: &str) -> PathBuf {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!("engram_basic_test_{name}_{}_{now}", std::process::id()))
}

/// S1: remember a fact, recall it by related terms, and see it in `recent`.
#[test]
fn test_remember_recall_and_recent() {
    let base = temp_store("s1");
    let config = EngramConfig::new(&base, "test");
    let mut memory = AgentMemory::with_local_storage(config);

    let saved = memory
        .remember(
            "User prefers dark mode for the interface",
            RememberOptions::new().tags(vec!["preferences".into(), "ui".into()]),
        )
        .unwrap();
    assert_eq!(saved.len(), 1);

    let hits = memory
        .recall("dark mode preferences", &SearchOptions { limit: 5, ..SearchOptions::default() })
        .unwrap();
    assert!(hits[0].episode.text.contains("dark mode"));

    let recent = memory.recent(5).unwrap();
    assert_eq!(recent.len(), 1);

    let _ = std::fs::remove_dir_all(&base);
}

/// S2: multiple episodes, tag lookup, stats, prune and forget.
#[test]
fn test_tags_stats_prune_and_forget() {
    let base = temp_store("s2");
    let config = EngramConfig::new(&base, "test").with_prune_policy(1, 90.0, 0.05);
    let mut memory = AgentMemory::with_local_storage(config);

    let first = memory
        .remember(
            "User prefers dark mode for the interface",
            RememberOptions::new().tags(vec!["preferences".into(), "ui".into()]).importance(0.9),
        )
        .unwrap();
    memory
        .remember(
            "Traded 100 FXRP at 2.5 USDT",
            RememberOptions::new()
                .episode_type(EpisodeType::Trade)
                .tags(vec!["fxrp".into(), "trade".into()])
                .importance(0.5),
        )
        .unwrap();
    memory
        .remember(
            "Lesson: always check gas fees before bridging",
            RememberOptions::new()
                .episode_type(EpisodeType::Lesson)
                .tags(vec!["lesson".into(), "bridge".into()])
                .importance(0.3),
        )
        .unwrap();

    assert_eq!(memory.find_by_tag("fxrp").unwrap().len(), 1);
    assert_eq!(memory.stats().unwrap().episode_count, 3);

    // Keep=1 by importance rank: only the highest-importance episode
    // (`first`) survives.
    let pruned = memory.prune().unwrap();
    assert_eq!(pruned, 2);
    assert_eq!(memory.stats().unwrap().episode_count, 1);

    assert!(memory.forget(&first[0].id).unwrap());
    assert!(!memory.forget(&first[0].id).unwrap());
    assert_eq!(memory.recent(10).unwrap().len(), 0);

    let _ = std::fs::remove_dir_all(&base);
}

/// S3: synonym expansion bridges an abbreviation to its expansion.
#[test]
fn test_synonym_bridge() {
    let base = temp_store("s3");
    let config = EngramConfig::new(&base, "test");
    let mut memory = AgentMemory::with_local_storage(config);

    memory
        .remember("Opened a new Flare XRP position worth 5000 tokens on Enosys", RememberOptions::new())
        .unwrap();

    let hits = memory.recall("FXRP allocation", &SearchOptions::default()).unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].episode.text.contains("Flare XRP"));

    let _ = std::fs::remove_dir_all(&base);
}

/// S4: a three-link supersession chain walks oldest to newest.
#[test]
fn test_supersession_chain() {
    let base = temp_store("s4");
    let config = EngramConfig::new(&base, "test");
    let mut memory = AgentMemory::with_local_storage(config);

    let v1 = memory.remember("Fact v1", RememberOptions::new()).unwrap();
    let v2 = memory
        .remember("Fact v2", RememberOptions::new().supersedes(vec![v1[0].id.clone()]))
        .unwrap();
    let v3 = memory
        .remember("Fact v3", RememberOptions::new().supersedes(vec![v2[0].id.clone()]))
        .unwrap();

    let chain = memory.chain(&v1[0].id).unwrap();
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.first(), Some(&v1[0].id));
    assert_eq!(chain.last(), Some(&v3[0].id));

    let _ = std::fs::remove_dir_all(&base);
}

/// S6: Merkle snapshot root is deterministic, changes when the store's
/// contents change, and verification reflects that.
#[test]
fn test_merkle_snapshot_and_verify() {
    let base = temp_store("s6");
    let config = EngramConfig::new(&base, "test");
    let mut memory = AgentMemory::with_local_storage(config);

    let a = memory.remember("episode one body", RememberOptions::new()).unwrap();
    memory.remember("episode two body", RememberOptions::new()).unwrap();
    memory.remember("episode three body", RememberOptions::new()).unwrap();

    let snap1 = memory.snapshot().unwrap();
    let snap2 = memory.snapshot().unwrap();
    assert_eq!(snap1.root, snap2.root);
    assert!(memory.verify_root(&snap1.root).unwrap());

    memory.forget(&a[0].id).unwrap();
    memory.remember("episode one body, mutated", RememberOptions::new()).unwrap();
    let snap3 = memory.snapshot().unwrap();
    assert_ne!(snap1.root, snap3.root);
    assert!(!memory.verify_root(&snap1.root).unwrap());

    let _ = std::fs::remove_dir_all(&base);
}

/// S7: with encryption enabled, the on-disk form hides plaintext but
/// the metadata needed for filtering survives in cleartext, and a
/// fresh orchestrator pointed at the same key recovers the plaintext.
#[test]
fn test_encryption_at_rest() {
    let base = temp_store("s7");
    let key = "ab".repeat(32);
    let config = EngramConfig::new(&base, "test").with_raw_key(key.clone());
    let mut memory = AgentMemory::with_local_storage(config);

    let saved = memory
        .remember(
            "secret content",
            RememberOptions::new()
                .episode_type(EpisodeType::Lesson)
                .importance(0.9)
                .tags(vec!["classified".into()]),
        )
        .unwrap();

    let on_disk_path = base.join("episodes").join(format!("{}.json", saved[0].id));
    let raw = std::fs::read_to_string(&on_disk_path).unwrap();
    assert!(raw.contains("\"_encrypted\": true"));
    assert!(raw.contains("\"_tagsEncrypted\": true"));
    assert!(raw.contains("\"type\": \"lesson\""));
    assert!(raw.contains("\"importance\": 0.9"));
    assert!(!raw.contains("secret content"));

    let reopened = EngramConfig::new(&base, "test").with_raw_key(key);
    let mut memory2 = AgentMemory::with_local_storage(reopened);
    let hits = memory2.recall("secret content", &SearchOptions::default()).unwrap();
    assert_eq!(hits[0].episode.text, "secret content");

    let _ = std::fs::remove_dir_all(&base);
}
