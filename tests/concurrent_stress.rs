//! Concurrent read/write stress test for `AgentMemory` wrapped in
//! `Arc<tokio::sync::RwLock<..>>` (spec §5's concurrency model: multiple
//! tasks may call in, all calls serialize through one writer lock since
//! recall also touches access-count bookkeeping). Verifies no panics, no
//! lost writes, and that every stored episode is eventually recallable.
#![cfg(feature = "async")]

use engram::async_api::{forget_async, recall_async, remember_async};
use engram::{AgentMemory, EngramConfig, RememberOptions, SearchOptions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

const WRITERS: usize = 4;
const READERS: usize = 8;
const OPS_PER_WRITER: usize = 25;
const OPS_PER_READER: usize = 40;

fn temp_store(name: &str) -> std::path::PathBuf {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!("engram_concurrent_test_{name}_{}_{now}", std::process::id()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_store_and_recall() {
    let base = temp_store("store_and_recall");
    let memory = Arc::new(RwLock::new(AgentMemory::with_local_storage(EngramConfig::new(&base, "agent"))));

    let write_count = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();

    for w in 0..WRITERS {
        let memory = Arc::clone(&memory);
        let write_count = Arc::clone(&write_count);
        handles.push(tokio::spawn(async move {
            for i in 0..OPS_PER_WRITER {
                let text = format!("writer {w} wrote episode number {i} about gas fees");
                remember_async(Arc::clone(&memory), text, RememberOptions::new()).await.unwrap();
                write_count.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    let read_count = Arc::new(AtomicU64::new(0));
    for _ in 0..READERS {
        let memory = Arc::clone(&memory);
        let read_count = Arc::clone(&read_count);
        handles.push(tokio::spawn(async move {
            for _ in 0..OPS_PER_READER {
                let hits = recall_async(Arc::clone(&memory), "gas fees".to_string(), SearchOptions::default())
                    .await
                    .unwrap();
                for hit in &hits {
                    assert!(hit.episode.text.contains("gas fees"));
                }
                read_count.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(write_count.load(Ordering::SeqCst), (WRITERS * OPS_PER_WRITER) as u64);
    assert_eq!(read_count.load(Ordering::SeqCst), (READERS * OPS_PER_READER) as u64);

    let stats = memory.write().await.stats().unwrap();
    assert_eq!(stats.episode_count, WRITERS * OPS_PER_WRITER);

    let _ = std::fs::remove_dir_all(&base);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_remember_and_forget_no_panic() {
    let base = temp_store("remember_and_forget");
    let memory = Arc::new(RwLock::new(AgentMemory::with_local_storage(EngramConfig::new(&base, "agent"))));

    let mut writer_handles = Vec::new();
    for w in 0..4 {
        let memory = Arc::clone(&memory);
        writer_handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for i in 0..20 {
                let saved = remember_async(
                    Arc::clone(&memory),
                    format!("episode {w}-{i}"),
                    RememberOptions::new(),
                )
                .await
                .unwrap();
                ids.push(saved[0].id.clone());
            }
            ids
        }));
    }

    let mut all_ids = Vec::new();
    for h in writer_handles {
        all_ids.extend(h.await.unwrap());
    }

    let mut forget_handles = Vec::new();
    for id in all_ids.into_iter().step_by(2) {
        let memory = Arc::clone(&memory);
        forget_handles.push(tokio::spawn(async move {
            forget_async(Arc::clone(&memory), id).await.unwrap()
        }));
    }
    for h in forget_handles {
        h.await.unwrap();
    }

    let stats = memory.write().await.stats().unwrap();
    assert_eq!(stats.episode_count, 40);

    let _ = std::fs::remove_dir_all(&base);
}
