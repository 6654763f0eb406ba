//! Async wrappers over `AgentMemory` using `tokio::task::spawn_blocking`.
//!
//! Enable with the `async` feature. The caller shares one memory store
//! across tasks via `Arc<tokio::sync::RwLock<AgentMemory>>` so readers
//! and writers serialize the same way the synchronous API does.

use crate::error::{EngramError, Result};
use crate::memory::{AgentMemory, PostCompactionOptions, RecalledEpisode, RememberOptions};
use crate::episode::Episode;
use crate::query::SearchOptions;
use std::sync::Arc;
use tokio::sync::RwLock;

fn join_err(e: tokio::task::JoinError) -> EngramError {
    EngramError::TransportError(format!("spawn_blocking: {e}"))
}

pub async fn remember_async(
    memory: Arc<RwLock<AgentMemory>>,
    text: String,
    opts: RememberOptions,
) -> Result<Vec<Episode>> {
    tokio::task::spawn_blocking(move || {
        let mut guard = memory.blocking_write();
        guard.remember(&text, opts)
    })
    .await
    .map_err(join_err)?
}

pub async fn recall_async(
    memory: Arc<RwLock<AgentMemory>>,
    query: String,
    opts: SearchOptions,
) -> Result<Vec<RecalledEpisode>> {
    tokio::task::spawn_blocking(move || {
        let mut guard = memory.blocking_write();
        guard.recall(&query, &opts)
    })
    .await
    .map_err(join_err)?
}

pub async fn build_context_async(
    memory: Arc<RwLock<AgentMemory>>,
    query: String,
    max_tokens: usize,
) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut guard = memory.blocking_write();
        guard.build_context(&query, max_tokens)
    })
    .await
    .map_err(join_err)?
}

pub async fn post_compaction_context_async(
    memory: Arc<RwLock<AgentMemory>>,
    opts: PostCompactionOptions,
) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut guard = memory.blocking_write();
        guard.post_compaction_context(&opts)
    })
    .await
    .map_err(join_err)?
}

pub async fn prune_async(memory: Arc<RwLock<AgentMemory>>) -> Result<usize> {
    tokio::task::spawn_blocking(move || {
        let mut guard = memory.blocking_write();
        guard.prune()
    })
    .await
    .map_err(join_err)?
}

pub async fn forget_async(memory: Arc<RwLock<AgentMemory>>, id: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let mut guard = memory.blocking_write();
        guard.forget(&id)
    })
    .await
    .map_err(join_err)?
}
