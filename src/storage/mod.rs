//! Storage Contract (C4): the core's only dependency on persistence.
//! Two capability traits — `Storage` (required CRUD) and
//! `Bm25IndexStorage` (optional index checkpointing) — and two
//! implementations, `local` (file tree) and `remote` (HTTP key-value).
//! See spec §4.1 and §6.1/§6.2.

pub mod local;
pub mod remote;

use crate::episode::Episode;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The persisted form of the in-memory BM25 index (spec §6.2). Per-doc
/// `tf` is deliberately absent; callers rebuild it from episode bodies
/// after a successful `restoreFromIndex`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedBm25Index {
    pub version: String,
    pub df: HashMap<String, u32>,
    #[serde(rename = "docLengths")]
    pub doc_lengths: HashMap<String, usize>,
    #[serde(rename = "docMeta")]
    pub doc_meta: HashMap<String, String>,
    #[serde(rename = "totalDocs")]
    pub total_docs: usize,
    #[serde(rename = "totalLength")]
    pub total_length: usize,
    #[serde(rename = "lastIndexedTimestamp")]
    pub last_indexed_timestamp: i64,
}

/// Per-document metadata embedded (as a JSON string) in `doc_meta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedDocMeta {
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    pub importance: f32,
    #[serde(rename = "lastAccessedAt")]
    pub last_accessed_at: i64,
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub episode_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageStats {
    #[serde(rename = "episodeCount")]
    pub episode_count: usize,
    pub bytes: u64,
    pub path: String,
}

/// Required CRUD surface every storage backend must implement.
pub trait Storage: Send + Sync {
    /// Create any backing containers. Idempotent.
    fn init(&self) -> Result<()>;

    /// Overwrite by id. Last-writer-wins.
    fn save_episode(&self, episode: &Episode) -> Result<()>;

    fn get_episode(&self, id: &str) -> Result<Option<Episode>>;

    /// True on removal, false if absent.
    fn delete_episode(&self, id: &str) -> Result<bool>;

    /// May be eagerly materialized; order unspecified.
    fn get_all_episodes(&self) -> Result<Vec<Episode>>;

    /// Cheap: no body read.
    fn list_episode_ids(&self) -> Result<Vec<String>>;

    /// All episodes with `created_at > since_ms`.
    fn get_episodes_since(&self, since_ms: i64) -> Result<Vec<Episode>>;

    fn add_to_tag_index(&self, episode: &Episode) -> Result<()>;

    fn remove_from_tag_index(&self, id: &str) -> Result<()>;

    fn get_by_tag(&self, tag: &str) -> Result<Vec<String>>;

    fn get_stats(&self) -> Result<StorageStats>;
}

/// Optional capability: persisting the BM25 index's summary
/// statistics across restarts. Absent implementations force a full
/// rebuild on every init.
pub trait Bm25IndexStorage: Send + Sync {
    fn load_bm25_index(&self) -> Result<Option<PersistedBm25Index>>;
    fn save_bm25_index(&self, index: &PersistedBm25Index) -> Result<()>;
}
