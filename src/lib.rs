//! Persistent, searchable episodic memory for autonomous agents.
//!
//! BM25 full-text search blended with recency and importance decay, a
//! supersession graph for superseding stale facts, Merkle-rooted
//! integrity snapshots and optional AEAD encryption at rest. See the
//! module docs for the pipeline each piece sits in.
//!
//! ```no_run
//! use engram::{AgentMemory, EngramConfig, RememberOptions, SearchOptions};
//!
//! let config = EngramConfig::new("./agent-memory", "trading-bot");
//! let mut memory = AgentMemory::with_local_storage(config);
//! memory.remember("opened a long FXRP position", RememberOptions::new()).unwrap();
//! let hits = memory.recall("flare xrp position", &SearchOptions::default()).unwrap();
//! ```

pub mod analyzer;
pub mod config;
pub mod crypto;
pub mod episode;
pub mod error;
pub mod integrity;
pub mod memory;
pub mod query;
pub mod scoring;
pub mod storage;
pub mod synonyms;
pub mod temporal;

#[cfg(feature = "async")]
pub mod async_api;

pub use config::{EncryptionMode, EngramConfig};
pub use episode::{Episode, EpisodeType};
pub use error::{EngramError, Result};
pub use integrity::{MerkleProof, MerkleTree, Snapshot};
pub use memory::{AgentMemory, InjectOptions, PostCompactionOptions, RecalledEpisode, RememberOptions};
pub use query::{SearchHit, SearchOptions};
pub use storage::local::LocalStorage;
pub use storage::remote::RemoteStorage;
pub use storage::{Bm25IndexStorage, PersistedBm25Index, Storage, StorageStats};
pub use synonyms::{SynonymExpansion, SynonymTable};
pub use temporal::TemporalRange;
