//! Cryptographic integrity (C5): canonical hashing, an order-independent
//! Merkle tree, inclusion proofs and snapshots. See spec §4.7 and §6.3.

use crate::episode::Episode;
use crate::error::{EngramError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Canonical JSON bytes for `episode`: serializing through `Value`
/// forces `serde_json`'s default `BTreeMap`-backed object
/// representation, which always emits object keys in sorted order at
/// every nesting level regardless of struct field declaration order.
pub fn canonical_bytes(episode: &Episode) -> Result<Vec<u8>> {
    let value = serde_json::to_value(episode)
        .map_err(|e| EngramError::Malformed(format!("canonicalize episode: {e}")))?;
    serde_json::to_vec(&value)
        .map_err(|e| EngramError::Malformed(format!("canonicalize episode: {e}")))
}

/// SHA-256 over the episode's canonical bytes, hex-encoded.
pub fn episode_hash(episode: &Episode) -> Result<String> {
    let bytes = canonical_bytes(episode)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn hash_pair(left: &str, right: &str) -> String {
    let (a, b) = if left <= right { (left, right) } else { (right, left) };
    let mut hasher = Sha256::new();
    hasher.update(a.as_bytes());
    hasher.update(b.as_bytes());
    hex::encode(hasher.finalize())
}

/// Order-independent Merkle tree over a set of leaf hashes. Pairs are
/// combined in sorted order at each level, so two trees built from the
/// same leaf set hash identically regardless of insertion order. An
/// odd leaf at a level is duplicated against itself.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Build from leaf hashes (already-hashed episode hashes, not raw
    /// episode bytes). Leaves are sorted first so the tree is a pure
    /// function of the leaf *set*.
    pub fn build(leaf_hashes: &[String]) -> Self {
        if leaf_hashes.is_empty() {
            return Self { levels: vec![vec![]] };
        }
        let mut sorted = leaf_hashes.to_vec();
        sorted.sort_unstable();

        let mut levels = vec![sorted];
        while levels.last().unwrap().len() > 1 {
            let prev = levels.last().unwrap();
            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            let mut i = 0;
            while i < prev.len() {
                if i + 1 < prev.len() {
                    next.push(hash_pair(&prev[i], &prev[i + 1]));
                } else {
                    next.push(hash_pair(&prev[i], &prev[i]));
                }
                i += 2;
            }
            levels.push(next);
        }
        Self { levels }
    }

    /// The root hash. Zero leaves yield the all-zero 32-byte root
    /// (spec §4.7); one leaf yields that leaf unchanged.
    pub fn root(&self) -> String {
        self.levels
            .last()
            .and_then(|l| l.first())
            .cloned()
            .unwrap_or_else(|| "0".repeat(64))
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, |l| l.len())
    }

    /// Build an inclusion proof for `leaf_hash`: the sibling hash at
    /// each level from the leaf up to the root, plus whether the
    /// sibling sits on the left.
    pub fn prove(&self, leaf_hash: &str) -> Option<MerkleProof> {
        let leaves = self.levels.first()?;
        let mut idx = leaves.iter().position(|h| h == leaf_hash)?;
        let mut siblings = Vec::new();

        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let pair_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            let sibling = if pair_idx < level.len() {
                level[pair_idx].clone()
            } else {
                level[idx].clone()
            };
            siblings.push(MerkleSibling {
                hash: sibling,
                on_left: pair_idx < idx,
            });
            idx /= 2;
        }

        Some(MerkleProof {
            leaf_hash: leaf_hash.to_string(),
            siblings,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleSibling {
    pub hash: String,
    pub on_left: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_hash: String,
    pub siblings: Vec<MerkleSibling>,
}

impl MerkleProof {
    /// Recompute the root implied by this proof and compare against
    /// `expected_root`.
    pub fn verify(&self, expected_root: &str) -> bool {
        let mut current = self.leaf_hash.clone();
        for sibling in &self.siblings {
            current = if sibling.on_left {
                hash_pair(&sibling.hash, &current)
            } else {
                hash_pair(&current, &sibling.hash)
            };
        }
        current == expected_root
    }
}

/// A point-in-time integrity snapshot (spec §4.7/§6.3): the Merkle
/// root over all episode hashes, the `(episodeId, leafHash)` pairs
/// sorted by id, and enough bookkeeping to recompute it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub root: String,
    #[serde(rename = "episodeCount")]
    pub episode_count: usize,
    pub timestamp: i64,
    #[serde(rename = "episodeHashes")]
    pub episode_hashes: Vec<String>,
    #[serde(rename = "episodeIds")]
    pub episode_ids: Vec<String>,
    #[serde(rename = "engramVersion")]
    pub engram_version: String,
}

impl Snapshot {
    pub fn build(episodes: &[Episode], timestamp: i64) -> Result<Self> {
        let mut pairs: Vec<(String, String)> = Vec::with_capacity(episodes.len());
        for ep in episodes {
            pairs.push((ep.id.clone(), episode_hash(ep)?));
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let episode_ids: Vec<String> = pairs.iter().map(|(id, _)| id.clone()).collect();
        let episode_hashes: Vec<String> = pairs.iter().map(|(_, h)| h.clone()).collect();
        let tree = MerkleTree::build(&episode_hashes);

        Ok(Self {
            root: tree.root(),
            episode_count: episode_hashes.len(),
            timestamp,
            episode_hashes,
            episode_ids,
            engram_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Recompute the root from `episode_hashes` and compare against
    /// the stored `root`.
    pub fn verify_self_consistency(&self) -> bool {
        let tree = MerkleTree::build(&self.episode_hashes);
        tree.root() == self.root
    }
}
