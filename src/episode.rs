//! The episode: an atomic stored unit (spec §3.1).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Episode type tag. An open enumeration: unknown strings round-trip
/// through `Custom` rather than failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EpisodeType {
    Fact,
    Conversation,
    Document,
    Event,
    Summary,
    Trade,
    Position,
    Alert,
    Decision,
    Lesson,
    Checkpoint,
    Custom(String),
}

impl EpisodeType {
    pub fn as_str(&self) -> &str {
        match self {
            EpisodeType::Fact => "fact",
            EpisodeType::Conversation => "conversation",
            EpisodeType::Document => "document",
            EpisodeType::Event => "event",
            EpisodeType::Summary => "summary",
            EpisodeType::Trade => "trade",
            EpisodeType::Position => "position",
            EpisodeType::Alert => "alert",
            EpisodeType::Decision => "decision",
            EpisodeType::Lesson => "lesson",
            EpisodeType::Checkpoint => "checkpoint",
            EpisodeType::Custom(s) => s.as_str(),
        }
    }

    /// Priority used by `postCompactionContext` (spec §4.8); lower sorts first.
    pub fn compaction_priority(&self) -> u8 {
        match self {
            EpisodeType::Checkpoint => 0,
            EpisodeType::Decision => 1,
            EpisodeType::Lesson => 2,
            EpisodeType::Event => 3,
            EpisodeType::Fact => 4,
            EpisodeType::Trade => 5,
            EpisodeType::Position => 6,
            EpisodeType::Document => 7,
            EpisodeType::Summary => 8,
            EpisodeType::Conversation => 9,
            EpisodeType::Custom(_) | EpisodeType::Alert => 10,
        }
    }
}

impl From<&str> for EpisodeType {
    fn from(s: &str) -> Self {
        match s {
            "fact" => EpisodeType::Fact,
            "conversation" => EpisodeType::Conversation,
            "document" => EpisodeType::Document,
            "event" => EpisodeType::Event,
            "summary" => EpisodeType::Summary,
            "trade" => EpisodeType::Trade,
            "position" => EpisodeType::Position,
            "alert" => EpisodeType::Alert,
            "decision" => EpisodeType::Decision,
            "lesson" => EpisodeType::Lesson,
            "checkpoint" => EpisodeType::Checkpoint,
            other => EpisodeType::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for EpisodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EpisodeType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EpisodeType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(EpisodeType::from(s.as_str()))
    }
}

impl Default for EpisodeType {
    fn default() -> Self {
        EpisodeType::Fact
    }
}

/// A recorded agent experience (episode). See spec §3.1 for the full
/// field contract and §3.3 for invariants the engine maintains across
/// writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub episode_type: EpisodeType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_importance")]
    pub importance: f32,
    pub agent_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default = "default_total_chunks")]
    pub total_chunks: usize,
    pub source_id: String,
    pub created_at: i64,
    pub last_accessed_at: i64,
    #[serde(default)]
    pub access_count: u32,
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<Vec<String>>,
    #[serde(default)]
    pub superseded_by: Vec<String>,
    #[serde(default, rename = "_encrypted", skip_serializing_if = "is_false")]
    pub encrypted: bool,
    #[serde(
        default,
        rename = "_tagsEncrypted",
        skip_serializing_if = "is_false"
    )]
    pub tags_encrypted: bool,
}

fn default_importance() -> f32 {
    0.5
}

fn default_total_chunks() -> usize {
    1
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Episode {
    /// Add a tag if not already present, preserving insertion order.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Add `new_id` to `superseded_by`, de-duplicated.
    pub fn mark_superseded_by(&mut self, new_id: &str) {
        if !self.superseded_by.iter().any(|id| id == new_id) {
            self.superseded_by.push(new_id.to_string());
        }
    }

    /// Effective importance after recency decay (spec §3.1):
    /// `importance × 0.95^daysSinceLastAccess`. The stored value never
    /// changes; this is computed fresh at query time.
    pub fn effective_importance(&self, now_ms: i64) -> f32 {
        let days = days_since(self.last_accessed_at, now_ms);
        self.importance * 0.95f32.powf(days as f32)
    }
}

/// Days elapsed between `past_ms` and `now_ms`, floored at 0.
pub fn days_since(past_ms: i64, now_ms: i64) -> f64 {
    let delta_ms = (now_ms - past_ms).max(0) as f64;
    delta_ms / 86_400_000.0
}
