//! In-memory Query Engine (C7): inverted statistics over currently
//! indexed episodes, filtered ranked search, supersession chain walk.
//! See spec §4.5.

use crate::analyzer::tokenize;
use crate::episode::{days_since, Episode};
use crate::error::{EngramError, Result};
use crate::scoring::{bm25, idf};
use crate::storage::{PersistedBm25Index, PersistedDocMeta, Storage};
use crate::synonyms::SynonymTable;
use std::collections::HashMap;

const DEFAULT_SYNONYM_WEIGHT: f64 = 0.5;
const DEFAULT_RECENCY_LAMBDA: f64 = 0.1;
const DEFAULT_RECENCY_WEIGHT: f64 = 0.3;
const DEFAULT_LIMIT: usize = 10;
const SUPERSESSION_PENALTY: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub tags: Vec<String>,
    pub episode_type: Option<String>,
    pub after: Option<i64>,
    pub before: Option<i64>,
    pub min_importance: Option<f32>,
    pub use_synonyms: bool,
    pub synonym_weight: f64,
    pub recency_lambda: f64,
    pub recency_weight: f64,
    pub include_superseded: bool,
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            tags: vec![],
            episode_type: None,
            after: None,
            before: None,
            min_importance: None,
            use_synonyms: true,
            synonym_weight: DEFAULT_SYNONYM_WEIGHT,
            recency_lambda: DEFAULT_RECENCY_LAMBDA,
            recency_weight: DEFAULT_RECENCY_WEIGHT,
            include_superseded: false,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub bm25: f64,
    pub recency: f64,
}

/// A document's indexed metadata and term frequencies.
#[derive(Debug, Clone)]
struct DocEntry {
    tf: HashMap<String, u32>,
    dl: usize,
    created_at: i64,
    importance: f32,
    last_accessed_at: i64,
    tags: Vec<String>,
    episode_type: String,
    superseded_by: Vec<String>,
}

/// Maintains inverted statistics (`df`, total doc count/length) plus
/// per-document term frequencies, and serves ranked search over them.
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    df: HashMap<String, u32>,
    docs: HashMap<String, DocEntry>,
    total_docs: usize,
    total_length: usize,
    last_indexed_timestamp: i64,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn last_indexed_timestamp(&self) -> i64 {
        self.last_indexed_timestamp
    }

    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    /// No-op if `id` is already indexed.
    pub fn add(&mut self, episode: &Episode) {
        if self.docs.contains_key(&episode.id) {
            return;
        }
        let mut tf: HashMap<String, u32> = HashMap::new();
        for term in &episode.tokens {
            *tf.entry(term.clone()).or_insert(0) += 1;
        }
        for term in tf.keys() {
            *self.df.entry(term.clone()).or_insert(0) += 1;
        }
        let dl = episode.tokens.len();
        self.total_docs += 1;
        self.total_length += dl;
        self.last_indexed_timestamp = self.last_indexed_timestamp.max(episode.created_at);

        self.docs.insert(
            episode.id.clone(),
            DocEntry {
                tf,
                dl,
                created_at: episode.created_at,
                importance: episode.importance,
                last_accessed_at: episode.last_accessed_at,
                tags: episode.tags.clone(),
                episode_type: episode.episode_type.as_str().to_string(),
                superseded_by: episode.superseded_by.clone(),
            },
        );
    }

    pub fn remove(&mut self, id: &str) {
        let Some(entry) = self.docs.remove(id) else {
            return;
        };
        for term in entry.tf.keys() {
            if let Some(count) = self.df.get_mut(term) {
                if *count <= 1 {
                    self.df.remove(term);
                } else {
                    *count -= 1;
                }
            }
        }
        self.total_docs = self.total_docs.saturating_sub(1);
        self.total_length = self.total_length.saturating_sub(entry.dl);
    }

    /// Refresh access bookkeeping for `id` without touching `tf`/`df`
    /// (used by `recall` after hydration updates `lastAccessedAt`).
    pub fn touch_access(&mut self, id: &str, last_accessed_at: i64) {
        if let Some(entry) = self.docs.get_mut(id) {
            entry.last_accessed_at = last_accessed_at;
        }
    }

    pub fn mark_superseded(&mut self, id: &str, superseded_by: &str) {
        if let Some(entry) = self.docs.get_mut(id) {
            if !entry.superseded_by.iter().any(|s| s == superseded_by) {
                entry.superseded_by.push(superseded_by.to_string());
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn rebuild(&mut self, episodes: &[Episode]) {
        self.clear();
        for ep in episodes {
            self.add(ep);
        }
    }

    /// Populate `df`/totals/per-doc metadata from a persisted index.
    /// Per-doc `tf` is not part of the persisted format and is left
    /// empty here; callers rebuild it from hydrated episode bodies.
    pub fn restore_from_index(&mut self, persisted: &PersistedBm25Index) -> Result<()> {
        self.clear();
        self.df = persisted.df.clone();
        self.total_docs = persisted.total_docs;
        self.total_length = persisted.total_length;
        self.last_indexed_timestamp = persisted.last_indexed_timestamp;

        for (id, dl) in &persisted.doc_lengths {
            let meta: PersistedDocMeta = match persisted.doc_meta.get(id) {
                Some(raw) => serde_json::from_str(raw).map_err(|e| {
                    crate::error::EngramError::Malformed(format!("docMeta for {id}: {e}"))
                })?,
                None => continue,
            };
            self.docs.insert(
                id.clone(),
                DocEntry {
                    tf: HashMap::new(),
                    dl: *dl,
                    created_at: meta.created_at,
                    importance: meta.importance,
                    last_accessed_at: meta.last_accessed_at,
                    tags: meta.tags,
                    episode_type: meta.episode_type,
                    superseded_by: vec![],
                },
            );
        }
        Ok(())
    }

    /// Rebuild per-doc `tf` in place from hydrated episode bodies,
    /// following a `restore_from_index` (spec §4.8's "correctness
    /// oracle, not a zero-cost reload" policy).
    pub fn rebuild_term_frequencies(&mut self, episodes: &[Episode]) {
        for ep in episodes {
            if let Some(entry) = self.docs.get_mut(&ep.id) {
                let mut tf: HashMap<String, u32> = HashMap::new();
                for term in &ep.tokens {
                    *tf.entry(term.clone()).or_insert(0) += 1;
                }
                entry.tf = tf;
                entry.superseded_by = ep.superseded_by.clone();
            }
        }
    }

    pub fn to_persisted(&self, version: &str) -> Result<PersistedBm25Index> {
        let mut doc_lengths = HashMap::new();
        let mut doc_meta = HashMap::new();
        for (id, entry) in &self.docs {
            doc_lengths.insert(id.clone(), entry.dl);
            let meta = PersistedDocMeta {
                created_at: entry.created_at,
                importance: entry.importance,
                last_accessed_at: entry.last_accessed_at,
                tags: entry.tags.clone(),
                episode_type: entry.episode_type.clone(),
            };
            let raw = serde_json::to_string(&meta).map_err(|e| {
                crate::error::EngramError::Malformed(format!("serialize docMeta for {id}: {e}"))
            })?;
            doc_meta.insert(id.clone(), raw);
        }
        Ok(PersistedBm25Index {
            version: version.to_string(),
            df: self.df.clone(),
            doc_lengths,
            doc_meta,
            total_docs: self.total_docs,
            total_length: self.total_length,
            last_indexed_timestamp: self.last_indexed_timestamp,
        })
    }

    fn avgdl(&self) -> f64 {
        if self.total_docs == 0 {
            0.0
        } else {
            self.total_length as f64 / self.total_docs as f64
        }
    }

    fn term_score(&self, entry: &DocEntry, terms: &[String]) -> f64 {
        let avgdl = self.avgdl();
        terms
            .iter()
            .map(|t| {
                let tf = *entry.tf.get(t).unwrap_or(&0);
                let df = *self.df.get(t).unwrap_or(&0) as usize;
                if df == 0 {
                    0.0
                } else {
                    bm25(tf, entry.dl, avgdl, idf(df, self.total_docs))
                }
            })
            .sum()
    }

    /// Search per spec §4.5's pipeline: tokenize, optionally expand via
    /// synonyms, filter, blend BM25 with recency and importance, apply
    /// the supersession penalty, sort and truncate.
    ///
    /// Rejects `synonym_weight`/`recency_weight` outside `[0, 1]` (spec
    /// §7) rather than silently producing a nonsensical blend.
    pub fn search(
        &self,
        query: &str,
        opts: &SearchOptions,
        synonyms: &SynonymTable,
        now_ms: i64,
    ) -> Result<Vec<SearchHit>> {
        if !(0.0..=1.0).contains(&opts.synonym_weight) {
            return Err(EngramError::UsageError(format!(
                "synonym_weight must be within [0, 1], got {}",
                opts.synonym_weight
            )));
        }
        if !(0.0..=1.0).contains(&opts.recency_weight) {
            return Err(EngramError::UsageError(format!(
                "recency_weight must be within [0, 1], got {}",
                opts.recency_weight
            )));
        }

        let qtokens = tokenize(query);
        if qtokens.is_empty() {
            return Ok(vec![]);
        }

        let syntokens: Vec<String> = if opts.use_synonyms {
            let expansion = synonyms.expand(query);
            let expanded_text = expansion.expanded.join(" ");
            tokenize(&expanded_text)
                .into_iter()
                .filter(|t| !qtokens.contains(t))
                .collect()
        } else {
            vec![]
        };

        let mut hits: Vec<SearchHit> = Vec::new();

        for (id, entry) in &self.docs {
            if !opts.tags.iter().all(|t| entry.tags.iter().any(|et| et == t)) {
                continue;
            }
            if let Some(t) = &opts.episode_type {
                if &entry.episode_type != t {
                    continue;
                }
            }
            if let Some(after) = opts.after {
                if entry.created_at < after {
                    continue;
                }
            }
            if let Some(before) = opts.before {
                if entry.created_at > before {
                    continue;
                }
            }

            let days_since_access = days_since(entry.last_accessed_at, now_ms);
            let eff_importance = entry.importance * 0.95f32.powf(days_since_access as f32);
            if let Some(min_importance) = opts.min_importance {
                if eff_importance < min_importance {
                    continue;
                }
            }

            let b = self.term_score(entry, &qtokens);
            let bs = if syntokens.is_empty() {
                0.0
            } else {
                self.term_score(entry, &syntokens)
            };
            let total_bm25 = b + opts.synonym_weight * bs;
            if total_bm25 <= 0.0 {
                continue;
            }

            let days_since_created = days_since(entry.created_at, now_ms);
            let recency = (-opts.recency_lambda * days_since_created).exp();
            let blended = (1.0 - opts.recency_weight) * total_bm25 + opts.recency_weight * recency;
            let mut score = blended * (0.5 + eff_importance as f64);

            if !opts.include_superseded && !entry.superseded_by.is_empty() {
                score *= SUPERSESSION_PENALTY;
            }

            hits.push(SearchHit {
                id: id.clone(),
                score,
                bm25: total_bm25,
                recency,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(opts.limit);
        Ok(hits)
    }

    /// Top-N ids by `createdAt` (descending), no filter, no I/O. Used
    /// by `injectContext`'s fast path.
    pub fn recent_ids(&self, limit: usize) -> Vec<String> {
        let mut ids: Vec<(&String, i64)> =
            self.docs.iter().map(|(id, e)| (id, e.created_at)).collect();
        ids.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ids.into_iter().take(limit).map(|(id, _)| id.clone()).collect()
    }

    /// All ids with `createdAt >= since_ms`, for `postCompactionContext`.
    pub fn ids_since(&self, since_ms: i64) -> Vec<String> {
        self.docs
            .iter()
            .filter(|(_, e)| e.created_at >= since_ms)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn episode_type_of(&self, id: &str) -> Option<&str> {
        self.docs.get(id).map(|e| e.episode_type.as_str())
    }

    pub fn created_at_of(&self, id: &str) -> Option<i64> {
        self.docs.get(id).map(|e| e.created_at)
    }

    pub fn tags_of(&self, id: &str) -> Option<&[String]> {
        self.docs.get(id).map(|e| e.tags.as_slice())
    }

    /// All ids with `createdAt` inside `[after, before]` (either bound
    /// optional), for pure-range `temporal` queries with no search text.
    pub fn ids_in_range(&self, after: Option<i64>, before: Option<i64>) -> Vec<String> {
        self.docs
            .iter()
            .filter(|(_, e)| after.map_or(true, |a| e.created_at >= a))
            .filter(|(_, e)| before.map_or(true, |b| e.created_at <= b))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Back-walk via `supersedes[0]` (depth-first, first parent only) to
/// the earliest ancestor, then forward-walk via the fan-out
/// `supersededBy` to produce a linear-or-tree ordering. Returns the
/// chain oldest-to-newest. A cycle (revisited id) stops the walk.
pub fn supersession_chain(root_id: &str, storage: &dyn Storage) -> Result<Vec<String>> {
    let mut visited = std::collections::HashSet::new();
    let mut current = root_id.to_string();
    visited.insert(current.clone());

    loop {
        let Some(ep) = storage.get_episode(&current)? else {
            break;
        };
        let Some(parent) = ep.supersedes.as_ref().and_then(|v| v.first()) else {
            break;
        };
        if visited.contains(parent) {
            break;
        }
        visited.insert(parent.clone());
        current = parent.clone();
    }

    let earliest = current;
    let mut chain = vec![earliest.clone()];
    let mut frontier = vec![earliest];
    let mut seen: std::collections::HashSet<String> = chain.iter().cloned().collect();

    while let Some(id) = frontier.pop() {
        let Some(ep) = storage.get_episode(&id)? else {
            continue;
        };
        for next in &ep.superseded_by {
            if seen.insert(next.clone()) {
                chain.push(next.clone());
                frontier.push(next.clone());
            }
        }
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::EpisodeType;
    use std::collections::HashMap as StdHashMap;

    fn episode(id: &str, text_tokens: Vec<&str>, created_at: i64, importance: f32) -> Episode {
        Episode {
            id: id.to_string(),
            text: text_tokens.join(" "),
            episode_type: EpisodeType::Fact,
            tags: vec![],
            importance,
            agent_id: "agent".into(),
            metadata: StdHashMap::new(),
            chunk_index: 0,
            total_chunks: 1,
            source_id: "src".into(),
            created_at,
            last_accessed_at: created_at,
            access_count: 0,
            tokens: text_tokens.into_iter().map(String::from).collect(),
            supersedes: None,
            superseded_by: vec![],
            encrypted: false,
            tags_encrypted: false,
        }
    }

    #[test]
    fn add_is_idempotent_on_repeated_id() {
        let mut qe = QueryEngine::new();
        qe.add(&episode("ep_a_1_aaaaaaaa", vec!["alpha", "beta"], 1000, 0.5));
        qe.add(&episode("ep_a_1_aaaaaaaa", vec!["gamma"], 2000, 0.9));
        assert_eq!(qe.len(), 1);
        assert_eq!(qe.total_docs, 1);
    }

    #[test]
    fn remove_clears_df_when_reaching_zero() {
        let mut qe = QueryEngine::new();
        qe.add(&episode("ep_a_1_aaaaaaaa", vec!["unique"], 1000, 0.5));
        assert_eq!(qe.df.get("unique"), Some(&1));
        qe.remove("ep_a_1_aaaaaaaa");
        assert_eq!(qe.df.get("unique"), None);
        assert_eq!(qe.total_docs, 0);
    }

    #[test]
    fn search_returns_empty_for_blank_query() {
        let mut qe = QueryEngine::new();
        qe.add(&episode("ep_a_1_aaaaaaaa", vec!["alpha"], 1000, 0.5));
        let synonyms = SynonymTable::new();
        let hits = qe.search("the a an", &SearchOptions::default(), &synonyms, 2000).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_ranks_matching_doc_above_nonmatching() {
        let mut qe = QueryEngine::new();
        qe.add(&episode("ep_a_1_aaaaaaaa", vec!["trading", "position", "flare"], 1000, 0.5));
        qe.add(&episode("ep_a_2_bbbbbbbb", vec!["unrelated", "content"], 1000, 0.5));
        let synonyms = SynonymTable::new();
        let mut opts = SearchOptions::default();
        opts.use_synonyms = false;
        let hits = qe.search("flare position", &opts, &synonyms, 1000).unwrap();
        assert_eq!(hits[0].id, "ep_a_1_aaaaaaaa");
    }

    #[test]
    fn supersession_penalty_demotes_superseded_docs() {
        let mut qe = QueryEngine::new();
        let mut ep = episode("ep_a_1_aaaaaaaa", vec!["trading", "position"], 1000, 0.5);
        ep.superseded_by.push("ep_a_2_bbbbbbbb".into());
        qe.add(&ep);
        qe.add(&episode("ep_a_2_bbbbbbbb", vec!["trading", "position"], 1000, 0.5));
        let synonyms = SynonymTable::new();
        let mut opts = SearchOptions::default();
        opts.use_synonyms = false;
        let hits = qe.search("trading position", &opts, &synonyms, 1000).unwrap();
        let superseded_hit = hits.iter().find(|h| h.id == "ep_a_1_aaaaaaaa").unwrap();
        let current_hit = hits.iter().find(|h| h.id == "ep_a_2_bbbbbbbb").unwrap();
        assert!(superseded_hit.score < current_hit.score);
    }

    #[test]
    fn search_rejects_out_of_range_recency_weight() {
        let mut qe = QueryEngine::new();
        qe.add(&episode("ep_a_1_aaaaaaaa", vec!["alpha"], 1000, 0.5));
        let synonyms = SynonymTable::new();
        let opts = SearchOptions { recency_weight: 1.2, ..SearchOptions::default() };
        let err = qe.search("alpha", &opts, &synonyms, 1000).unwrap_err();
        assert!(matches!(err, crate::error::EngramError::UsageError(_)));
    }

    #[test]
    fn recent_ids_sorts_by_created_at_descending() {
        let mut qe = QueryEngine::new();
        qe.add(&episode("ep_a_1_aaaaaaaa", vec!["x"], 1000, 0.5));
        qe.add(&episode("ep_a_2_bbbbbbbb", vec!["y"], 2000, 0.5));
        let ids = qe.recent_ids(1);
        assert_eq!(ids, vec!["ep_a_2_bbbbbbbb".to_string()]);
    }

    #[test]
    fn supersession_chain_walks_oldest_to_newest() {
        use crate::storage::local::LocalStorage;
        use crate::storage::Storage;

        let dir = std::env::temp_dir().join(format!(
            "engram_query_chain_test_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        let storage = LocalStorage::new(&dir);
        storage.init().unwrap();

        let mut first = episode("ep_a_1_aaaaaaaa", vec!["x"], 1000, 0.5);
        let mut second = episode("ep_a_2_bbbbbbbb", vec!["x"], 2000, 0.5);
        second.supersedes = Some(vec![first.id.clone()]);
        first.mark_superseded_by(&second.id);
        let mut third = episode("ep_a_3_cccccccc", vec!["x"], 3000, 0.5);
        third.supersedes = Some(vec![second.id.clone()]);
        second.mark_superseded_by(&third.id);

        storage.save_episode(&first).unwrap();
        storage.save_episode(&second).unwrap();
        storage.save_episode(&third).unwrap();

        let chain = supersession_chain(&third.id, &storage).unwrap();
        assert_eq!(chain, vec![first.id.clone(), second.id.clone(), third.id.clone()]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
