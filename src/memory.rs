//! Agent Memory orchestrator (C8): init, remember, recall, context
//! builders, prune, temporal, hourly summaries. See spec §4.8.

use crate::analyzer::{chunk, tokenize, ChunkMode};
use crate::config::{EncryptionMode, EngramConfig};
use crate::crypto::EncryptionKey;
use crate::episode::{days_since, Episode, EpisodeType};
use crate::error::{EngramError, Result};
use crate::integrity::Snapshot;
use crate::query::{supersession_chain, QueryEngine, SearchOptions};
use crate::storage::{Bm25IndexStorage, Storage, StorageStats};
use crate::synonyms::SynonymTable;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const BM25_INDEX_VERSION: &str = "1.1";
const INDEX_FORMAT_VERSION: &str = "1.1";

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_millis() as i64
}

fn generate_episode_id(agent_id: &str, now_ms: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8).map(|_| format!("{:x}", rng.gen_range(0..16u8))).collect();
    format!("ep_{agent_id}_{now_ms}_{suffix}")
}

fn format_date(ms: i64) -> String {
    let secs = ms.div_euclid(1000);
    let dt = chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default();
    dt.format("%Y-%m-%d").to_string()
}

/// Truncate `s` to at most `limit` characters, preferring to cut at
/// the last newline within the limit so a truncated episode doesn't
/// end mid-sentence.
fn truncate_at_boundary(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let truncated: String = s.chars().take(limit).collect();
    match truncated.rfind('\n') {
        Some(pos) if pos > 0 => truncated[..pos].to_string(),
        _ => truncated,
    }
}

#[derive(Debug, Clone)]
pub struct RememberOptions {
    pub episode_type: EpisodeType,
    pub tags: Vec<String>,
    pub importance: f32,
    pub supersedes: Option<Vec<String>>,
    pub chunk_mode: ChunkMode,
    pub max_tokens: usize,
    pub overlap: usize,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Default for RememberOptions {
    fn default() -> Self {
        Self {
            episode_type: EpisodeType::Fact,
            tags: vec![],
            importance: 0.5,
            supersedes: None,
            chunk_mode: ChunkMode::Paragraph,
            max_tokens: 500,
            overlap: 32,
            metadata: HashMap::new(),
        }
    }
}

impl RememberOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn episode_type(mut self, t: EpisodeType) -> Self {
        self.episode_type = t;
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    pub fn supersedes(mut self, ids: Vec<String>) -> Self {
        self.supersedes = Some(ids);
        self
    }

    pub fn chunk_mode(mut self, mode: ChunkMode, max_tokens: usize, overlap: usize) -> Self {
        self.chunk_mode = mode;
        self.max_tokens = max_tokens;
        self.overlap = overlap;
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone)]
pub struct InjectOptions {
    pub max_tokens: usize,
    pub exclude_tags: Vec<String>,
    pub priority_tags: Vec<String>,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self { max_tokens: 500, exclude_tags: vec![], priority_tags: vec![] }
    }
}

#[derive(Debug, Clone)]
pub struct PostCompactionOptions {
    pub hours_back: f64,
    pub max_chars: usize,
}

impl Default for PostCompactionOptions {
    fn default() -> Self {
        Self { hours_back: 24.0, max_chars: 4000 }
    }
}

/// A recalled episode annotated with the score that produced it.
#[derive(Debug, Clone)]
pub struct RecalledEpisode {
    pub episode: Episode,
    pub score: f64,
    pub bm25: f64,
    pub recency: f64,
}

const TRUNCATE_CHARS: usize = 300;

/// Ties together storage, the in-memory query engine, synonyms and
/// crypto into the public episodic-memory surface. See spec §4.8.
pub struct AgentMemory {
    config: EngramConfig,
    storage: Arc<dyn Storage>,
    bm25_storage: Option<Arc<dyn Bm25IndexStorage>>,
    synonyms: SynonymTable,
    query_engine: QueryEngine,
    key: Option<EncryptionKey>,
    initialized: bool,
}

impl AgentMemory {
    pub fn new(
        config: EngramConfig,
        storage: Arc<dyn Storage>,
        bm25_storage: Option<Arc<dyn Bm25IndexStorage>>,
    ) -> Self {
        Self {
            config,
            storage,
            bm25_storage,
            synonyms: SynonymTable::new(),
            query_engine: QueryEngine::new(),
            key: None,
            initialized: false,
        }
    }

    /// Convenience constructor for the local filesystem backend, which
    /// implements both `Storage` and `Bm25IndexStorage`.
    pub fn with_local_storage(config: EngramConfig) -> Self {
        let shared = Arc::new(crate::storage::local::LocalStorage::new(config.base_path()));
        let storage: Arc<dyn Storage> = shared.clone();
        let bm25_storage: Arc<dyn Bm25IndexStorage> = shared;
        Self::new(config, storage, Some(bm25_storage))
    }

    fn resolve_key(&mut self) -> Result<()> {
        if self.key.is_some() {
            return Ok(());
        }
        self.key = match self.config.encryption.clone() {
            EncryptionMode::Disabled => None,
            EncryptionMode::RawKey(hex_key) => Some(EncryptionKey::from_hex(&hex_key)?),
            EncryptionMode::Password(password) => {
                let salt_path = self.config.salt_path();
                let existing_salt = if salt_path.exists() {
                    let raw = std::fs::read_to_string(&salt_path)
                        .map_err(|e| EngramError::PolicyError(format!("read salt file: {e}")))?;
                    Some(hex::decode(raw.trim()).map_err(|e| {
                        EngramError::PolicyError(format!("invalid salt file contents: {e}"))
                    })?)
                } else {
                    None
                };
                let had_salt = existing_salt.is_some();
                let key = EncryptionKey::from_password(&password, existing_salt);
                if !had_salt {
                    if let Some(salt) = &key.salt {
                        std::fs::write(&salt_path, hex::encode(salt)).map_err(|e| {
                            EngramError::PolicyError(format!("write salt file: {e}"))
                        })?;
                    }
                }
                Some(key)
            }
            EncryptionMode::EnvVar(var) => {
                let raw = std::env::var(&var).map_err(|_| {
                    EngramError::PolicyError(format!("encryption env var {var} is not set"))
                })?;
                Some(EncryptionKey::from_hex(&raw)?)
            }
            EncryptionMode::KeyFile(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| EngramError::PolicyError(format!("read key file: {e}")))?;
                Some(EncryptionKey::from_hex(raw.trim())?)
            }
        };
        Ok(())
    }

    fn load_synonym_layers(&mut self) -> Result<()> {
        self.synonyms.load_defaults();
        self.synonyms.load_env_named()?;
        let per_store = self.config.synonym_store_path();
        self.synonyms.load_file(&per_store)?;
        if let Some(path) = self.config.synonym_file.clone() {
            self.synonyms.load_file(&path)?;
        }
        Ok(())
    }

    /// `SearchOptions::default()` with this store's configured blend
    /// weights applied, for the call sites that build options internally
    /// rather than taking them from the caller.
    fn default_search_options(&self) -> SearchOptions {
        SearchOptions {
            synonym_weight: self.config.synonym_weight,
            recency_lambda: self.config.recency_lambda,
            recency_weight: self.config.recency_weight,
            ..SearchOptions::default()
        }
    }

    fn persist_index(&self) -> Result<()> {
        if let Some(bm25) = &self.bm25_storage {
            let persisted = self.query_engine.to_persisted(BM25_INDEX_VERSION)?;
            bm25.save_bm25_index(&persisted)?;
        }
        Ok(())
    }

    /// Lazy, idempotent initialization: resolve the encryption key,
    /// load synonym layers, ensure storage exists, then attempt an
    /// incremental reload before falling back to a full rebuild.
    pub fn ensure_init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.resolve_key()?;
        self.load_synonym_layers()?;
        self.storage.init()?;

        let persisted = self.bm25_storage.as_ref().and_then(|s| s.load_bm25_index().ok().flatten());

        let mut accepted = false;
        if let Some(persisted) = &persisted {
            let new_episodes = self.storage.get_episodes_since(persisted.last_indexed_timestamp)?;
            let all_ids = self.storage.list_episode_ids()?;
            let tolerance = new_episodes.len();
            let lower = persisted.total_docs;
            let upper = persisted.total_docs + tolerance;
            if all_ids.len() >= lower && all_ids.len() <= upper {
                self.query_engine.restore_from_index(persisted)?;
                let all_episodes: Vec<Episode> = self
                    .storage
                    .get_all_episodes()?
                    .into_iter()
                    .map(|e| self.tokens_for_rebuild(e))
                    .collect();
                self.query_engine.rebuild_term_frequencies(&all_episodes);
                accepted = true;
            }
        }

        if !accepted {
            let all_episodes: Vec<Episode> = self
                .storage
                .get_all_episodes()?
                .into_iter()
                .map(|e| self.tokens_for_rebuild(e))
                .collect();
            self.query_engine.rebuild(&all_episodes);
        }

        self.persist_index()?;
        self.initialized = true;
        Ok(())
    }

    /// Encrypts `text`/`tags` in place for the on-disk form. Also
    /// strips `tokens`: the stemmed token list otherwise leaks content
    /// even under encryption, so a rebuild recomputes it from the
    /// decrypted text instead (see `tokens_for_rebuild`).
    fn encrypt_episode(&self, episode: &mut Episode) -> Result<()> {
        let Some(key) = &self.key else { return Ok(()) };
        if !episode.encrypted {
            episode.text = key.encrypt_field(&episode.text)?;
            episode.encrypted = true;
            episode.tokens.clear();
        }
        if !episode.tags.is_empty() && !episode.tags_encrypted {
            let stored = key.encrypt_tags(&episode.tags)?;
            episode.tags = vec![stored];
            episode.tags_encrypted = true;
        }
        Ok(())
    }

    /// Recompute `tokens` for an episode hydrated straight from storage
    /// when encryption stripped them from the persisted form.
    fn tokens_for_rebuild(&self, mut episode: Episode) -> Episode {
        if episode.tokens.is_empty() && episode.encrypted {
            if let Some(key) = &self.key {
                if let Ok(text) = key.decrypt_field(&episode.text) {
                    episode.tokens = tokenize(&text);
                }
            }
        }
        episode
    }

    fn decrypt_episode(&self, episode: &mut Episode) -> Result<()> {
        if episode.encrypted {
            let key = self.key.as_ref().ok_or_else(|| {
                EngramError::PolicyError("episode is encrypted but no key is resolved".to_string())
            })?;
            episode.text = key.decrypt_field(&episode.text)?;
            episode.encrypted = false;
        }
        if episode.tags_encrypted {
            let key = self.key.as_ref().ok_or_else(|| {
                EngramError::PolicyError("episode tags are encrypted but no key is resolved".to_string())
            })?;
            let stored = episode.tags.first().cloned().unwrap_or_default();
            episode.tags = key.decrypt_tags(&stored)?;
            episode.tags_encrypted = false;
        }
        Ok(())
    }

    /// Chunk `text`, build one episode per chunk (`supersedes` only on
    /// chunk 0), index, encrypt, save, update the tag index, then wire
    /// up supersession back-links. Returns the saved (decrypted-form)
    /// episodes.
    pub fn remember(&mut self, text: &str, opts: RememberOptions) -> Result<Vec<Episode>> {
        self.ensure_init()?;
        let now = now_ms();
        let chunks = chunk(text, opts.chunk_mode, opts.max_tokens, opts.overlap);
        let chunks: Vec<String> = if chunks.is_empty() { vec![text.to_string()] } else { chunks };
        let total_chunks = chunks.len();
        let source_id = generate_episode_id(&self.config.agent_id, now);

        let mut saved = Vec::with_capacity(total_chunks);
        for (i, chunk_text) in chunks.into_iter().enumerate() {
            let tokens = tokenize(&chunk_text);
            let episode = Episode {
                id: generate_episode_id(&self.config.agent_id, now),
                text: chunk_text,
                episode_type: opts.episode_type.clone(),
                tags: opts.tags.clone(),
                importance: opts.importance,
                agent_id: self.config.agent_id.clone(),
                metadata: opts.metadata.clone(),
                chunk_index: i,
                total_chunks,
                source_id: source_id.clone(),
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
                tokens,
                supersedes: if i == 0 { opts.supersedes.clone() } else { None },
                superseded_by: vec![],
                encrypted: false,
                tags_encrypted: false,
            };

            self.query_engine.add(&episode);

            let mut stored = episode.clone();
            self.encrypt_episode(&mut stored)?;
            self.storage.save_episode(&stored)?;
            self.storage.add_to_tag_index(&stored)?;

            saved.push(episode);
        }

        if let Some(supersedes) = &opts.supersedes {
            if let Some(new_episode) = saved.first() {
                for old_id in supersedes {
                    if let Some(mut old_episode) = self.storage.get_episode(old_id)? {
                        old_episode.mark_superseded_by(&new_episode.id);
                        self.storage.save_episode(&old_episode)?;
                        self.query_engine.mark_superseded(old_id, &new_episode.id);
                    }
                }
            }
        }

        self.persist_index()?;
        Ok(saved)
    }

    /// Search in memory, lazily hydrate the top hits from storage,
    /// decrypt, bump access stats, and persist the access-stat update.
    pub fn recall(&mut self, query: &str, opts: &SearchOptions) -> Result<Vec<RecalledEpisode>> {
        self.ensure_init()?;
        let now = now_ms();
        let hits = self.query_engine.search(query, opts, &self.synonyms, now)?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(mut episode) = self.storage.get_episode(&hit.id)? else {
                continue;
            };
            self.decrypt_episode(&mut episode)?;
            episode.access_count += 1;
            episode.last_accessed_at = now;

            let mut stored = episode.clone();
            self.encrypt_episode(&mut stored)?;
            self.storage.save_episode(&stored)?;
            self.query_engine.touch_access(&hit.id, now);

            results.push(RecalledEpisode {
                episode,
                score: hit.score,
                bm25: hit.bm25,
                recency: hit.recency,
            });
        }
        Ok(results)
    }

    /// Recall top-20 and concatenate formatted lines until the next
    /// entry would push the analyzer token count over `max_tokens`.
    pub fn build_context(&mut self, query: &str, max_tokens: usize) -> Result<String> {
        let opts = SearchOptions { limit: 20, ..self.default_search_options() };
        let results = self.recall(query, &opts)?;

        let mut out = String::new();
        for r in results {
            let line = format!(
                "[{}] ({})[{}]: {}\n\n",
                format_date(r.episode.created_at),
                r.episode.episode_type.as_str(),
                r.episode.tags.join(","),
                r.episode.text
            );
            let projected = format!("{out}{line}");
            if !out.is_empty() && tokenize(&projected).len() > max_tokens {
                break;
            }
            out = projected;
        }
        Ok(out)
    }

    /// Fast path: search (top-15) + top-10 recent ids from the
    /// in-memory doc map directly (no I/O), deduped, filtered by
    /// `excludeTags`, boosted 1.5x for `priorityTags`, hydrated,
    /// each episode truncated to 300 chars, rendered under two
    /// headers, then the whole string truncated to `maxTokens * 3.5`
    /// characters.
    pub fn inject_context(&mut self, query: &str, opts: &InjectOptions) -> Result<String> {
        self.ensure_init()?;
        let now = now_ms();
        let search_opts = SearchOptions { limit: 15, ..self.default_search_options() };
        let mut relevant_hits = self.query_engine.search(query, &search_opts, &self.synonyms, now)?;

        for hit in &mut relevant_hits {
            if let Some(tags) = self.query_engine.tags_of(&hit.id) {
                if tags.iter().any(|t| opts.priority_tags.contains(t)) {
                    hit.score *= 1.5;
                }
            }
        }
        relevant_hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let relevant_ids: Vec<String> = relevant_hits
            .into_iter()
            .filter(|h| {
                self.query_engine
                    .tags_of(&h.id)
                    .map(|tags| !tags.iter().any(|t| opts.exclude_tags.contains(t)))
                    .unwrap_or(true)
            })
            .map(|h| h.id)
            .collect();

        let recent_ids: Vec<String> = self
            .query_engine
            .recent_ids(10)
            .into_iter()
            .filter(|id| !relevant_ids.contains(id))
            .filter(|id| {
                self.query_engine
                    .tags_of(id)
                    .map(|tags| !tags.iter().any(|t| opts.exclude_tags.contains(t)))
                    .unwrap_or(true)
            })
            .collect();

        let mut out = String::new();
        out.push_str("## Relevant Memories\n");
        for id in &relevant_ids {
            if let Some(mut ep) = self.storage.get_episode(id)? {
                self.decrypt_episode(&mut ep)?;
                out.push_str(&truncate_at_boundary(&ep.text, TRUNCATE_CHARS));
                out.push('\n');
            }
        }
        out.push_str("\n## Recent Context\n");
        for id in &recent_ids {
            if let Some(mut ep) = self.storage.get_episode(id)? {
                self.decrypt_episode(&mut ep)?;
                out.push_str(&truncate_at_boundary(&ep.text, TRUNCATE_CHARS));
                out.push('\n');
            }
        }

        let char_budget = (opts.max_tokens as f64 * 3.5) as usize;
        Ok(truncate_at_boundary(&out, char_budget))
    }

    /// All in-memory docs created within `hours_back`, sorted by the
    /// fixed type-priority table then newer-first, hydrated and
    /// truncated until the character budget is hit.
    pub fn post_compaction_context(&mut self, opts: &PostCompactionOptions) -> Result<String> {
        self.ensure_init()?;
        let now = now_ms();
        let since = now - (opts.hours_back * 3_600_000.0) as i64;
        let mut ids = self.query_engine.ids_since(since);

        ids.sort_by(|a, b| {
            let pa = self
                .query_engine
                .episode_type_of(a)
                .map(|t| EpisodeType::from(t).compaction_priority())
                .unwrap_or(10);
            let pb = self
                .query_engine
                .episode_type_of(b)
                .map(|t| EpisodeType::from(t).compaction_priority())
                .unwrap_or(10);
            pa.cmp(&pb).then_with(|| {
                let ca = self.query_engine.created_at_of(a).unwrap_or(0);
                let cb = self.query_engine.created_at_of(b).unwrap_or(0);
                cb.cmp(&ca)
            })
        });

        let mut out = String::new();
        for id in ids {
            let Some(mut ep) = self.storage.get_episode(&id)? else { continue };
            self.decrypt_episode(&mut ep)?;
            let text = truncate_at_boundary(&ep.text, TRUNCATE_CHARS);
            let line = format!(
                "[{}] ({})[{}]: {}\n\n",
                format_date(ep.created_at),
                ep.episode_type.as_str(),
                ep.tags.join(","),
                text
            );
            if out.len() + line.len() > opts.max_chars {
                break;
            }
            out.push_str(&line);
        }
        Ok(out)
    }

    /// Forget episodes beyond `keep` by effective-importance rank, or
    /// old-and-unimportant episodes past `max_age_days`. Returns the
    /// count forgotten.
    pub fn prune(&mut self) -> Result<usize> {
        self.ensure_init()?;
        let now = now_ms();
        let episodes = self.storage.get_all_episodes()?;

        let mut scored: Vec<(Episode, f32, f64)> = episodes
            .into_iter()
            .map(|ep| {
                let eff = ep.effective_importance(now);
                let age_days = days_since(ep.created_at, now);
                (ep, eff, age_days)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut forgotten = 0;
        for (rank, (episode, eff_importance, age_days)) in scored.into_iter().enumerate() {
            let past_keep = rank >= self.config.prune_keep;
            let stale = age_days > self.config.prune_max_age_days
                && eff_importance < self.config.prune_min_importance;
            if past_keep || stale {
                self.forget(&episode.id)?;
                forgotten += 1;
            }
        }
        Ok(forgotten)
    }

    /// Remove an episode from the tag index, storage and in-memory
    /// index. Tag-index removal happens first so backends whose wire
    /// protocol needs the episode body to know its tags (§4.1) still
    /// see it.
    pub fn forget(&mut self, id: &str) -> Result<bool> {
        self.ensure_init()?;
        self.storage.remove_from_tag_index(id)?;
        let removed = self.storage.delete_episode(id)?;
        self.query_engine.remove(id);
        self.persist_index()?;
        Ok(removed)
    }

    /// The `limit` most recently created episodes, newest first. No
    /// search involved; scores are zeroed.
    pub fn recent(&mut self, limit: usize) -> Result<Vec<RecalledEpisode>> {
        self.ensure_init()?;
        let ids = self.query_engine.recent_ids(limit);
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(mut ep) = self.storage.get_episode(&id)? {
                self.decrypt_episode(&mut ep)?;
                results.push(RecalledEpisode { episode: ep, score: 0.0, bm25: 0.0, recency: 0.0 });
            }
        }
        Ok(results)
    }

    /// All episode ids carrying `tag`.
    pub fn find_by_tag(&mut self, tag: &str) -> Result<Vec<String>> {
        self.ensure_init()?;
        self.storage.get_by_tag(tag)
    }

    /// Parse a natural-language temporal query. If it resolves to a
    /// pure range with no remaining text, return all in-range episodes
    /// newest-first with no search involved; otherwise recall the
    /// remaining text with the range applied as a filter.
    pub fn temporal(&mut self, query: &str) -> Result<Vec<RecalledEpisode>> {
        self.ensure_init()?;
        let now = now_ms();
        let parsed = crate::temporal::parse_temporal(query, now);

        let has_range = parsed.after.is_some() || parsed.before.is_some();
        if has_range && parsed.remaining.trim().is_empty() {
            let mut ids = self.query_engine.ids_in_range(parsed.after, parsed.before);
            ids.sort_by(|a, b| {
                let ca = self.query_engine.created_at_of(a).unwrap_or(0);
                let cb = self.query_engine.created_at_of(b).unwrap_or(0);
                cb.cmp(&ca)
            });
            let mut results = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(mut ep) = self.storage.get_episode(&id)? {
                    self.decrypt_episode(&mut ep)?;
                    results.push(RecalledEpisode { episode: ep, score: 0.0, bm25: 0.0, recency: 0.0 });
                }
            }
            Ok(results)
        } else {
            let opts = SearchOptions {
                after: parsed.after,
                before: parsed.before,
                ..self.default_search_options()
            };
            self.recall(&parsed.remaining, &opts)
        }
    }

    /// Emit one `summary` episode listing non-`summary` episodes from
    /// the last `hours`. Optionally marks the listed episodes as
    /// superseded by the new summary.
    pub fn hourly_summary(&mut self, hours: f64, mark_superseded: bool) -> Result<Episode> {
        self.ensure_init()?;
        let now = now_ms();
        let since = now - (hours * 3_600_000.0) as i64 - 1;
        let mut sources = self.storage.get_episodes_since(since)?;
        for ep in &mut sources {
            self.decrypt_episode(ep)?;
        }
        sources.retain(|ep| !matches!(ep.episode_type, EpisodeType::Summary));

        let mut lines = Vec::with_capacity(sources.len());
        for ep in &sources {
            lines.push(format!(
                "- [{}] ({}) {}",
                format_date(ep.created_at),
                ep.episode_type.as_str(),
                truncate_at_boundary(&ep.text, 120)
            ));
        }
        let text = format!(
            "Hourly summary ({} episodes, last {hours}h):\n{}",
            sources.len(),
            lines.join("\n")
        );

        let source_ids: Vec<String> = sources.iter().map(|ep| ep.id.clone()).collect();
        let mut opts = RememberOptions::new()
            .episode_type(EpisodeType::Summary)
            .tags(vec!["summary".to_string()])
            .importance(0.6)
            .chunk_mode(ChunkMode::Paragraph, usize::MAX, 0);
        if mark_superseded {
            opts = opts.supersedes(source_ids);
        }

        let saved = self.remember(&text, opts)?;
        saved.into_iter().next().ok_or_else(|| {
            EngramError::TransportError("hourly summary produced no episode".to_string())
        })
    }

    /// The full supersession chain containing `id`, earliest first.
    /// Unknown ids are recovered locally (§7 NotFound): empty, not an
    /// error.
    pub fn chain(&mut self, id: &str) -> Result<Vec<String>> {
        self.ensure_init()?;
        if self.storage.get_episode(id)?.is_none() {
            return Ok(Vec::new());
        }
        supersession_chain(id, self.storage.as_ref())
    }

    pub fn snapshot(&mut self) -> Result<Snapshot> {
        self.ensure_init()?;
        let episodes = self.storage.get_all_episodes()?;
        Snapshot::build(&episodes, now_ms())
    }

    pub fn verify_root(&mut self, expected_root: &str) -> Result<bool> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.root == expected_root)
    }

    pub fn stats(&mut self) -> Result<StorageStats> {
        self.ensure_init()?;
        self.storage.get_stats()
    }

    pub fn config(&self) -> &EngramConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_config() -> EngramConfig {
        let dir = std::env::temp_dir().join(format!(
            "engram_memory_test_{}_{}",
            std::process::id(),
            now_ms()
        ));
        EngramConfig::new(dir, "agent-test")
    }

    #[test]
    fn remember_and_recall_round_trips() {
        let config = fresh_config();
        let base = config.base_path().to_path_buf();
        let mut memory = AgentMemory::with_local_storage(config);

        memory
            .remember("I am long FXRP on the bridge", RememberOptions::new())
            .unwrap();

        let results = memory.recall("flare xrp position", &SearchOptions::default()).unwrap();
        assert!(!results.is_empty());
        let _ = std::fs::remove_dir_all(base);
    }

    #[test]
    fn forget_removes_episode() {
        let config = fresh_config();
        let base = config.base_path().to_path_buf();
        let mut memory = AgentMemory::with_local_storage(config);

        let saved = memory.remember("a fact to forget", RememberOptions::new()).unwrap();
        let id = saved[0].id.clone();
        assert!(memory.forget(&id).unwrap());
        assert!(!memory.forget(&id).unwrap());
        let _ = std::fs::remove_dir_all(base);
    }

    #[test]
    fn supersession_updates_back_links() {
        let config = fresh_config();
        let base = config.base_path().to_path_buf();
        let mut memory = AgentMemory::with_local_storage(config);

        let first = memory.remember("old position: long 100 FXRP", RememberOptions::new()).unwrap();
        let old_id = first[0].id.clone();
        memory
            .remember(
                "new position: long 200 FXRP",
                RememberOptions::new().supersedes(vec![old_id.clone()]),
            )
            .unwrap();

        let chain = memory.chain(&old_id).unwrap();
        assert_eq!(chain.len(), 2);
        let _ = std::fs::remove_dir_all(base);
    }

    #[test]
    fn encrypted_round_trip_recovers_plaintext() {
        let config = fresh_config().with_raw_key("ab".repeat(32));
        let base = config.base_path().to_path_buf();
        let mut memory = AgentMemory::with_local_storage(config);

        memory.remember("top secret trading strategy", RememberOptions::new()).unwrap();
        let results = memory.recall("secret trading strategy", &SearchOptions::default()).unwrap();
        assert_eq!(results[0].episode.text, "top secret trading strategy");
        let _ = std::fs::remove_dir_all(base);
    }

    #[test]
    fn encrypted_store_strips_tokens_but_rebuilds_search_on_reopen() {
        let key = "cd".repeat(32);
        let config = fresh_config().with_raw_key(key.clone());
        let base = config.base_path().to_path_buf();
        {
            let mut memory = AgentMemory::with_local_storage(config);
            let saved = memory
                .remember("gas fees spiked on the bridging route", RememberOptions::new())
                .unwrap();
            let on_disk = memory.storage.get_episode(&saved[0].id).unwrap().unwrap();
            assert!(on_disk.tokens.is_empty());
        }

        let reopened = EngramConfig::new(&base, "agent-test").with_raw_key(key);
        let mut memory = AgentMemory::with_local_storage(reopened);
        let results = memory.recall("bridging gas fees", &SearchOptions::default()).unwrap();
        assert!(!results.is_empty());
        let _ = std::fs::remove_dir_all(base);
    }
}
