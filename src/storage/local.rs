//! Local filesystem storage backend (spec §6.1): one JSON file per
//! episode, a tag index and a BM25 index snapshot alongside it.

use super::{Bm25IndexStorage, PersistedBm25Index, Storage, StorageStats};
use crate::episode::Episode;
use crate::error::{EngramError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const EPISODES_DIR: &str = "episodes";
const INDEX_DIR: &str = "index";
const TAGS_FILE: &str = "tags.json";
const BM25_INDEX_FILE: &str = "bm25-index.json";
const ANCHORS_DIR: &str = "anchors";

/// File-tree storage rooted at `base_path`. Tag-index read-modify-write
/// cycles are serialized with an in-process mutex; this backend does
/// not itself guard against other processes writing the same tree.
pub struct LocalStorage {
    base_path: PathBuf,
    tag_lock: Mutex<()>,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            tag_lock: Mutex::new(()),
        }
    }

    fn episodes_dir(&self) -> PathBuf {
        self.base_path.join(EPISODES_DIR)
    }

    fn index_dir(&self) -> PathBuf {
        self.base_path.join(INDEX_DIR)
    }

    pub fn anchors_dir(&self) -> PathBuf {
        self.base_path.join(ANCHORS_DIR)
    }

    fn episode_path(&self, id: &str) -> PathBuf {
        self.episodes_dir().join(format!("{id}.json"))
    }

    fn tags_path(&self) -> PathBuf {
        self.index_dir().join(TAGS_FILE)
    }

    fn bm25_index_path(&self) -> PathBuf {
        self.index_dir().join(BM25_INDEX_FILE)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn read_tag_map(&self) -> Result<HashMap<String, Vec<String>>> {
        let path = self.tags_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let data = fs::read_to_string(&path)
            .map_err(|e| EngramError::TransportError(format!("read tags.json: {e}")))?;
        serde_json::from_str(&data)
            .map_err(|e| EngramError::Malformed(format!("tags.json: {e}")))
    }

    fn write_tag_map(&self, map: &HashMap<String, Vec<String>>) -> Result<()> {
        let data = serde_json::to_string_pretty(map)
            .map_err(|e| EngramError::Malformed(format!("serialize tags.json: {e}")))?;
        fs::write(self.tags_path(), data)
            .map_err(|e| EngramError::TransportError(format!("write tags.json: {e}")))
    }
}

impl Storage for LocalStorage {
    fn init(&self) -> Result<()> {
        fs::create_dir_all(self.episodes_dir())
            .map_err(|e| EngramError::TransportError(format!("create episodes dir: {e}")))?;
        fs::create_dir_all(self.index_dir())
            .map_err(|e| EngramError::TransportError(format!("create index dir: {e}")))?;
        fs::create_dir_all(self.anchors_dir())
            .map_err(|e| EngramError::TransportError(format!("create anchors dir: {e}")))?;
        Ok(())
    }

    fn save_episode(&self, episode: &Episode) -> Result<()> {
        let data = serde_json::to_string_pretty(episode)
            .map_err(|e| EngramError::Malformed(format!("serialize episode: {e}")))?;
        fs::write(self.episode_path(&episode.id), data)
            .map_err(|e| EngramError::TransportError(format!("write episode {}: {e}", episode.id)))
    }

    fn get_episode(&self, id: &str) -> Result<Option<Episode>> {
        let path = self.episode_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .map_err(|e| EngramError::TransportError(format!("read episode {id}: {e}")))?;
        let episode = serde_json::from_str(&data)
            .map_err(|e| EngramError::Malformed(format!("episode {id}: {e}")))?;
        Ok(Some(episode))
    }

    fn delete_episode(&self, id: &str) -> Result<bool> {
        let path = self.episode_path(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .map_err(|e| EngramError::TransportError(format!("delete episode {id}: {e}")))?;
        Ok(true)
    }

    fn get_all_episodes(&self) -> Result<Vec<Episode>> {
        let dir = self.episodes_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut episodes = Vec::new();
        for entry in fs::read_dir(&dir)
            .map_err(|e| EngramError::TransportError(format!("read episodes dir: {e}")))?
        {
            let entry = entry
                .map_err(|e| EngramError::TransportError(format!("read episodes dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(data) => match serde_json::from_str::<Episode>(&data) {
                    Ok(ep) => episodes.push(ep),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping malformed episode file");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable episode file");
                }
            }
        }
        Ok(episodes)
    }

    fn list_episode_ids(&self) -> Result<Vec<String>> {
        let dir = self.episodes_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)
            .map_err(|e| EngramError::TransportError(format!("read episodes dir: {e}")))?
        {
            let entry = entry
                .map_err(|e| EngramError::TransportError(format!("read episodes dir entry: {e}")))?;
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    fn get_episodes_since(&self, since_ms: i64) -> Result<Vec<Episode>> {
        Ok(self
            .get_all_episodes()?
            .into_iter()
            .filter(|ep| ep.created_at > since_ms)
            .collect())
    }

    fn add_to_tag_index(&self, episode: &Episode) -> Result<()> {
        let _guard = self.tag_lock.lock().unwrap();
        let mut map = self.read_tag_map()?;
        for tag in &episode.tags {
            let ids = map.entry(tag.clone()).or_default();
            if !ids.iter().any(|id| id == &episode.id) {
                ids.push(episode.id.clone());
            }
        }
        self.write_tag_map(&map)
    }

    fn remove_from_tag_index(&self, id: &str) -> Result<()> {
        let _guard = self.tag_lock.lock().unwrap();
        let mut map = self.read_tag_map()?;
        for ids in map.values_mut() {
            ids.retain(|existing| existing != id);
        }
        map.retain(|_, ids| !ids.is_empty());
        self.write_tag_map(&map)
    }

    fn get_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        let map = self.read_tag_map()?;
        Ok(map.get(tag).cloned().unwrap_or_default())
    }

    fn get_stats(&self) -> Result<StorageStats> {
        let ids = self.list_episode_ids()?;
        let mut bytes = 0u64;
        for id in &ids {
            if let Ok(meta) = fs::metadata(self.episode_path(id)) {
                bytes += meta.len();
            }
        }
        Ok(StorageStats {
            episode_count: ids.len(),
            bytes,
            path: self.base_path.display().to_string(),
        })
    }
}

impl Bm25IndexStorage for LocalStorage {
    fn load_bm25_index(&self) -> Result<Option<PersistedBm25Index>> {
        let path = self.bm25_index_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .map_err(|e| EngramError::TransportError(format!("read bm25-index.json: {e}")))?;
        match serde_json::from_str(&data) {
            Ok(index) => Ok(Some(index)),
            Err(e) => {
                tracing::warn!(error = %e, "persisted bm25 index is malformed, forcing rebuild");
                Ok(None)
            }
        }
    }

    fn save_bm25_index(&self, index: &PersistedBm25Index) -> Result<()> {
        let data = serde_json::to_string_pretty(index)
            .map_err(|e| EngramError::Malformed(format!("serialize bm25 index: {e}")))?;
        fs::write(self.bm25_index_path(), data)
            .map_err(|e| EngramError::TransportError(format!("write bm25-index.json: {e}")))
    }
}
