//! Remote key-value storage backend (spec §4.1): a thin HTTP client
//! against the `engram-remote` wire protocol, bearer-token authenticated.

use super::{Bm25IndexStorage, PersistedBm25Index, Storage, StorageStats};
use crate::episode::Episode;
use crate::error::{EngramError, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the plain HTTP+JSON command protocol served by
/// `engram-remote-server` (PUT/GET/DELETE `/episodes/:id`, `/tags/...`,
/// `/index/bm25`, `/stats`).
pub struct RemoteStorage {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RemoteStorage {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("reqwest client builder should not fail with default TLS config");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
    }

    fn map_transport_err(context: &str) -> impl Fn(reqwest::Error) -> EngramError + '_ {
        move |e| EngramError::TransportError(format!("{context}: {e}"))
    }
}

impl Storage for RemoteStorage {
    fn init(&self) -> Result<()> {
        // The remote service owns its own bootstrap; nothing to do
        // from the client side beyond a reachability check.
        self.request(reqwest::Method::GET, "/stats")
            .send()
            .map_err(Self::map_transport_err("init"))?;
        Ok(())
    }

    fn save_episode(&self, episode: &Episode) -> Result<()> {
        let resp = self
            .request(reqwest::Method::PUT, &format!("/episodes/{}", episode.id))
            .json(episode)
            .send()
            .map_err(Self::map_transport_err("save_episode"))?;
        if !resp.status().is_success() {
            return Err(EngramError::TransportError(format!(
                "save_episode: server returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    fn get_episode(&self, id: &str) -> Result<Option<Episode>> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/episodes/{id}"))
            .send()
            .map_err(Self::map_transport_err("get_episode"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(EngramError::TransportError(format!(
                "get_episode: server returned {}",
                resp.status()
            )));
        }
        let episode = resp
            .json()
            .map_err(|e| EngramError::Malformed(format!("get_episode response: {e}")))?;
        Ok(Some(episode))
    }

    fn delete_episode(&self, id: &str) -> Result<bool> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/episodes/{id}"))
            .send()
            .map_err(Self::map_transport_err("delete_episode"))?;
        match resp.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(EngramError::TransportError(format!(
                "delete_episode: server returned {other}"
            ))),
        }
    }

    fn get_all_episodes(&self) -> Result<Vec<Episode>> {
        let resp = self
            .request(reqwest::Method::GET, "/episodes")
            .send()
            .map_err(Self::map_transport_err("get_all_episodes"))?;
        resp.json()
            .map_err(|e| EngramError::Malformed(format!("get_all_episodes response: {e}")))
    }

    fn list_episode_ids(&self) -> Result<Vec<String>> {
        let resp = self
            .request(reqwest::Method::GET, "/episodes/ids")
            .send()
            .map_err(Self::map_transport_err("list_episode_ids"))?;
        resp.json()
            .map_err(|e| EngramError::Malformed(format!("list_episode_ids response: {e}")))
    }

    fn get_episodes_since(&self, since_ms: i64) -> Result<Vec<Episode>> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/episodes/since/{since_ms}"))
            .send()
            .map_err(Self::map_transport_err("get_episodes_since"))?;
        resp.json()
            .map_err(|e| EngramError::Malformed(format!("get_episodes_since response: {e}")))
    }

    fn add_to_tag_index(&self, episode: &Episode) -> Result<()> {
        for tag in &episode.tags {
            let resp = self
                .request(reqwest::Method::POST, &format!("/tags/{tag}"))
                .json(&serde_json::json!({ "id": episode.id }))
                .send()
                .map_err(Self::map_transport_err("add_to_tag_index"))?;
            if !resp.status().is_success() {
                return Err(EngramError::TransportError(format!(
                    "add_to_tag_index: server returned {}",
                    resp.status()
                )));
            }
        }
        Ok(())
    }

    fn remove_from_tag_index(&self, id: &str) -> Result<()> {
        // The wire protocol's delete targets a specific tag, so the
        // episode's own tag list (fetched before its body is removed)
        // tells us which `/tags/:tag/:id` calls to issue.
        let tags = match self.get_episode(id)? {
            Some(ep) => ep.tags,
            None => return Ok(()),
        };
        for tag in tags {
            let resp = self
                .request(reqwest::Method::DELETE, &format!("/tags/{tag}/{id}"))
                .send()
                .map_err(Self::map_transport_err("remove_from_tag_index"))?;
            if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
                return Err(EngramError::TransportError(format!(
                    "remove_from_tag_index: server returned {}",
                    resp.status()
                )));
            }
        }
        Ok(())
    }

    fn get_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/tags/{tag}"))
            .send()
            .map_err(Self::map_transport_err("get_by_tag"))?;
        resp.json()
            .map_err(|e| EngramError::Malformed(format!("get_by_tag response: {e}")))
    }

    fn get_stats(&self) -> Result<StorageStats> {
        let resp = self
            .request(reqwest::Method::GET, "/stats")
            .send()
            .map_err(Self::map_transport_err("get_stats"))?;
        resp.json()
            .map_err(|e| EngramError::Malformed(format!("get_stats response: {e}")))
    }
}

impl Bm25IndexStorage for RemoteStorage {
    fn load_bm25_index(&self) -> Result<Option<PersistedBm25Index>> {
        let resp = self
            .request(reqwest::Method::GET, "/index/bm25")
            .send()
            .map_err(Self::map_transport_err("load_bm25_index"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let index = resp
            .json()
            .map_err(|e| EngramError::Malformed(format!("load_bm25_index response: {e}")))?;
        Ok(Some(index))
    }

    fn save_bm25_index(&self, index: &PersistedBm25Index) -> Result<()> {
        let resp = self
            .request(reqwest::Method::PUT, "/index/bm25")
            .json(index)
            .send()
            .map_err(Self::map_transport_err("save_bm25_index"))?;
        if !resp.status().is_success() {
            return Err(EngramError::TransportError(format!(
                "save_bm25_index: server returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
