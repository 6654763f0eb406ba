//! Synonym expansion (C3): equivalence-class query expansion with
//! layered, additive loading. See spec §4.3 and §6.6.

use crate::error::{EngramError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Result of expanding a query against the synonym table.
#[derive(Debug, Clone, Default)]
pub struct SynonymExpansion {
    pub original: Vec<String>,
    pub expanded: Vec<String>,
}

/// Bidirectional equivalence-class lookup for query expansion.
///
/// Internally a flat `Vec` of groups (union-find-like, spec §3.2): a
/// new group that shares a phrase with an existing one is merged into
/// it rather than kept separate.
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    groups: Vec<Vec<String>>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Bundled default synonym groups (layer 1 of §4.3's load order).
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.load_defaults();
        table
    }

    pub fn load_defaults(&mut self) {
        for group in default_groups() {
            self.add_group(group);
        }
    }

    /// Add (merge) a synonym group. Groups with fewer than 2 distinct
    /// lowercased phrases are ignored.
    pub fn add_group(&mut self, phrases: Vec<String>) {
        let mut lowered: Vec<String> = Vec::new();
        for p in phrases {
            let p = p.trim().to_lowercase();
            if !p.is_empty() && !lowered.contains(&p) {
                lowered.push(p);
            }
        }
        if lowered.len() < 2 {
            return;
        }

        let mut merged_indices: Vec<usize> = Vec::new();
        for (i, g) in self.groups.iter().enumerate() {
            if g.iter().any(|p| lowered.contains(p)) {
                merged_indices.push(i);
            }
        }

        if merged_indices.is_empty() {
            self.groups.push(lowered);
            return;
        }

        let mut merged: Vec<String> = Vec::new();
        for &idx in &merged_indices {
            for p in &self.groups[idx] {
                if !merged.contains(p) {
                    merged.push(p.clone());
                }
            }
        }
        for p in lowered {
            if !merged.contains(&p) {
                merged.push(p);
            }
        }
        // remove merged groups highest-index-first to keep indices valid
        for &idx in merged_indices.iter().rev() {
            self.groups.remove(idx);
        }
        self.groups.push(merged);
    }

    /// Load a synonym file in the §6.6 format: `{"groups": [[...]]}` or
    /// a bare top-level array `[[...]]`. Missing files are not an
    /// error (layers are optional); malformed JSON is.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| EngramError::TransportError(format!("read synonyms file: {e}")))?;
        let value: serde_json::Value = serde_json::from_str(&data)
            .map_err(|e| EngramError::Malformed(format!("synonyms file: {e}")))?;

        let groups_value = match &value {
            serde_json::Value::Array(_) => &value,
            serde_json::Value::Object(map) => map.get("groups").ok_or_else(|| {
                EngramError::Malformed("synonyms file: missing \"groups\" key".to_string())
            })?,
            _ => {
                return Err(EngramError::Malformed(
                    "synonyms file: expected array or object".to_string(),
                ))
            }
        };

        let groups: Vec<Vec<String>> = serde_json::from_value(groups_value.clone())
            .map_err(|e| EngramError::Malformed(format!("synonyms file groups: {e}")))?;
        for g in groups {
            self.add_group(g);
        }
        Ok(())
    }

    /// Load from the `ENGRAM_SYNONYMS` environment variable if set
    /// (layer 2 of §4.3's load order).
    pub fn load_env_named(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("ENGRAM_SYNONYMS") {
            self.load_file(Path::new(&path))?;
        }
        Ok(())
    }

    fn derived_peers(&self) -> HashMap<String, HashSet<String>> {
        let mut peers: HashMap<String, HashSet<String>> = HashMap::new();
        for group in &self.groups {
            for phrase in group {
                let entry = peers.entry(phrase.clone()).or_default();
                for other in group {
                    if other != phrase {
                        entry.insert(other.clone());
                    }
                }
            }
        }
        peers
    }

    /// Expand `query` into original query words plus the individual
    /// words of every peer phrase whose group key matches a substring
    /// of the lowercased query (longest keys checked first).
    pub fn expand(&self, query: &str) -> SynonymExpansion {
        let lowered = query.to_lowercase();
        let original: HashSet<String> = lowered
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();

        let peers = self.derived_peers();
        let mut keys: Vec<&String> = peers.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut expanded: Vec<String> = Vec::new();
        for key in keys {
            if lowered.contains(key.as_str()) {
                if let Some(group_peers) = peers.get(key) {
                    for peer in group_peers {
                        for word in peer.split_whitespace() {
                            if !original.contains(word) && !expanded.iter().any(|w| w == word) {
                                expanded.push(word.to_string());
                            }
                        }
                    }
                }
            }
        }

        SynonymExpansion {
            original: original.into_iter().collect(),
            expanded,
        }
    }
}

fn default_groups() -> Vec<Vec<String>> {
    vec![
        vec!["fxrp".into(), "flare xrp".into()],
        vec!["dark mode".into(), "night mode".into()],
        vec!["gas fees".into(), "transaction fees".into()],
        vec!["bridging".into(), "cross-chain transfer".into()],
        vec!["position".into(), "allocation".into(), "holding".into()],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_bridges_domain_synonym() {
        let table = SynonymTable::with_defaults();
        let result = table.expand("FXRP allocation");
        assert!(result.expanded.iter().any(|w| w == "flare" || w == "xrp"));
    }

    #[test]
    fn groups_merge_on_overlap() {
        let mut table = SynonymTable::new();
        table.add_group(vec!["a".into(), "b".into()]);
        table.add_group(vec!["b".into(), "c".into()]);
        assert_eq!(table.groups.len(), 1);
        assert_eq!(table.groups[0].len(), 3);
    }

    #[test]
    fn groups_under_two_entries_are_ignored() {
        let mut table = SynonymTable::new();
        table.add_group(vec!["solo".into()]);
        assert!(table.groups.is_empty());
    }

    #[test]
    fn load_file_array_format() {
        let dir = std::env::temp_dir().join("engram_synonyms_test_array");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("syn.json");
        std::fs::write(&path, r#"[["alpha","beta"]]"#).unwrap();
        let mut table = SynonymTable::new();
        table.load_file(&path).unwrap();
        let result = table.expand("alpha test");
        assert!(result.expanded.iter().any(|w| w == "beta"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_file_groups_object_format() {
        let dir = std::env::temp_dir().join("engram_synonyms_test_obj");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("syn.json");
        std::fs::write(&path, r#"{"groups":[["gamma","delta"]]}"#).unwrap();
        let mut table = SynonymTable::new();
        table.load_file(&path).unwrap();
        let result = table.expand("gamma test");
        assert!(result.expanded.iter().any(|w| w == "delta"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
