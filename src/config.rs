//! Store-wide configuration: base path, agent identity, scoring
//! weights and encryption mode, builder-style like the query option
//! types elsewhere in this crate.

use std::path::{Path, PathBuf};

/// Clamp a weight parameter into `[0, 1]` at configuration time (spec
/// §7), logging so a caller who passes an out-of-range value finds out
/// without the resulting blend silently going wrong.
fn clamp_unit_interval(name: &str, value: f64) -> f64 {
    if !(0.0..=1.0).contains(&value) {
        tracing::warn!(name, value, "clamping weight into [0, 1]");
        value.clamp(0.0, 1.0)
    } else {
        value
    }
}

/// How (and whether) episode content is encrypted at rest.
#[derive(Debug, Clone, Default)]
pub enum EncryptionMode {
    #[default]
    Disabled,
    RawKey(String),
    Password(String),
    EnvVar(String),
    KeyFile(PathBuf),
}

/// Store-wide configuration. Construct with `EngramConfig::new(base_path,
/// agent_id)` and adjust fields with the builder methods; unset scoring
/// weights fall back to the defaults baked into `query::SearchOptions`.
#[derive(Debug, Clone)]
pub struct EngramConfig {
    pub base_path: PathBuf,
    pub agent_id: String,
    pub encryption: EncryptionMode,
    pub synonym_file: Option<PathBuf>,
    pub synonym_weight: f64,
    pub recency_lambda: f64,
    pub recency_weight: f64,
    pub prune_keep: usize,
    pub prune_max_age_days: f64,
    pub prune_min_importance: f32,
}

impl EngramConfig {
    pub fn new(base_path: impl Into<PathBuf>, agent_id: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            agent_id: agent_id.into(),
            encryption: EncryptionMode::Disabled,
            synonym_file: None,
            synonym_weight: 0.5,
            recency_lambda: 0.1,
            recency_weight: 0.3,
            prune_keep: 1000,
            prune_max_age_days: 90.0,
            prune_min_importance: 0.05,
        }
    }

    pub fn with_raw_key(mut self, hex_key: impl Into<String>) -> Self {
        self.encryption = EncryptionMode::RawKey(hex_key.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.encryption = EncryptionMode::Password(password.into());
        self
    }

    pub fn with_env_key(mut self, env_var: impl Into<String>) -> Self {
        self.encryption = EncryptionMode::EnvVar(env_var.into());
        self
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.encryption = EncryptionMode::KeyFile(path.into());
        self
    }

    pub fn with_synonym_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.synonym_file = Some(path.into());
        self
    }

    pub fn with_synonym_weight(mut self, weight: f64) -> Self {
        self.synonym_weight = clamp_unit_interval("synonym_weight", weight);
        self
    }

    pub fn with_recency(mut self, lambda: f64, weight: f64) -> Self {
        self.recency_lambda = lambda;
        self.recency_weight = clamp_unit_interval("recency_weight", weight);
        self
    }

    pub fn with_prune_policy(mut self, keep: usize, max_age_days: f64, min_importance: f32) -> Self {
        self.prune_keep = keep;
        self.prune_max_age_days = max_age_days;
        self.prune_min_importance = min_importance;
        self
    }

    pub fn key_path(&self) -> PathBuf {
        self.base_path.join("engram.key")
    }

    pub fn salt_path(&self) -> PathBuf {
        self.base_path.join("engram.salt")
    }

    pub fn synonym_store_path(&self) -> PathBuf {
        self.base_path.join("synonyms.json")
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let cfg = EngramConfig::new("/tmp/store", "agent-1")
            .with_recency(0.2, 0.4)
            .with_prune_policy(500, 30.0, 0.1);
        assert_eq!(cfg.recency_lambda, 0.2);
        assert_eq!(cfg.recency_weight, 0.4);
        assert_eq!(cfg.prune_keep, 500);
    }

    #[test]
    fn out_of_range_weights_are_clamped() {
        let cfg = EngramConfig::new("/tmp/store", "agent-1")
            .with_recency(0.2, 1.5)
            .with_synonym_weight(-0.3);
        assert_eq!(cfg.recency_weight, 1.0);
        assert_eq!(cfg.synonym_weight, 0.0);
    }

    #[test]
    fn key_path_is_under_base_path() {
        let cfg = EngramConfig::new("/tmp/store", "agent-1");
        assert_eq!(cfg.key_path(), Path::new("/tmp/store/engram.key"));
    }
}
