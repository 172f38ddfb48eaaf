// ⚙️ Categorizer configuration
// Every tunable (timeout, TTL, confidence gate, fallback) lives here and is
// handed to each component at construction.

use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Prefix for environment overrides (e.g. CATEGORIZER_CLASSIFIER_URL)
pub const ENV_PREFIX: &str = "CATEGORIZER_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizerConfig {
    /// Base URL of the classification oracle
    pub classifier_url: String,

    /// Upper bound for a single classifier call
    pub classifier_timeout_ms: u64,

    /// Lifetime of a merchant → category cache entry
    pub cache_ttl_secs: u64,

    /// Minimum classifier confidence for a result to be cached
    pub cache_write_threshold: f64,

    /// Category returned when the classifier is unavailable
    pub fallback_category_id: i64,
    pub fallback_category_name: String,
    pub fallback_confidence: f64,

    /// Currency used for batch rows without a currency column
    pub default_currency: String,

    /// Number of prior transactions sent to the classifier as context
    pub recent_context_size: usize,

    /// Rows categorized concurrently during batch ingestion
    pub batch_concurrency: usize,

    pub database_path: PathBuf,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        CategorizerConfig {
            classifier_url: "http://localhost:8000".to_string(),
            classifier_timeout_ms: 5000,
            cache_ttl_secs: 7 * 24 * 60 * 60,
            cache_write_threshold: 0.85,
            fallback_category_id: 15,
            fallback_category_name: "Others".to_string(),
            fallback_confidence: 0.5,
            default_currency: "INR".to_string(),
            recent_context_size: 5,
            batch_concurrency: 4,
            database_path: PathBuf::from("categorizer.db"),
        }
    }
}

impl CategorizerConfig {
    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: CategorizerConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by CATEGORIZER_* environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = CategorizerConfig::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CATEGORIZER_* overrides on top of the current values
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CLASSIFIER_URL") {
            self.classifier_url = v;
        }
        if let Some(v) = lookup("CLASSIFIER_TIMEOUT_MS") {
            self.classifier_timeout_ms = parse_var("CLASSIFIER_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_var("CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("CACHE_WRITE_THRESHOLD") {
            self.cache_write_threshold = parse_var("CACHE_WRITE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("FALLBACK_CATEGORY_ID") {
            self.fallback_category_id = parse_var("FALLBACK_CATEGORY_ID", &v)?;
        }
        if let Some(v) = lookup("FALLBACK_CATEGORY_NAME") {
            self.fallback_category_name = v;
        }
        if let Some(v) = lookup("DEFAULT_CURRENCY") {
            self.default_currency = v.trim().to_uppercase();
        }
        if let Some(v) = lookup("BATCH_CONCURRENCY") {
            self.batch_concurrency = parse_var("BATCH_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }

        debug!(classifier_url = %self.classifier_url, "Applied environment overrides");
        Ok(())
    }

    /// Reject settings the pipeline cannot honor
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.cache_write_threshold) {
            bail!(
                "cache_write_threshold must be within [0, 1], got {}",
                self.cache_write_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.fallback_confidence) {
            bail!(
                "fallback_confidence must be within [0, 1], got {}",
                self.fallback_confidence
            );
        }
        if self.classifier_timeout_ms == 0 {
            bail!("classifier_timeout_ms must be positive");
        }
        if self.batch_concurrency == 0 {
            bail!("batch_concurrency must be at least 1");
        }
        if self.default_currency.len() != 3
            || !self.default_currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            bail!(
                "default_currency must be a 3-letter code, got '{}'",
                self.default_currency
            );
        }
        Ok(())
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid {}{}='{}': {}", ENV_PREFIX, name, value, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = CategorizerConfig::default();

        assert_eq!(config.classifier_timeout(), Duration::from_millis(5000));
        assert_eq!(config.cache_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.cache_write_threshold, 0.85);
        assert_eq!(config.fallback_category_id, 15);
        assert_eq!(config.fallback_confidence, 0.5);
        assert_eq!(config.default_currency, "INR");
        assert!(config.fallback_confidence < config.cache_write_threshold);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"classifier_url": "http://ml:9000", "classifier_timeout_ms": 250}}"#
        )
        .unwrap();

        let config = CategorizerConfig::from_file(file.path()).unwrap();

        assert_eq!(config.classifier_url, "http://ml:9000");
        assert_eq!(config.classifier_timeout_ms, 250);
        assert_eq!(config.cache_ttl_secs, 604_800);
    }

    #[test]
    fn test_from_file_rejects_invalid_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cache_write_threshold": 1.5}}"#).unwrap();

        assert!(CategorizerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_overrides_are_applied_and_parsed() {
        let vars: HashMap<&str, &str> = [
            ("CLASSIFIER_TIMEOUT_MS", "1200"),
            ("DEFAULT_CURRENCY", " usd "),
            ("BATCH_CONCURRENCY", "8"),
        ]
        .into_iter()
        .collect();

        let mut config = CategorizerConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.classifier_timeout_ms, 1200);
        assert_eq!(config.default_currency, "USD");
        assert_eq!(config.batch_concurrency, 8);
    }

    #[test]
    fn test_unparseable_override_is_an_error() {
        let mut config = CategorizerConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "CACHE_TTL_SECS").then(|| "a week".to_string())
        });

        assert!(result.is_err());
    }
}
