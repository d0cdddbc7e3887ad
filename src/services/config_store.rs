// Configuration Storage Service
// Resolves settings from built-in defaults, the config file and environment variables,
// and handles config file read/write with version backup

use crate::models::{ConfidenceFactor, ConfidenceWeights};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const ENV_API_KEY: &str = "SONAR_API_KEY";
pub const ENV_API_URL: &str = "SONAR_API_URL";
const ENV_TIMEOUT: &str = "SONAR_TIMEOUT";
const ENV_MAX_RETRIES: &str = "SONAR_MAX_RETRIES";
const ENV_RETRY_DELAY: &str = "SONAR_RETRY_DELAY";
const ENV_RETRY_JITTER: &str = "SONAR_RETRY_JITTER";
const ENV_ANALYSIS_RETRY_DELAY: &str = "ANALYSIS_RETRY_DELAY";
const ENV_VERIFIED_THRESHOLD: &str = "VERIFIED_THRESHOLD";

const WEIGHT_ENV_KEYS: [(ConfidenceFactor, &str); 5] = [
    (ConfidenceFactor::FactCheck, "CONFIDENCE_WEIGHT_FACT_CHECK"),
    (ConfidenceFactor::TrustChain, "CONFIDENCE_WEIGHT_TRUST_CHAIN"),
    (ConfidenceFactor::Socratic, "CONFIDENCE_WEIGHT_SOCRATIC"),
    (ConfidenceFactor::SourceReliability, "CONFIDENCE_WEIGHT_SOURCE"),
    (ConfidenceFactor::EvidenceConsistency, "CONFIDENCE_WEIGHT_CONSISTENCY"),
];

const MAX_BACKUPS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
}

/// Connection and retry settings for the completion service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_jitter(&self) -> Duration {
        Duration::from_millis(self.retry_jitter_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Pause before each sequential retry of a failed method
    #[serde(default = "default_method_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_quick_model")]
    pub quick_model: String,
    #[serde(default = "default_detailed_model")]
    pub detailed_model: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_method_retry_delay_ms(),
            quick_model: default_quick_model(),
            detailed_model: default_detailed_model(),
        }
    }
}

impl AnalysisConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceConfig {
    #[serde(default)]
    pub weights: ConfidenceWeights,
    #[serde(default = "default_verified_threshold")]
    pub verified_threshold: f64,
}

impl ConfidenceConfig {
    /// Clamp the threshold into [0, 1]; a non-finite value falls back to the default
    pub fn normalize_threshold(&mut self) {
        let t = self.verified_threshold;
        self.verified_threshold = if t.is_finite() {
            t.clamp(0.0, 1.0)
        } else {
            default_verified_threshold()
        };
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default(),
            verified_threshold: default_verified_threshold(),
        }
    }
}

fn default_timeout_ms() -> u64 { 30_000 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_base_delay_ms() -> u64 { 1_000 }
fn default_retry_jitter_ms() -> u64 { 1_000 }
fn default_method_retry_delay_ms() -> u64 { 1_000 }
fn default_quick_model() -> String { "sonar".to_string() }
fn default_detailed_model() -> String { "sonar-pro".to_string() }
fn default_verified_threshold() -> f64 { 0.7 }

impl AppConfig {
    /// Defaults, then the config file (when a store is given), then the process environment
    pub fn resolve(store: Option<&ConfigStore>) -> Result<Self, String> {
        let mut config = match store {
            Some(store) => store.load()?,
            None => AppConfig::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Apply environment-style key/value overrides. Blank values are skipped and
    /// unparsable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = read(ENV_API_KEY) {
            self.api.api_key = Some(v);
        }
        if let Some(v) = read(ENV_API_URL) {
            self.api.base_url = Some(v);
        }
        if let Some(v) = read(ENV_TIMEOUT).and_then(|v| parse_value(ENV_TIMEOUT, &v)) {
            self.api.timeout_ms = v;
        }
        if let Some(v) = read(ENV_MAX_RETRIES).and_then(|v| parse_value(ENV_MAX_RETRIES, &v)) {
            self.api.max_retries = v;
        }
        if let Some(v) = read(ENV_RETRY_DELAY).and_then(|v| parse_value(ENV_RETRY_DELAY, &v)) {
            self.api.retry_base_delay_ms = v;
        }
        if let Some(v) = read(ENV_RETRY_JITTER).and_then(|v| parse_value(ENV_RETRY_JITTER, &v)) {
            self.api.retry_jitter_ms = v;
        }
        if let Some(v) = read(ENV_ANALYSIS_RETRY_DELAY)
            .and_then(|v| parse_value(ENV_ANALYSIS_RETRY_DELAY, &v))
        {
            self.analysis.retry_delay_ms = v;
        }
        if let Some(v) = read(ENV_VERIFIED_THRESHOLD)
            .and_then(|v| parse_value::<f64>(ENV_VERIFIED_THRESHOLD, &v))
            .filter(|v| v.is_finite())
        {
            self.confidence.verified_threshold = v.clamp(0.0, 1.0);
        }

        for (factor, key) in WEIGHT_ENV_KEYS {
            if let Some(v) = read(key).and_then(|v| parse_value::<f64>(key, &v)) {
                self.confidence.weights.set(factor, v);
            }
        }
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("[CONFIG] Ignoring unparsable value for {}: {:?}", key, raw);
            None
        }
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("truthTracer"))
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        let mut config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.confidence.normalize_threshold();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    fn backup_dir(&self) -> PathBuf {
        self.config_dir.join("backups")
    }

    /// Create a backup of current config
    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.backup_dir();
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        self.cleanup_old_backups(&backup_dir, MAX_BACKUPS)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Names embed the timestamp, so lexical order is age order
        entries.sort_by_key(|e| e.file_name());

        for entry in entries.iter().take(entries.len() - keep) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.api.max_retries, 3);
        assert_eq!(config.api.retry_base_delay_ms, 1_000);
        assert_eq!(config.analysis.retry_delay_ms, 1_000);
        assert_eq!(config.confidence.verified_threshold, 0.7);
        assert_eq!(
            config.confidence.weights.get(ConfidenceFactor::FactCheck),
            Some(0.4)
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup_from(&[
            ("SONAR_API_KEY", " secret "),
            ("SONAR_API_URL", "https://api.example.com"),
            ("SONAR_TIMEOUT", "5000"),
            ("SONAR_MAX_RETRIES", "not-a-number"),
            ("CONFIDENCE_WEIGHT_SOURCE", "0.15"),
            ("CONFIDENCE_WEIGHT_SOCRATIC", "2.0"),
            ("VERIFIED_THRESHOLD", "0.8"),
        ]));

        assert_eq!(config.api.api_key.as_deref(), Some("secret"));
        assert_eq!(config.api.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.api.timeout_ms, 5000);
        assert_eq!(config.api.max_retries, 3);
        assert_eq!(
            config.confidence.weights.get(ConfidenceFactor::SourceReliability),
            Some(0.15)
        );
        assert_eq!(
            config.confidence.weights.get(ConfidenceFactor::Socratic),
            Some(1.0)
        );
        assert_eq!(config.confidence.verified_threshold, 0.8);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup_from(&[("SONAR_API_KEY", "   ")]));
        assert!(config.api.api_key.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let json = r#"{"version":"1.0.0","api":{"baseUrl":"https://x"},"confidence":{"weights":{"factCheck":0.5}}}"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.version, "1.0.0");
        assert_eq!(parsed.api.base_url.as_deref(), Some("https://x"));
        assert_eq!(parsed.api.timeout_ms, 30_000);
        assert_eq!(
            parsed.confidence.weights.get(ConfidenceFactor::FactCheck),
            Some(0.5)
        );
        assert_eq!(parsed.confidence.weights.get(ConfidenceFactor::TrustChain), None);
        assert_eq!(parsed.confidence.verified_threshold, 0.7);
    }

    #[test]
    fn test_store_save_load_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());

        assert!(store.load().unwrap().api.api_key.is_none());

        let mut config = AppConfig::default();
        config.api.api_key = Some("first".to_string());
        store.save(&config).unwrap();

        config.api.base_url = Some("https://api.example.com".to_string());
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.api.api_key.as_deref(), Some("first"));
        assert_eq!(loaded.api.base_url.as_deref(), Some("https://api.example.com"));

        let backups = fs::read_dir(dir.path().join("backups")).unwrap().count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_config_file_weights_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"confidence":{"weights":{"factCheck":5.0,"trustChain":-0.9,"socratic":0.3},"verifiedThreshold":3.0}}"#,
        )
        .unwrap();

        let config = ConfigStore::new(dir.path().to_path_buf()).load().unwrap();
        let weights = &config.confidence.weights;
        assert_eq!(weights.get(ConfidenceFactor::FactCheck), Some(1.0));
        assert_eq!(weights.get(ConfidenceFactor::TrustChain), Some(0.0));
        assert_eq!(weights.get(ConfidenceFactor::Socratic), Some(0.3));
        assert_eq!(config.confidence.verified_threshold, 1.0);
    }
}
