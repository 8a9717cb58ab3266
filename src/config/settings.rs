//! Settings structures for the autosuggest service

use crate::suggest::Engine;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub suggest: SuggestSettings,
    pub cache: CacheSettings,
    pub ratelimit: RateLimitSettings,
    pub resilience: ResilienceSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with environment variables (AUTOSUGGEST_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_vars(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`; values that do not parse are logged and
    /// the current setting is kept.
    pub fn merge_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "AUTOSUGGEST_DEBUG", &mut self.general.debug);
        override_parsed(&lookup, "AUTOSUGGEST_PORT", &mut self.server.port);
        if let Some(val) = lookup("AUTOSUGGEST_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        override_parsed(&lookup, "AUTOSUGGEST_ENGINE", &mut self.suggest.engine);
        override_parsed(&lookup, "AUTOSUGGEST_CACHE_ENABLED", &mut self.cache.enabled);
        override_parsed(
            &lookup,
            "AUTOSUGGEST_DEFAULTS_ENABLED",
            &mut self.suggest.defaults_enabled,
        );
        override_parsed(&lookup, "AUTOSUGGEST_RATELIMIT_ENABLED", &mut self.ratelimit.enabled);
        if let Some(val) = lookup("AUTOSUGGEST_DB_PATH") {
            self.storage.path = PathBuf::from(val);
        }
    }
}

fn override_parsed<F, T>(lookup: &F, name: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(val) = lookup(name) {
        match val.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(e) => warn!("Ignoring {}={:?}: {}", name, val, e),
        }
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
    /// Instance name reported in logs
    pub instance_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            instance_name: "autosuggest".to_string(),
        }
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Dispatch settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestSettings {
    /// Backend answering every query, fixed for the process lifetime
    pub engine: Engine,
    /// Serve popularity-ranked defaults for short queries
    pub defaults_enabled: bool,
}

/// Suggestion cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Entry lifetime from write, in seconds
    pub ttl_secs: u64,
    pub max_entries: u64,
    pub prewarm: PrewarmSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 90,
            max_entries: 10_000,
            prewarm: PrewarmSettings::default(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Startup cache warming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrewarmSettings {
    pub enabled: bool,
    /// Length of prefixes derived from the corpus
    pub prefix_len: usize,
    /// How many derived prefixes to warm
    pub top: usize,
    /// Explicit prefixes; when set, nothing is derived from the corpus
    pub prefixes: Vec<String>,
}

impl Default for PrewarmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix_len: 3,
            top: 50,
            prefixes: Vec::new(),
        }
    }
}

/// Rate governor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Requests admitted per window per client
    pub capacity: u32,
    pub window_ms: u64,
    /// Bound on tracked client windows
    pub max_clients: u64,
    /// Seconds after which an idle client's window is dropped
    pub idle_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 50,
            window_ms: 1000,
            max_clients: 100_000,
            idle_secs: 300,
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

/// Backend failure isolation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub enabled: bool,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Seconds the circuit stays open
    pub open_secs: u64,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 2000,
            failure_threshold: 5,
            open_secs: 30,
        }
    }
}

impl ResilienceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn open_for(&self) -> Duration {
        Duration::from_secs(self.open_secs)
    }
}

/// Storage backend kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// SQLite database file
    pub path: PathBuf,
    pub max_connections: u32,
    /// Create and maintain the FTS index and its sync triggers
    pub manage_fts: bool,
    /// Names file loaded into an empty store at startup
    pub seed_file: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: PathBuf::from("autosuggest.db"),
            max_connections: 5,
            manage_fts: true,
            seed_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.suggest.engine, Engine::PatternMatch);
        assert!(!settings.suggest.defaults_enabled);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.ttl(), Duration::from_secs(90));
        assert_eq!(settings.cache.max_entries, 10_000);
        assert!(!settings.ratelimit.enabled);
        assert_eq!(settings.ratelimit.capacity, 50);
        assert_eq!(settings.ratelimit.window(), Duration::from_secs(1));
        assert_eq!(settings.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
suggest:
  engine: sqlite-fts
  defaults_enabled: true
cache:
  ttl_secs: 30
  prewarm:
    enabled: true
    prefixes: [mic, mac]
storage:
  backend: memory
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.suggest.engine, Engine::InvertedIndex);
        assert!(settings.suggest.defaults_enabled);
        assert_eq!(settings.cache.ttl_secs, 30);
        assert_eq!(settings.cache.max_entries, 10_000);
        assert_eq!(settings.cache.prewarm.prefixes, vec!["mic", "mac"]);
        assert_eq!(settings.cache.prewarm.prefix_len, 3);
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn test_unknown_engine_rejected() {
        let yaml = "suggest:\n  engine: elastic\n";
        assert!(Settings::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("AUTOSUGGEST_PORT", "9090"),
            ("AUTOSUGGEST_ENGINE", "oracle-text"),
            ("AUTOSUGGEST_RATELIMIT_ENABLED", "true"),
            ("AUTOSUGGEST_DB_PATH", "/tmp/names.db"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.merge_vars(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.suggest.engine, Engine::CommercialText);
        assert!(settings.ratelimit.enabled);
        assert_eq!(settings.storage.path, PathBuf::from("/tmp/names.db"));
    }

    #[test]
    fn test_bad_env_override_keeps_value() {
        let mut settings = Settings::default();
        settings.merge_vars(|name| match name {
            "AUTOSUGGEST_PORT" => Some("not-a-port".to_string()),
            "AUTOSUGGEST_ENGINE" => Some("elastic".to_string()),
            _ => None,
        });
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.suggest.engine, Engine::PatternMatch);
    }
}
