//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$POLICYMAIL_CONFIG` (environment variable)
//! 2. `~/.config/policymail/config.toml` (Linux/macOS)
//!    `%APPDATA%\policymail\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::Thresholds;
use crate::extract::{ExtractOptions, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_MAX_SCAN};
use crate::store::reader::DEFAULT_CACHE_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub extraction: ExtractionConfig,
    /// Classification decision thresholds.
    pub classification: Thresholds,
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Store directory used when `-o` is not given.
    pub output_dir: PathBuf,
}

/// Extraction tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Persisted messages between progress checkpoints.
    pub checkpoint_interval: usize,
    /// Upper bound of the indexed-scan count fallback.
    pub max_scan: usize,
}

/// Performance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Number of parsed message bodies kept by the store reader.
    pub lru_cache_size: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            max_scan: DEFAULT_MAX_SCAN,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            lru_cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl Config {
    /// Extraction options, a zero interval clamped to 1.
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            checkpoint_interval: self.extraction.checkpoint_interval.max(1),
            max_scan: self.extraction.max_scan,
        }
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from `path`, falling back to defaults on error.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("POLICYMAIL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("policymail").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("policymail")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("policymail.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.general.output_dir, PathBuf::from("output"));
        assert_eq!(cfg.extraction.checkpoint_interval, 10);
        assert_eq!(cfg.classification.primary_floor, 30);
        assert_eq!(cfg.performance.lru_cache_size, 50);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[extraction]
checkpoint_interval = 3

[classification]
quote_threshold = 50
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.extraction.checkpoint_interval, 3);
        assert_eq!(cfg.extraction.max_scan, 10_000);
        assert_eq!(cfg.classification.quote_threshold, 50);
        assert_eq!(cfg.classification.renewal_threshold, 40);
        assert_eq!(cfg.general.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[extraction\nnot toml").unwrap();
        assert_eq!(load_config_from(&path).extraction.checkpoint_interval, 10);
        assert_eq!(
            load_config_from(&tmp.path().join("missing.toml"))
                .performance
                .lru_cache_size,
            50
        );
    }

    #[test]
    fn test_zero_checkpoint_interval_is_clamped() {
        let mut cfg = Config::default();
        cfg.extraction.checkpoint_interval = 0;
        assert_eq!(cfg.extract_options().checkpoint_interval, 1);
    }
}
