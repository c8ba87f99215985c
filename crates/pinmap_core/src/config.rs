//! Core runtime configuration.
//!
//! # Responsibility
//! - Load logging, storage and image-compression settings from a JSON file.
//! - Reject out-of-range values before any subsystem starts.
//!
//! # Invariants
//! - `CoreConfig::default()` always passes `validate()`.
//! - `PINMAP_DB_PATH`, when set and non-empty, overrides `db_path`.

use crate::assets::CompressionOptions;
use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable overriding the database path.
pub const DB_PATH_ENV: &str = "PINMAP_DB_PATH";
/// Database file name used when nothing else is configured.
pub const DEFAULT_DB_FILE_NAME: &str = "pinmap.sqlite3";

const MIN_MAX_DIMENSION: u32 = 64;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid { field: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Invalid { field, message } => write!(f, "invalid config `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCompressionConfig {
    pub enabled: bool,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageCompressionConfig {
    fn default() -> Self {
        let options = CompressionOptions::default();
        Self {
            enabled: true,
            max_dimension: options.max_dimension,
            jpeg_quality: options.jpeg_quality,
        }
    }
}

impl ImageCompressionConfig {
    /// Compression options, or `None` when compression is switched off.
    pub fn options(&self) -> Option<CompressionOptions> {
        self.enabled.then_some(CompressionOptions {
            max_dimension: self.max_dimension,
            jpeg_quality: self.jpeg_quality,
        })
    }
}

/// Settings shared by the FFI and CLI surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    /// Absolute directory for rolling logs; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub image_compression: ImageCompressionConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            db_path: None,
            image_compression: ImageCompressionConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(
            self.log_level.trim().to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "warning" | "error"
        ) {
            return Err(ConfigError::Invalid {
                field: "log_level",
                message: format!("unsupported level `{}`", self.log_level),
            });
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    field: "log_dir",
                    message: format!("must be absolute, got `{}`", dir.display()),
                });
            }
        }
        let compression = &self.image_compression;
        if compression.max_dimension < MIN_MAX_DIMENSION {
            return Err(ConfigError::Invalid {
                field: "image_compression.max_dimension",
                message: format!("must be at least {MIN_MAX_DIMENSION}"),
            });
        }
        if !(1..=100).contains(&compression.jpeg_quality) {
            return Err(ConfigError::Invalid {
                field: "image_compression.jpeg_quality",
                message: "must be within 1..=100".to_string(),
            });
        }
        Ok(())
    }

    /// Database path: env override, then config, then `fallback_dir/pinmap.sqlite3`.
    pub fn resolve_db_path(&self, fallback_dir: &Path) -> PathBuf {
        if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|value| !value.is_empty()) {
            return PathBuf::from(path);
        }
        self.db_path
            .clone()
            .unwrap_or_else(|| fallback_dir.join(DEFAULT_DB_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};

    #[test]
    fn default_config_is_valid() {
        CoreConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            CoreConfig::from_json(r#"{"image_compression":{"jpeg_quality":60}}"#).unwrap();
        assert_eq!(config.image_compression.jpeg_quality, 60);
        assert_eq!(config.image_compression.max_dimension, 1600);
        assert!(config.image_compression.enabled);
    }

    #[test]
    fn rejects_out_of_range_values() {
        for json in [
            r#"{"image_compression":{"jpeg_quality":0}}"#,
            r#"{"image_compression":{"max_dimension":10}}"#,
            r#"{"log_level":"loud"}"#,
            r#"{"log_dir":"relative/logs"}"#,
        ] {
            assert!(matches!(
                CoreConfig::from_json(json),
                Err(ConfigError::Invalid { .. })
            ));
        }
    }

    #[test]
    fn disabled_compression_has_no_options() {
        let config =
            CoreConfig::from_json(r#"{"image_compression":{"enabled":false}}"#).unwrap();
        assert!(config.image_compression.options().is_none());
    }
}
