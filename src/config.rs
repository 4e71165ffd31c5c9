//! Configuration file parser for `config.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::content::{PatternError, Substitutions};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One `body_replace` rule: a regex and its replacement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyReplacement {
    pub pattern: String,
    pub replacement: String,
}

/// Top-level converter configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for `*.xml` exports.
    pub source_dir: PathBuf,

    /// Root of the generated Markdown tree.
    pub build_dir: PathBuf,

    /// Whether `<img>` sources are downloaded next to the Markdown files.
    pub download_images: bool,

    /// Write every item at one level instead of nesting pages under parents.
    pub flat_output: bool,

    /// Post types that are parsed but never written.
    pub item_type_filter: BTreeSet<String>,

    /// Field/value pairs describing items to skip.
    ///
    /// Matches are only logged; no item is skipped because of this filter.
    pub item_field_filter: BTreeMap<String, String>,

    /// Regex rewrites applied to every body, in file order.
    ///
    /// Replacements use `regex` syntax: groups are `$1` or `${name}`, and a
    /// literal `$` is written `$$`. A `\1` backreference is copied as-is.
    #[serde(deserialize_with = "deserialize_replacements")]
    pub body_replace: Vec<BodyReplacement>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("wordpress-xml"),
            build_dir: PathBuf::from("build"),
            download_images: false,
            flat_output: false,
            item_type_filter: ["attachment", "nav_menu_item"]
                .into_iter()
                .map(String::from)
                .collect(),
            item_field_filter: BTreeMap::from([("status".to_string(), "draft".to_string())]),
            body_replace: Vec::new(),
        }
    }
}

/// Reads `body_replace` as a table while keeping the order the keys were written in.
fn deserialize_replacements<'de, D>(deserializer: D) -> Result<Vec<BodyReplacement>, D::Error>
where
    D: Deserializer<'de>,
{
    let table = toml::Table::deserialize(deserializer)?;
    table
        .into_iter()
        .map(|(pattern, value)| match value {
            toml::Value::String(replacement) => Ok(BodyReplacement {
                pattern,
                replacement,
            }),
            other => Err(serde::de::Error::custom(format!(
                "body_replace value for {:?} must be a string, found {}",
                pattern,
                other.type_str()
            ))),
        })
        .collect()
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "source_dir",
        "build_dir",
        "download_images",
        "flat_output",
        "item_type_filter",
        "item_field_filter",
        "body_replace",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            source_dir = %config.source_dir.display(),
            build_dir = %config.build_dir.display(),
            replacements = config.body_replace.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Compiles `body_replace` so bad patterns surface before any export is read.
    pub fn substitutions(&self) -> Result<Substitutions, ConfigError> {
        Ok(Substitutions::compile(&self.body_replace)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
