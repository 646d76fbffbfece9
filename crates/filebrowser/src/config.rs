//! Configuration management for the file browser.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/filebrowser/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use protocol::{FileCategory, SortField, SortKey, SortOrder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::browser::{default_select_formats, ListingSettings, DEFAULT_PAGE_SIZE};
use crate::files::category::{default_extensions, ExtensionTable};
use crate::files::sanitize::{
    is_valid_substitute, NameSanitizer, DEFAULT_ALLOWED_PATTERN, DEFAULT_SUBSTITUTE,
};
use crate::files::storage::DEFAULT_DIR_MODE;
use crate::files::versions::{VersionSet, DEFAULT_VERSIONS};

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_size must be greater than 0, got {0}")]
    InvalidMaxSize(u64),

    #[error("list_per_page must be between 1 and 10000, got {0}")]
    InvalidPageSize(usize),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("{field} is not a valid pattern ({pattern}): {reason}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        reason: String,
    },

    #[error("substitute must be non-empty and free of unsafe characters, got {0:?}")]
    InvalidSubstitute(String),

    #[error("unknown category in {field}: {label}")]
    UnknownCategory { field: &'static str, label: String },

    #[error("version names must be non-empty and free of unsafe characters, got {0:?}")]
    InvalidVersionName(String),

    #[error("root directory {path} is not usable: {reason}")]
    InvalidRoot { path: String, reason: String },
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest accepted page size.
const MAX_PAGE_SIZE: usize = 10_000;

/// Main configuration structure for the file browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,

    /// Where the files live.
    pub storage: StorageConfig,

    /// Directory listing behaviour.
    pub listing: ListingConfig,

    /// Name sanitization.
    pub names: NamesConfig,

    /// Upload limits.
    pub upload: UploadConfig,

    /// Category label to extension list.
    pub extensions: BTreeMap<String, Vec<String>>,

    /// Selection type to category labels.
    pub select_formats: BTreeMap<String, Vec<String>>,

    /// Image versions.
    pub versions: VersionsConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory; nothing outside it is ever touched.
    pub root: PathBuf,

    /// Mode for created folders (Unix only).
    pub dir_mode: u32,
}

/// Listing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListingConfig {
    /// Regular expressions; matching names are hidden.
    pub exclude: Vec<String>,

    /// List files whose extension is not in the extension table.
    pub show_unknown: bool,

    /// Entries per page.
    pub list_per_page: usize,

    /// Sort field when a request names none.
    pub default_sort_by: SortField,

    /// Sort order when a request names none.
    pub default_sort_order: SortOrder,
}

/// Name sanitization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NamesConfig {
    /// Names must match this pattern.
    pub allowed_pattern: String,

    /// Replacement for filesystem-unsafe characters.
    pub substitute: String,

    /// Replace spaces with underscores.
    pub convert_spaces: bool,

    /// Lowercase names.
    pub lowercase: bool,
}

/// Upload settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum upload size in bytes (default: 10MB).
    pub max_size: u64,
}

/// Image version settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VersionsConfig {
    /// Version names, e.g. `thumbnail` for `photo_thumbnail.jpg`.
    pub names: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            storage: StorageConfig::default(),
            listing: ListingConfig::default(),
            names: NamesConfig::default(),
            upload: UploadConfig::default(),
            extensions: default_extensions(),
            select_formats: default_select_format_labels(),
            versions: VersionsConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            dir_mode: DEFAULT_DIR_MODE,
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            show_unknown: true,
            list_per_page: DEFAULT_PAGE_SIZE,
            default_sort_by: SortField::Date,
            default_sort_order: SortOrder::Descending,
        }
    }
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            allowed_pattern: DEFAULT_ALLOWED_PATTERN.to_string(),
            substitute: DEFAULT_SUBSTITUTE.to_string(),
            convert_spaces: false,
            lowercase: false,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            names: DEFAULT_VERSIONS.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filebrowser")
        .join("config.toml")
}

/// Returns the default root directory.
fn default_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filebrowser")
        .join("uploads")
}

fn default_select_format_labels() -> BTreeMap<String, Vec<String>> {
    default_select_formats()
        .into_iter()
        .map(|(kind, categories)| {
            (
                kind,
                categories.iter().map(|c| c.label().to_string()).collect(),
            )
        })
        .collect()
}

fn compile(field: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        field,
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEBROWSER_ROOT: Override the root directory
    /// - FILEBROWSER_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("FILEBROWSER_ROOT") {
            if !root.is_empty() {
                tracing::info!("Overriding root from environment: {}", root);
                self.storage.root = PathBuf::from(root);
            }
        }

        if let Ok(level) = std::env::var("FILEBROWSER_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.general.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// The root directory is checked when the file manager is built, not
    /// here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.general.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.general.log_level.clone()));
        }

        if self.upload.max_size == 0 {
            return Err(ConfigError::InvalidMaxSize(self.upload.max_size));
        }

        let per_page = self.listing.list_per_page;
        if per_page < 1 || per_page > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize(per_page));
        }

        compile("allowed_pattern", &self.names.allowed_pattern)?;
        for pattern in &self.listing.exclude {
            compile("exclude", pattern)?;
        }

        if !is_valid_substitute(&self.names.substitute) {
            return Err(ConfigError::InvalidSubstitute(self.names.substitute.clone()));
        }

        for label in self.extensions.keys() {
            label
                .parse::<FileCategory>()
                .map_err(|_| ConfigError::UnknownCategory {
                    field: "extensions",
                    label: label.clone(),
                })?;
        }
        for label in self.select_formats.values().flatten() {
            label
                .parse::<FileCategory>()
                .map_err(|_| ConfigError::UnknownCategory {
                    field: "select_formats",
                    label: label.clone(),
                })?;
        }

        for name in &self.versions.names {
            if name.is_empty() || name.contains(['/', '\\', '.', '\0']) {
                return Err(ConfigError::InvalidVersionName(name.clone()));
            }
        }

        Ok(())
    }

    /// Extension table from `[extensions]`.
    pub fn extension_table(&self) -> ExtensionTable {
        ExtensionTable::from_labels(&self.extensions)
    }

    /// Image versions from `[versions]`.
    pub fn version_set(&self, table: &ExtensionTable) -> VersionSet {
        VersionSet::new(self.versions.names.clone(), table)
    }

    /// Name sanitizer from `[names]`.
    pub fn sanitizer(&self) -> Result<NameSanitizer, ConfigError> {
        let sanitizer = NameSanitizer::new(&self.names.allowed_pattern).map_err(|e| {
            ConfigError::InvalidPattern {
                field: "allowed_pattern",
                pattern: self.names.allowed_pattern.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(sanitizer
            .with_substitute(&self.names.substitute)
            .convert_spaces(self.names.convert_spaces)
            .lowercase(self.names.lowercase))
    }

    /// Listing settings from `[listing]` and `[select_formats]`, with one
    /// exclude pattern added per image version.
    pub fn listing_settings(&self, versions: &VersionSet) -> Result<ListingSettings, ConfigError> {
        let mut exclude = self
            .listing
            .exclude
            .iter()
            .map(|pattern| compile("exclude", pattern))
            .collect::<Result<Vec<_>, _>>()?;
        exclude.extend(
            versions
                .exclude_patterns()
                .map_err(|e| ConfigError::InvalidPattern {
                    field: "versions",
                    pattern: self.versions.names.join(", "),
                    reason: e.to_string(),
                })?,
        );

        let select_formats = self
            .select_formats
            .iter()
            .map(|(kind, labels)| {
                let categories = labels
                    .iter()
                    .filter_map(|label| label.parse::<FileCategory>().ok())
                    .collect();
                (kind.clone(), categories)
            })
            .collect();

        Ok(ListingSettings {
            exclude,
            show_unknown: self.listing.show_unknown,
            page_size: self.listing.list_per_page,
            default_sort: SortKey::new(
                self.listing.default_sort_by,
                self.listing.default_sort_order,
            ),
            select_formats,
        })
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
