//! Sync configuration.
//!
//! Loaded once at startup from `gallery-sync.toml` in the project root (or
//! the file passed with `--config`). The file is sparse: user values are
//! merged over stock defaults, so it only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! images_dir = "assets/images"   # parent of every gallery folder
//! catalog_dir = "json-files"     # where catalog JSON files are written
//! web_root = "assets/images/"    # prefix of every catalog `src`
//!
//! [watch]
//! quiescence_ms = 2000           # a file must be untouched this long
//!
//! [publish]
//! enabled = true
//! message_prefix = "Gallery Update"
//! # remote = "origin"
//! # branch = "main"
//! timeout_secs = 120
//! retry_stranded = true
//!
//! [[galleries]]
//! folder = "encaustic"
//! catalog = "encaustic-slideshow.json"
//! id_prefix = "encaustic"
//! ```
//!
//! A `[[galleries]]` list in the user file replaces the stock list entirely;
//! list order is the processing order of every pass.
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the project root when `--config` is not given.
pub const CONFIG_FILENAME: &str = "gallery-sync.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Directory holding one sub-folder per gallery, relative to the root.
    pub images_dir: String,
    /// Directory receiving the catalog files, relative to the root.
    pub catalog_dir: String,
    /// Web path prefix for catalog `src` values.
    pub web_root: String,
    /// Directory watcher settings.
    pub watch: WatchConfig,
    /// Publish (git add/commit/push) settings.
    pub publish: PublishConfig,
    /// Configured galleries, in processing order.
    pub galleries: Vec<GalleryEntry>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            images_dir: "assets/images".to_string(),
            catalog_dir: "json-files".to_string(),
            web_root: "assets/images/".to_string(),
            watch: WatchConfig::default(),
            publish: PublishConfig::default(),
            galleries: default_galleries(),
        }
    }
}

fn default_galleries() -> Vec<GalleryEntry> {
    [
        ("encaustic", "encaustic-slideshow.json", "encaustic"),
        ("drip-series", "drip-series-slideshow.json", "drip"),
        ("black-and-white", "black-and-white-slideshow.json", "bw"),
        ("project-series", "projects-slideshow.json", "proj"),
        ("decorative", "decorative-slideshow.json", "deco"),
        ("historic-preservation", "preservation-slideshow.json", "pres"),
    ]
    .into_iter()
    .map(|(folder, catalog, id_prefix)| GalleryEntry {
        folder: folder.to_string(),
        catalog: catalog.to_string(),
        id_prefix: id_prefix.to_string(),
    })
    .collect()
}

/// One `[[galleries]]` entry as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GalleryEntry {
    /// Folder name under `images_dir`; also the middle segment of `src`.
    pub folder: String,
    /// Catalog file name under `catalog_dir`.
    pub catalog: String,
    /// Prefix of newly minted entry ids.
    pub id_prefix: String,
}

/// Watcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Milliseconds a file must stay unmodified before a resync is requested.
    pub quiescence_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            quiescence_ms: 2000,
        }
    }
}

impl WatchConfig {
    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }
}

/// Publish settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// When false, catalogs are written but never committed or pushed.
    pub enabled: bool,
    /// Commit messages read `"<message_prefix>: <summary>"`.
    pub message_prefix: String,
    /// Remote to push to; git's default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Branch to push; git's default when absent. Requires `remote`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Upper bound for each git command.
    pub timeout_secs: u64,
    /// Re-attempt a failed publish on the next pass even without new changes.
    pub retry_stranded: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            message_prefix: "Gallery Update".to_string(),
            remote: None,
            branch: None,
            timeout_secs: 120,
            retry_stranded: true,
        }
    }
}

impl PublishConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A gallery with every path resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryConfig {
    pub folder: String,
    pub directory: PathBuf,
    pub catalog_path: PathBuf,
    pub id_prefix: String,
}

impl SyncConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.quiescence_ms == 0 {
            return Err(ConfigError::Validation(
                "watch.quiescence_ms must be greater than 0".into(),
            ));
        }
        if self.publish.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "publish.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.publish.branch.is_some() && self.publish.remote.is_none() {
            return Err(ConfigError::Validation(
                "publish.branch requires publish.remote".into(),
            ));
        }

        let mut folders = HashSet::new();
        let mut catalogs = HashSet::new();
        for g in &self.galleries {
            if g.folder.is_empty() || g.catalog.is_empty() || g.id_prefix.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "gallery {:?}: folder, catalog and id_prefix must be non-empty",
                    g.folder
                )));
            }
            if !is_single_component(&g.folder) {
                return Err(ConfigError::Validation(format!(
                    "gallery folder {:?} must be a single directory name",
                    g.folder
                )));
            }
            if !folders.insert(g.folder.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate gallery folder {:?}",
                    g.folder
                )));
            }
            if !catalogs.insert(g.catalog.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate catalog file {:?}",
                    g.catalog
                )));
            }
        }
        Ok(())
    }

    /// Galleries with directories and catalog paths resolved against `root`.
    pub fn resolve_galleries(&self, root: &Path) -> Vec<GalleryConfig> {
        let images = root.join(&self.images_dir);
        let catalogs = root.join(&self.catalog_dir);
        self.galleries
            .iter()
            .map(|g| GalleryConfig {
                folder: g.folder.clone(),
                directory: images.join(&g.folder),
                catalog_path: catalogs.join(&g.catalog),
                id_prefix: g.id_prefix.clone(),
            })
            .collect()
    }

    /// Absolute images directory (the watcher root).
    pub fn images_path(&self, root: &Path) -> PathBuf {
        root.join(&self.images_dir)
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SyncConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<SyncConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SyncConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration.
///
/// With an explicit `path` the file must exist. Otherwise
/// `<root>/gallery-sync.toml` is used when present, stock defaults when not.
pub fn load_config(root: &Path, path: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default_path = root.join(CONFIG_FILENAME);
            if !default_path.exists() {
                return resolve_config(None);
            }
            default_path
        }
    };
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Returns a fully-commented stock `gallery-sync.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# gallery-sync configuration
# ==========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory holding one sub-folder per gallery (relative to the project root).
images_dir = "assets/images"

# Directory the catalog JSON files are written to.
catalog_dir = "json-files"

# Prefix of every catalog `src`: <web_root><folder>/<filename>
web_root = "assets/images/"

# ---------------------------------------------------------------------------
# Directory watcher
# ---------------------------------------------------------------------------
[watch]
# A changed file must stay untouched this long (milliseconds) before a sync
# pass is requested. Protects against reading half-copied images.
quiescence_ms = 2000

# ---------------------------------------------------------------------------
# Publishing (git add, commit, push after catalogs change)
# ---------------------------------------------------------------------------
[publish]
enabled = true

# Commit message is "<message_prefix>: <summary>".
message_prefix = "Gallery Update"

# Push target. Omit to use the branch's upstream.
# remote = "origin"
# branch = "main"

# Each git command is killed after this many seconds.
timeout_secs = 120

# After a failed publish, try again on the next pass even if nothing new
# changed. Set to false to publish only when a pass detects new changes.
retry_stranded = true

# ---------------------------------------------------------------------------
# Galleries (a list here replaces the defaults entirely)
# ---------------------------------------------------------------------------
[[galleries]]
folder = "encaustic"
catalog = "encaustic-slideshow.json"
id_prefix = "encaustic"

[[galleries]]
folder = "drip-series"
catalog = "drip-series-slideshow.json"
id_prefix = "drip"

[[galleries]]
folder = "black-and-white"
catalog = "black-and-white-slideshow.json"
id_prefix = "bw"

[[galleries]]
folder = "project-series"
catalog = "projects-slideshow.json"
id_prefix = "proj"

[[galleries]]
folder = "decorative"
catalog = "decorative-slideshow.json"
id_prefix = "deco"

[[galleries]]
folder = "historic-preservation"
catalog = "preservation-slideshow.json"
id_prefix = "pres"
"##
}
