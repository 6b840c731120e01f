//! Configuration file support for diagtree
//!
//! Reads from .diagtree/config.toml, found by walking up from the working
//! directory. A missing or malformed file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::export::EXPORT_FILE_NAME;
use crate::layout::LayoutConfig;
use crate::storage::DEFAULT_SLOT;

/// Project directory holding the config file and default data file
pub const CONFIG_DIR: &str = ".diagtree";
pub const CONFIG_FILE: &str = "config.toml";
const DEFAULT_DATA_FILE: &str = "elements.json";

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Diagram sizes and direction
    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub export: ExportConfig,

    /// Directory containing `.diagtree/`, when a config file was found
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

/// Where the element collection is kept
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Data file. Relative paths resolve against the project root.
    /// A `.db`, `.sqlite` or `.sqlite3` extension selects SQLite.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Slot name inside the backend
    #[serde(default = "default_slot")]
    pub slot: String,
}

fn default_slot() -> String {
    DEFAULT_SLOT.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            slot: default_slot(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExportConfig {
    /// Default file name for `export`
    #[serde(default = "default_export_name")]
    pub file_name: String,
}

fn default_export_name() -> String {
    EXPORT_FILE_NAME.to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: default_export_name(),
        }
    }
}

impl Config {
    /// Load config starting from the current directory
    pub fn load() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::load_from(&dir),
            Err(e) => {
                log::warn!("cannot read current directory ({}), using default config", e);
                Self::default()
            }
        }
    }

    /// Load config by walking up from `start`.
    /// Returns default config if no file exists or it cannot be parsed.
    pub fn load_from(start: &Path) -> Self {
        let Some(path) = Self::find_config_path(start) else {
            log::debug!("no {}/{} above {}", CONFIG_DIR, CONFIG_FILE, start.display());
            return Self {
                root: Some(start.to_path_buf()),
                ..Self::default()
            };
        };
        let root = path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf);

        let parsed = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|contents| toml::from_str::<Config>(&contents).map_err(|e| e.to_string()));

        match parsed {
            Ok(config) => {
                log::debug!("loaded config from {}", path.display());
                Self { root, ..config }
            }
            Err(e) => {
                log::warn!("ignoring {}: {}", path.display(), e);
                Self {
                    root,
                    ..Self::default()
                }
            }
        }
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path(start: &Path) -> Option<PathBuf> {
        let mut dir = start;
        loop {
            let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            dir = dir.parent()?;
        }
    }

    /// Resolved data file path
    pub fn data_path(&self) -> PathBuf {
        let root = self.root.clone().unwrap_or_default();
        match &self.storage.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => root.join(CONFIG_DIR).join(DEFAULT_DATA_FILE),
        }
    }

    /// Contents written by `diagtree init`
    pub fn template() -> String {
        format!(
            r#"# diagtree configuration

[storage]
# Data file, relative to this project. Use a .db extension for SQLite.
path = "{dir}/{file}"
slot = "{slot}"

[layout]
node_width = 220.0
node_height = 70.0
node_sep = 80.0
rank_sep = 100.0
# top-bottom or left-right
direction = "top-bottom"

[export]
file_name = "{export}"
"#,
            dir = CONFIG_DIR,
            file = DEFAULT_DATA_FILE,
            slot = DEFAULT_SLOT,
            export = EXPORT_FILE_NAME,
        )
    }
}
