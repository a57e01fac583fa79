//! Configuration surface (§6): key bindings, file associations, display
//! options, behavior thresholds, cache tuning. Loaded from
//! `~/.tfm/config.toml` via `serde`+`toml` (A.4), overridable from the
//! CLI via `clap` the way the teacher wires its example binaries.

pub mod keymap;

use std::collections::HashMap;
use std::path::{Path as StdPath, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

pub use keymap::{Action, KeySpec, SelectionRequirement};

use crate::util::glob_match_ci;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Open,
    View,
    Edit,
}

/// One entry of the ordered file-association table (§6). `None` for an
/// action disables it for matching files even if an earlier/later entry
/// would otherwise provide one, since lookup stops at the first
/// *matching* entry regardless of which action fields it sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAssociation {
    pub patterns: Vec<String>,
    #[serde(default)]
    pub open: Option<Vec<String>>,
    #[serde(default)]
    pub view: Option<Vec<String>>,
    #[serde(default)]
    pub edit: Option<Vec<String>>,
}

impl FileAssociation {
    fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| glob_match_ci(p, name))
    }

    fn action_argv(&self, action: FileAction) -> Option<&[String]> {
        match action {
            FileAction::Open => self.open.as_deref(),
            FileAction::View => self.view.as_deref(),
            FileAction::Edit => self.edit.as_deref(),
        }
    }
}

/// First entry whose pattern matches `name` AND carries an argv for
/// `action` wins (§6: "Ordering is significant").
pub fn resolve_association<'a>(associations: &'a [FileAssociation], name: &str, action: FileAction) -> Option<&'a [String]> {
    associations.iter().find(|a| a.matches(name)).and_then(|a| a.action_argv(action))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub pane_ratio: f32,
    pub log_pane_ratio: f32,
    pub color_scheme: String,
    pub show_hidden_default: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        DisplayOptions { pane_ratio: 0.5, log_pane_ratio: 0.2, color_scheme: "default".to_string(), show_hidden_default: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorOptions {
    pub confirm_delete: bool,
    pub confirm_quit: bool,
    pub max_recent_directories: usize,
    pub max_history_entries: usize,
    pub max_search_results: usize,
    pub max_log_messages: usize,
}

impl Default for BehaviorOptions {
    fn default() -> Self {
        BehaviorOptions {
            confirm_delete: true,
            confirm_quit: false,
            max_recent_directories: 20,
            max_history_entries: 50,
            max_search_results: 10_000,
            max_log_messages: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheOptions {
    pub default_ttl_secs: u64,
    pub max_entries: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions { default_ttl_secs: 60, max_entries: 1000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Keyed by `Action::as_str()` rather than the enum directly, so the
    /// TOML table has plain string keys (`move_up = ["Up", "k"]`)
    /// instead of relying on enum-as-map-key serialization.
    #[serde(default = "keymap::default_bindings")]
    pub key_bindings: HashMap<String, Vec<KeySpec>>,
    #[serde(default)]
    pub file_associations: Vec<FileAssociation>,
    #[serde(default)]
    pub display: DisplayOptions,
    #[serde(default)]
    pub behavior: BehaviorOptions,
    #[serde(default)]
    pub cache: CacheOptions,
}

impl Config {
    /// Resolves the configured key specs for `action`, honoring a
    /// user's override while falling back to the built-in default if
    /// the action is absent from a partially-specified config file.
    pub fn keys_for(&self, action: Action) -> &[KeySpec] {
        self.key_bindings.get(action.as_str()).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            key_bindings: keymap::default_bindings(),
            file_associations: Vec::new(),
            display: DisplayOptions::default(),
            behavior: BehaviorOptions::default(),
            cache: CacheOptions::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Loads from `path`, falling back to built-in defaults if the file
    /// is absent (A.4); a present-but-unparseable file is still an
    /// error so a typo doesn't silently reset the user's config.
    pub fn load(path: &StdPath) -> Result<Config, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Config::from_toml_str(&contents).map_err(ConfigError::Parse),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    pub fn save(&self, path: &StdPath) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = self.to_toml_string().map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[source] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[source] toml::de::Error),
    #[error("could not serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
}

/// CLI overrides (A.4): `tfm [--config PATH] [--left DIR] [--right DIR]
/// [-v|-vv]`.
#[derive(Debug, Parser)]
#[command(name = "tfm", about = "Dual-pane terminal file manager")]
pub struct CliArgs {
    /// Path to an alternate config file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Initial directory for the left pane.
    #[arg(long, value_name = "DIR")]
    pub left: Option<PathBuf>,

    /// Initial directory for the right pane.
    #[arg(long, value_name = "DIR")]
    pub right: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CliArgs {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".tfm").join("config.toml")
}
