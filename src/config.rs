use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use staffcache::cache::DEFAULT_EXPIRATION;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
  /// SQLite database file (defaults to the data directory)
  pub database_path: Option<PathBuf>,
  /// Preference file holding the last cache time
  pub preferences_path: Option<PathBuf>,
  /// Milliseconds after the last cache time before the cache is stale
  pub expiration_ms: u64,
  /// Write logs here instead of stderr
  pub log_file: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_path: None,
      preferences_path: None,
      expiration_ms: DEFAULT_EXPIRATION.as_millis() as u64,
      log_file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./staffcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/staffcache/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("staffcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("staffcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file deserializes to null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  pub fn expiration(&self) -> Duration {
    Duration::from_millis(self.expiration_ms)
  }
}
