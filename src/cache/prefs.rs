//! Preference store backends.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::storage::data_dir;
use super::traits::{PrefKey, PreferenceStore};
use crate::error::{Result, StorageError};

/// Preferences persisted as a flat JSON object of integers.
pub struct FilePreferences {
  path: PathBuf,
  values: RwLock<BTreeMap<String, i64>>,
}

impl FilePreferences {
  /// Open the preference file at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open the preference file at `path`. A missing file is treated as empty.
  pub fn open_at(path: &Path) -> Result<Self> {
    let values: BTreeMap<String, i64> = match std::fs::read(path) {
      Ok(bytes) => serde_json::from_slice(&bytes)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(StorageError::io(path, e)),
    };

    Ok(Self {
      path: path.to_path_buf(),
      values: RwLock::new(values),
    })
  }

  pub fn default_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("preferences.json"))
  }

  /// Write the whole map through a temp file so readers never see a torn file.
  fn persist(&self, values: &BTreeMap<String, i64>) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let tmp = self.path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(values)?;
    std::fs::write(&tmp, bytes).map_err(|e| StorageError::io(&tmp, e))?;
    std::fs::rename(&tmp, &self.path).map_err(|e| StorageError::io(&self.path, e))?;
    Ok(())
  }
}

impl PreferenceStore for FilePreferences {
  fn get_i64(&self, key: PrefKey, default: i64) -> i64 {
    match self.values.read() {
      Ok(values) => values.get(key.as_str()).copied().unwrap_or(default),
      Err(e) => {
        tracing::warn!("preference lock poisoned, using default: {}", e);
        default
      }
    }
  }

  fn set_i64(&self, key: PrefKey, value: i64) -> Result<()> {
    let mut values = self.values.write().map_err(StorageError::poisoned)?;
    let mut updated = values.clone();
    updated.insert(key.as_str().to_string(), value);
    // Memory only changes once the file does
    self.persist(&updated)?;
    *values = updated;
    Ok(())
  }
}

/// Preferences kept in memory only.
#[derive(Default)]
pub struct MemoryPreferences {
  values: RwLock<HashMap<PrefKey, i64>>,
}

impl MemoryPreferences {
  pub fn new() -> Self {
    Self::default()
  }
}

impl PreferenceStore for MemoryPreferences {
  fn get_i64(&self, key: PrefKey, default: i64) -> i64 {
    self
      .values
      .read()
      .ok()
      .and_then(|values| values.get(&key).copied())
      .unwrap_or(default)
  }

  fn set_i64(&self, key: PrefKey, value: i64) -> Result<()> {
    self
      .values
      .write()
      .map_err(StorageError::poisoned)?
      .insert(key, value);
    Ok(())
  }
}
