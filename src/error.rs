//! Error type shared by every storage-facing operation.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Read or write failure against the record store or the preference store.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("Database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("Failed to access {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to (de)serialize preferences: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Lock poisoned: {0}")]
  LockPoisoned(String),

  #[error("Background storage job failed: {0}")]
  Worker(#[from] tokio::task::JoinError),

  #[error("Could not determine data directory")]
  NoDataDir,
}

impl StorageError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }

  pub(crate) fn poisoned<E: std::fmt::Display>(err: E) -> Self {
    Self::LockPoisoned(err.to_string())
  }
}
