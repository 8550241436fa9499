//! SQLite implementation of [`RecordStore`].

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use super::mapper::EmployeeRecord;
use super::traits::{ChangeSet, RecordStore, Versioned};
use crate::error::{Result, StorageError};
use crate::model::EmployeeId;

/// Buffered change notifications per subscriber before it starts lagging.
const CHANGE_CAPACITY: usize = 64;

/// Schema for the employee table.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS employees (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT,
    position TEXT,
    avatar_url TEXT
);
"#;

/// SQLite-backed employee record store.
pub struct SqliteRecordStore {
  conn: Mutex<Connection>,
  /// Committed upserts so far; only changed while `conn` is locked
  seq: AtomicU64,
  changes: broadcast::Sender<ChangeSet>,
}

impl SqliteRecordStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open the store at a specific database file.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let conn = Connection::open(path)?;
    tracing::info!(path = %path.display(), "opened employee cache database");
    Self::with_connection(conn)
  }

  /// Open a store that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("cache.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn.execute_batch(SCHEMA)?;
    let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
    Ok(Self {
      conn: Mutex::new(conn),
      seq: AtomicU64::new(0),
      changes,
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(StorageError::poisoned)
  }
}

/// Directory holding the cache database and preference file.
pub(crate) fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or(StorageError::NoDataDir)?;

  Ok(data_dir.join("staffcache"))
}

impl RecordStore for SqliteRecordStore {
  fn upsert_all(&self, records: &[EmployeeRecord]) -> Result<()> {
    if records.is_empty() {
      return Ok(());
    }

    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    {
      let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO employees (id, name, email, phone, position, avatar_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      )?;
      for record in records {
        stmt.execute(params![
          record.id,
          record.name,
          record.email,
          record.phone,
          record.position,
          record.avatar_url,
        ])?;
      }
    }
    tx.commit()?;

    // Bump and send under the lock so readers and messages agree on order
    let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
    let ids: Vec<EmployeeId> = records.iter().map(|r| r.id).collect();
    tracing::debug!(seq, count = ids.len(), "upserted employee records");
    // No receivers is fine
    let _ = self.changes.send(ChangeSet { seq, ids });
    drop(conn);

    Ok(())
  }

  fn fetch_all(&self) -> Result<Vec<EmployeeRecord>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare_cached(&format!(
      "SELECT {} FROM employees ORDER BY id",
      EmployeeRecord::COLUMNS
    ))?;

    let records = stmt
      .query_map([], EmployeeRecord::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
  }

  fn fetch_by_id(&self, id: EmployeeId) -> Result<Versioned<Option<EmployeeRecord>>> {
    let conn = self.lock()?;
    let seq = self.seq.load(Ordering::SeqCst);
    let mut stmt = conn.prepare_cached(&format!(
      "SELECT {} FROM employees WHERE id = ?1",
      EmployeeRecord::COLUMNS
    ))?;

    let value = stmt.query_row(params![id], EmployeeRecord::from_row).optional()?;
    Ok(Versioned { seq, value })
  }

  fn has_any(&self) -> Result<bool> {
    let conn = self.lock()?;
    let exists: bool = conn.query_row("SELECT EXISTS(SELECT 1 FROM employees)", [], |row| {
      row.get(0)
    })?;
    Ok(exists)
  }

  fn changes(&self) -> broadcast::Receiver<ChangeSet> {
    self.changes.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(id: EmployeeId, name: &str) -> EmployeeRecord {
    EmployeeRecord {
      id,
      name: name.to_string(),
      email: format!("{}@example.com", name.to_lowercase()),
      phone: None,
      position: None,
      avatar_url: None,
    }
  }

  #[test]
  fn test_empty_store() {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    assert!(!store.has_any().unwrap());
    assert!(store.fetch_all().unwrap().is_empty());
    assert_eq!(
      store.fetch_by_id(1).unwrap(),
      Versioned {
        seq: 0,
        value: None
      }
    );
  }

  #[test]
  fn test_upsert_overwrites_by_id() {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    store.upsert_all(&[record(1, "A"), record(2, "C")]).unwrap();
    store.upsert_all(&[record(1, "B")]).unwrap();

    let all = store.fetch_all().unwrap();
    assert_eq!(all, vec![record(1, "B"), record(2, "C")]);
    assert!(store.has_any().unwrap());
  }

  #[test]
  fn test_upsert_broadcasts_touched_ids() {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    let mut rx = store.changes();

    store.upsert_all(&[record(3, "X"), record(5, "Y")]).unwrap();
    assert_eq!(
      rx.try_recv().unwrap(),
      ChangeSet {
        seq: 1,
        ids: vec![3, 5]
      }
    );

    store.upsert_all(&[]).unwrap();
    assert!(rx.try_recv().is_err());

    store.upsert_all(&[record(3, "X")]).unwrap();
    assert_eq!(rx.try_recv().unwrap().seq, 2);
  }

  #[test]
  fn test_fetch_by_id_reports_sequence() {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    store.upsert_all(&[record(1, "A")]).unwrap();
    store.upsert_all(&[record(2, "B")]).unwrap();

    let read = store.fetch_by_id(1).unwrap();
    assert_eq!(read.seq, 2);
    assert_eq!(read.value, Some(record(1, "A")));
  }

  #[test]
  fn test_open_at_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let store = SqliteRecordStore::open_at(&path).unwrap();
      store.upsert_all(&[record(9, "Z")]).unwrap();
    }

    let store = SqliteRecordStore::open_at(&path).unwrap();
    assert_eq!(store.fetch_by_id(9).unwrap().value, Some(record(9, "Z")));
  }
}
