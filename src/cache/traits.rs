//! Narrow contracts the cache service depends on.

use tokio::sync::broadcast;

use super::mapper::EmployeeRecord;
use crate::error::Result;
use crate::model::EmployeeId;

/// One committed upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
  /// Upsert sequence number, increasing by one per committed upsert
  pub seq: u64,
  /// Ids the upsert touched
  pub ids: Vec<EmployeeId>,
}

/// A value read while the store was at upsert sequence `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
  pub seq: u64,
  pub value: T,
}

/// Structured store for persisted employee records.
///
/// All methods block; the cache service calls them from the blocking pool.
pub trait RecordStore: Send + Sync + 'static {
  /// Insert or overwrite records by primary key, atomically.
  fn upsert_all(&self, records: &[EmployeeRecord]) -> Result<()>;

  /// All records in the store's natural order.
  fn fetch_all(&self) -> Result<Vec<EmployeeRecord>>;

  /// A single record by primary key, tagged with the upsert sequence it was
  /// read under. Change messages with `seq` at or below it are already
  /// reflected in the result.
  fn fetch_by_id(&self, id: EmployeeId) -> Result<Versioned<Option<EmployeeRecord>>>;

  /// Whether at least one record exists.
  fn has_any(&self) -> Result<bool>;

  /// Subscribe to change notifications sent after each committed upsert.
  fn changes(&self) -> broadcast::Receiver<ChangeSet>;
}

/// Keys used in the preference store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefKey {
  /// Epoch milliseconds of the last cache write
  LastCache,
}

impl PrefKey {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::LastCache => "PREF_KEY_LAST_CACHE",
    }
  }
}

/// Key-value store that survives process restarts.
pub trait PreferenceStore: Send + Sync + 'static {
  fn get_i64(&self, key: PrefKey, default: i64) -> i64;

  fn set_i64(&self, key: PrefKey, value: i64) -> Result<()>;
}
