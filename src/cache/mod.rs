//! Local employee cache with TTL-based staleness.
//!
//! This module provides:
//! - A SQLite record store with change notifications
//! - A stateless mapper between domain and persisted employees
//! - A preference store for the last cache time
//! - The [`EmployeeCache`] service tying them together

mod clock;
mod mapper;
mod prefs;
mod service;
mod storage;
mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use mapper::{EmployeeMapper, EmployeeRecord};
pub use prefs::{FilePreferences, MemoryPreferences};
pub use service::{EmployeeCache, EmployeeWatch, DEFAULT_EXPIRATION};
pub use storage::SqliteRecordStore;
pub use traits::{ChangeSet, PrefKey, PreferenceStore, RecordStore, Versioned};
