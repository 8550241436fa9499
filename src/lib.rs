//! Local employee cache backed by SQLite, with a TTL-based staleness check.
//!
//! The [`cache::EmployeeCache`] service is the entry point: it stores employees
//! through a [`cache::RecordStore`], converts them with [`cache::EmployeeMapper`],
//! and tracks the last cache time in a [`cache::PreferenceStore`].

pub mod cache;
pub mod error;
pub mod model;

pub use error::{Result, StorageError};
pub use model::{Employee, EmployeeId};
