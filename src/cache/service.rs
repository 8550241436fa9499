//! Employee cache service orchestrating storage, mapping, and freshness.

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::clock::{Clock, SystemClock};
use super::mapper::EmployeeMapper;
use super::traits::{ChangeSet, PrefKey, PreferenceStore, RecordStore};
use crate::error::Result;
use crate::model::{Employee, EmployeeId};

/// Default time before the cache is considered stale (10 minutes).
pub const DEFAULT_EXPIRATION: Duration = Duration::from_millis(600_000);

/// Pending emissions a watch buffers before the producer waits.
const WATCH_BUFFER: usize = 16;

/// Persistence-backed substitute for a remote employee source.
///
/// Every operation that touches the record store or writes a preference runs
/// on the blocking pool of `runtime`; callers only await the result.
///
/// Saving does not update the last cache time. Callers that want the save to
/// count as a refresh call [`EmployeeCache::set_last_cache_time`] or
/// [`EmployeeCache::mark_fresh`] themselves.
pub struct EmployeeCache<S: RecordStore, P: PreferenceStore> {
  store: Arc<S>,
  mapper: EmployeeMapper,
  prefs: Arc<P>,
  runtime: Handle,
  clock: Arc<dyn Clock>,
  /// How long after the last cache time the data is stale
  expiration: Duration,
}

impl<S: RecordStore, P: PreferenceStore> EmployeeCache<S, P> {
  pub fn new(store: Arc<S>, mapper: EmployeeMapper, prefs: Arc<P>, runtime: Handle) -> Self {
    Self {
      store,
      mapper,
      prefs,
      runtime,
      clock: Arc::new(SystemClock),
      expiration: DEFAULT_EXPIRATION,
    }
  }

  /// Replace the time source used by expiration checks.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Set the time before cached data is considered stale.
  pub fn with_expiration(mut self, expiration: Duration) -> Self {
    self.expiration = expiration;
    self
  }

  /// Map and upsert all employees in one write.
  pub async fn save_employees(&self, employees: Vec<Employee>) -> Result<()> {
    let store = Arc::clone(&self.store);
    let mapper = self.mapper;
    tracing::debug!(count = employees.len(), "saving employees");

    self
      .dispatch(move || {
        let records: Vec<_> = employees.iter().map(|e| mapper.map_to_cached(e)).collect();
        store.upsert_all(&records)
      })
      .await
  }

  /// All cached employees as one batch, in storage order.
  pub async fn get_employees(&self) -> Result<Vec<Employee>> {
    let store = Arc::clone(&self.store);
    let mapper = self.mapper;

    self
      .dispatch(move || {
        let records = store.fetch_all()?;
        Ok(
          records
            .into_iter()
            .map(|r| mapper.map_from_cached(r))
            .collect(),
        )
      })
      .await
  }

  /// Observe the employee with `id`.
  ///
  /// The watch emits the current row if one exists, then again after each
  /// upsert touching `id`, even one that leaves the row unchanged. It never
  /// emits for a missing row.
  pub fn get_employee_by_id(&self, id: EmployeeId) -> EmployeeWatch {
    // Subscribe before the first read so no upsert falls between the two.
    let changes = self.store.changes();
    let (tx, rx) = mpsc::channel(WATCH_BUFFER);
    let task = self.runtime.spawn(watch_employee(
      Arc::clone(&self.store),
      self.mapper,
      self.runtime.clone(),
      id,
      changes,
      tx,
    ));

    EmployeeWatch {
      rx,
      task: Some(task),
    }
  }

  /// One-shot lookup of a single employee.
  pub async fn find_employee_by_id(&self, id: EmployeeId) -> Result<Option<Employee>> {
    let store = Arc::clone(&self.store);
    let mapper = self.mapper;

    self
      .dispatch(move || {
        Ok(
          store
            .fetch_by_id(id)?
            .value
            .map(|r| mapper.map_from_cached(r)),
        )
      })
      .await
  }

  /// Whether the store holds at least one employee.
  pub async fn is_cache(&self) -> Result<bool> {
    let store = Arc::clone(&self.store);
    self.dispatch(move || store.has_any()).await
  }

  /// Overwrite the last cache time (epoch milliseconds).
  pub async fn set_last_cache_time(&self, last_cache_time: i64) -> Result<()> {
    let prefs = Arc::clone(&self.prefs);
    self
      .dispatch(move || prefs.set_i64(PrefKey::LastCache, last_cache_time))
      .await?;
    tracing::info!(last_cache_time, "updated last cache time");
    Ok(())
  }

  /// Set the last cache time to now.
  pub async fn mark_fresh(&self) -> Result<()> {
    self.set_last_cache_time(self.clock.now_millis()).await
  }

  /// Last cache time in epoch milliseconds, 0 if never set.
  pub fn last_cache_time(&self) -> i64 {
    self.prefs.get_i64(PrefKey::LastCache, 0)
  }

  /// Whether more than the expiration has elapsed since the last cache time.
  pub fn is_expired(&self) -> bool {
    let elapsed = self.clock.now_millis().saturating_sub(self.last_cache_time());
    i128::from(elapsed) > self.expiration.as_millis() as i128
  }

  async fn dispatch<T, F>(&self, job: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
  {
    self.runtime.spawn_blocking(job).await?
  }
}

impl<S: RecordStore, P: PreferenceStore> Clone for EmployeeCache<S, P> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      mapper: self.mapper,
      prefs: Arc::clone(&self.prefs),
      runtime: self.runtime.clone(),
      clock: Arc::clone(&self.clock),
      expiration: self.expiration,
    }
  }
}

async fn watch_employee<S: RecordStore>(
  store: Arc<S>,
  mapper: EmployeeMapper,
  runtime: Handle,
  id: EmployeeId,
  mut changes: broadcast::Receiver<ChangeSet>,
  tx: mpsc::Sender<Result<Employee>>,
) {
  let mut refresh = true;
  // Upsert sequence the last read already reflects
  let mut seen: u64 = 0;

  loop {
    if refresh {
      let store = Arc::clone(&store);
      let found = match runtime.spawn_blocking(move || store.fetch_by_id(id)).await {
        Ok(found) => found,
        Err(e) => Err(e.into()),
      };

      let item = match found {
        Ok(read) => {
          seen = seen.max(read.seq);
          read.value.map(|r| Ok(mapper.map_from_cached(r)))
        }
        Err(e) => Some(Err(e)),
      };

      if let Some(item) = item {
        if tx.send(item).await.is_err() {
          // Watch dropped
          return;
        }
      }
    }

    tokio::select! {
      _ = tx.closed() => return,
      change = changes.recv() => {
        refresh = match change {
          Ok(change) => change.seq > seen && change.ids.contains(&id),
          Err(broadcast::error::RecvError::Lagged(skipped)) => {
            tracing::warn!(id, skipped, "employee watch lagged, re-reading row");
            true
          }
          Err(broadcast::error::RecvError::Closed) => return,
        };
      }
    }
  }
}

/// Live observation of one employee row.
///
/// Dropping the watch cancels it.
pub struct EmployeeWatch {
  rx: mpsc::Receiver<Result<Employee>>,
  task: Option<JoinHandle<()>>,
}

impl EmployeeWatch {
  /// Wait for the next emission. Returns `None` once cancelled.
  pub async fn next(&mut self) -> Option<Result<Employee>> {
    self.rx.recv().await
  }

  /// Stop further emissions, including any already buffered.
  pub fn cancel(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
    self.rx.close();
    while self.rx.try_recv().is_ok() {}
  }
}

impl Stream for EmployeeWatch {
  type Item = Result<Employee>;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.rx.poll_recv(cx)
  }
}

impl Drop for EmployeeWatch {
  fn drop(&mut self) {
    self.cancel();
  }
}
