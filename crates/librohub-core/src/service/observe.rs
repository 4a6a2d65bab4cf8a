// ── Call observation ──
//
// `Observed` wraps any data service and reports every call (table,
// operation, latency, outcome) to a `CallObserver`. The tracing observer
// feeds the log; the recording observer lets tests assert call order.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use librohub_api::{Filter, Query, Table};

use super::{ChangeSubscription, DataService, Operation, ServiceResult};

const DEFAULT_RECENT_CALLS: usize = 100;

/// One completed data service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub table: Table,
    pub operation: Operation,
    pub elapsed: Duration,
    /// Error text when the call failed.
    pub error: Option<String>,
}

impl CallRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Receives a record after every data service call.
pub trait CallObserver: Send + Sync + 'static {
    fn observe(&self, call: &CallRecord);
}

/// Logs each call at `debug`, failures at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn observe(&self, call: &CallRecord) {
        let elapsed_ms = u64::try_from(call.elapsed.as_millis()).unwrap_or(u64::MAX);
        match &call.error {
            None => debug!(table = %call.table, op = %call.operation, elapsed_ms, "data call"),
            Some(error) => {
                warn!(table = %call.table, op = %call.operation, elapsed_ms, error, "data call failed");
            }
        }
    }
}

/// Keeps the most recent calls in order. Clones share the log.
#[derive(Debug, Clone)]
pub struct RecordingObserver {
    capacity: usize,
    calls: Arc<Mutex<VecDeque<CallRecord>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RECENT_CALLS)
    }

    /// Keep at most `capacity` calls, dropping the oldest first.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            calls: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
        }
    }

    fn log(&self) -> MutexGuard<'_, VecDeque<CallRecord>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.log().iter().cloned().collect()
    }

    /// `(table, operation)` pairs in call order.
    pub fn sequence(&self) -> Vec<(Table, Operation)> {
        self.log().iter().map(|c| (c.table, c.operation)).collect()
    }

    pub fn clear(&self) {
        self.log().clear();
    }
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl CallObserver for RecordingObserver {
    fn observe(&self, call: &CallRecord) {
        let mut log = self.log();
        if log.len() == self.capacity {
            log.pop_front();
        }
        log.push_back(call.clone());
    }
}

/// A data service whose calls are reported to an observer.
#[derive(Clone)]
pub struct Observed<S, O> {
    inner: S,
    observer: O,
}

impl<S: DataService, O: CallObserver> Observed<S, O> {
    pub fn new(inner: S, observer: O) -> Self {
        Self { inner, observer }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    async fn timed<T>(
        &self,
        table: Table,
        operation: Operation,
        call: impl Future<Output = ServiceResult<T>>,
    ) -> ServiceResult<T> {
        let started = Instant::now();
        let result = call.await;
        self.observer.observe(&CallRecord {
            table,
            operation,
            elapsed: started.elapsed(),
            error: result.as_ref().err().map(ToString::to_string),
        });
        result
    }
}

impl<S: DataService, O: CallObserver> DataService for Observed<S, O> {
    async fn select(&self, query: &Query) -> ServiceResult<Vec<Value>> {
        self.timed(query.table, Operation::Select, self.inner.select(query))
            .await
    }

    async fn insert(&self, table: Table, row: &Value) -> ServiceResult<Vec<Value>> {
        self.timed(table, Operation::Insert, self.inner.insert(table, row))
            .await
    }

    async fn update(
        &self,
        table: Table,
        patch: &Value,
        filters: &[Filter],
    ) -> ServiceResult<Vec<Value>> {
        self.timed(table, Operation::Update, self.inner.update(table, patch, filters))
            .await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> ServiceResult<()> {
        self.timed(table, Operation::Delete, self.inner.delete(table, filters))
            .await
    }

    async fn subscribe(&self, table: Table) -> ServiceResult<ChangeSubscription> {
        self.timed(table, Operation::Subscribe, self.inner.subscribe(table))
            .await
    }

    async fn unsubscribe(&self, subscription: ChangeSubscription) {
        self.inner.unsubscribe(subscription).await;
    }
}
