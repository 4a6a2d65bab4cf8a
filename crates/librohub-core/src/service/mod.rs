// ── Data service abstraction ──
//
// The remote store behind the mirror. Rows travel as JSON values shaped
// by the `librohub_api` query vocabulary, so the hosted backend and the
// in-memory backend answer exactly the same questions.

mod memory;
mod observe;
mod rest;

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use strum::Display;
use tokio::sync::broadcast;
use tracing::warn;

use librohub_api::{ChangeEvent, Filter, Query, RealtimeHandle, Table};

pub use memory::{InjectedFailure, MemoryService};
pub use observe::{CallObserver, CallRecord, Observed, RecordingObserver, TracingObserver};
pub use rest::RemoteService;

/// Result type for data service calls.
pub type ServiceResult<T> = Result<T, librohub_api::Error>;

/// Data service operation, used for observation and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Subscribe,
}

/// Table-level access to the remote store plus change subscriptions.
///
/// Implementations must be cheap to share across tasks; the library
/// holds one instance for its lifetime and calls it concurrently.
pub trait DataService: Send + Sync + 'static {
    /// Rows matching `query`, with requested embeds resolved.
    fn select(&self, query: &Query) -> impl Future<Output = ServiceResult<Vec<Value>>> + Send;

    /// Insert one row, returning the stored representation.
    fn insert(
        &self,
        table: Table,
        row: &Value,
    ) -> impl Future<Output = ServiceResult<Vec<Value>>> + Send;

    /// Patch every row matching `filters`, returning the updated rows.
    fn update(
        &self,
        table: Table,
        patch: &Value,
        filters: &[Filter],
    ) -> impl Future<Output = ServiceResult<Vec<Value>>> + Send;

    /// Delete every row matching `filters`.
    fn delete(
        &self,
        table: Table,
        filters: &[Filter],
    ) -> impl Future<Output = ServiceResult<()>> + Send;

    /// Start receiving row changes for `table`.
    fn subscribe(&self, table: Table)
    -> impl Future<Output = ServiceResult<ChangeSubscription>> + Send;

    /// Stop a subscription and release its resources.
    fn unsubscribe(&self, subscription: ChangeSubscription) -> impl Future<Output = ()> + Send {
        subscription.close()
    }
}

// ── Change subscriptions ────────────────────────────────────────────

/// What a subscription yields: a row change, or a note that some were
/// dropped because the consumer fell behind.
#[derive(Debug, Clone)]
pub enum ChangeNotice {
    Changed(Arc<ChangeEvent>),
    Missed(u64),
}

/// An open change feed for one table.
pub struct ChangeSubscription {
    table: Table,
    receiver: broadcast::Receiver<Arc<ChangeEvent>>,
    realtime: Option<RealtimeHandle>,
}

impl ChangeSubscription {
    /// Feed backed by an in-process broadcast; events for other tables are skipped.
    pub fn local(table: Table, receiver: broadcast::Receiver<Arc<ChangeEvent>>) -> Self {
        Self {
            table,
            receiver,
            realtime: None,
        }
    }

    /// Feed backed by a realtime channel; closing it leaves the channel.
    pub fn realtime(table: Table, handle: RealtimeHandle) -> Self {
        Self {
            table,
            receiver: handle.subscribe(),
            realtime: Some(handle),
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Next change for this table. `None` once the feed has ended.
    pub async fn recv(&mut self) -> Option<ChangeNotice> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.table == self.table => {
                    return Some(ChangeNotice::Changed(event));
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(table = %self.table, skipped = n, "change feed lagged");
                    return Some(ChangeNotice::Missed(n));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Leave the channel (if any) and wait for its task to finish.
    pub async fn close(self) {
        if let Some(handle) = self.realtime {
            handle.close().await;
        }
    }
}

// ── Backend selection ───────────────────────────────────────────────

/// Either backend behind one concrete type, for front-ends that pick at
/// runtime.
#[derive(Clone)]
pub enum Backend {
    Remote(RemoteService),
    Memory(MemoryService),
}

impl DataService for Backend {
    async fn select(&self, query: &Query) -> ServiceResult<Vec<Value>> {
        match self {
            Self::Remote(s) => s.select(query).await,
            Self::Memory(s) => s.select(query).await,
        }
    }

    async fn insert(&self, table: Table, row: &Value) -> ServiceResult<Vec<Value>> {
        match self {
            Self::Remote(s) => s.insert(table, row).await,
            Self::Memory(s) => s.insert(table, row).await,
        }
    }

    async fn update(
        &self,
        table: Table,
        patch: &Value,
        filters: &[Filter],
    ) -> ServiceResult<Vec<Value>> {
        match self {
            Self::Remote(s) => s.update(table, patch, filters).await,
            Self::Memory(s) => s.update(table, patch, filters).await,
        }
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> ServiceResult<()> {
        match self {
            Self::Remote(s) => s.delete(table, filters).await,
            Self::Memory(s) => s.delete(table, filters).await,
        }
    }

    async fn subscribe(&self, table: Table) -> ServiceResult<ChangeSubscription> {
        match self {
            Self::Remote(s) => s.subscribe(table).await,
            Self::Memory(s) => s.subscribe(table).await,
        }
    }
}
