// ── Collection subscriptions ──
//
// Readers hold an `EntityStream` per collection: the snapshot they last
// saw, plus a way to wait for the next full reload.

mod filter;

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub use filter::{Availability, BookFilter, LoanFilter};

/// One published state of a collection. Reloads replace it whole.
pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// Subscription to one mirrored collection.
pub struct EntityStream<T: Send + Sync + 'static> {
    seen: Snapshot<T>,
    receiver: watch::Receiver<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> EntityStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot<T>>) -> Self {
        let seen = receiver.borrow().clone();
        Self { seen, receiver }
    }

    /// The snapshot most recently handed out by this subscription.
    pub fn current(&self) -> &Snapshot<T> {
        &self.seen
    }

    /// Whatever the store holds right now, without marking it seen.
    pub fn latest(&self) -> Snapshot<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next reload. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        self.seen = self.receiver.borrow_and_update().clone();
        Some(self.seen.clone())
    }

    /// Wait until a reload produces a snapshot accepted by `accept`.
    pub async fn wait_for(
        &mut self,
        mut accept: impl FnMut(&[Arc<T>]) -> bool,
    ) -> Option<Snapshot<T>> {
        loop {
            let snapshot = self.changed().await?;
            if accept(&snapshot) {
                return Some(snapshot);
            }
        }
    }

    /// Every snapshot as a `Stream`, starting with the current one.
    pub fn into_stream(self) -> WatchStream<Snapshot<T>> {
        WatchStream::new(self.receiver)
    }
}
