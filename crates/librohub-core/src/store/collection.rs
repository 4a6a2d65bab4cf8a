// ── Generic reactive entity collection ──
//
// One `watch` channel per collection holds the whole snapshot. A reload
// builds the replacement off to the side and swaps it in with a single
// send, so readers see the old list or the new one, never a mix.

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::{Book, BorrowRecord, Category, EntityId, Member};

/// Anything stored in a collection knows its own id.
pub(crate) trait Keyed {
    fn key(&self) -> &EntityId;
}

impl Keyed for Book {
    fn key(&self) -> &EntityId {
        &self.id
    }
}

impl Keyed for Member {
    fn key(&self) -> &EntityId {
        &self.id
    }
}

impl Keyed for BorrowRecord {
    fn key(&self) -> &EntityId {
        &self.id
    }
}

impl Keyed for Category {
    fn key(&self) -> &EntityId {
        &self.id
    }
}

/// A reactive, wholesale-replaced collection for a single entity type.
///
/// Order is the order the service returned. Every replacement bumps a
/// version counter and publishes the new snapshot to subscribers.
pub(crate) struct EntityCollection<T: Keyed + Send + Sync + 'static> {
    /// Version counter, bumped on every replacement.
    version: watch::Sender<u64>,

    /// Full snapshot.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Keyed + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self { version, snapshot }
    }

    /// Replace the whole collection in one step.
    pub(crate) fn replace_all(&self, items: Vec<T>) {
        let values: Vec<Arc<T>> = items.into_iter().map(Arc::new).collect();
        // `send_replace` updates unconditionally, even with zero receivers.
        self.snapshot.send_replace(Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }

    /// Look up an entity by id in the current snapshot.
    pub(crate) fn get(&self, id: &EntityId) -> Option<Arc<T>> {
        self.snapshot
            .borrow()
            .iter()
            .find(|item| item.key() == id)
            .cloned()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: EntityId::from(id),
            name: name.into(),
        }
    }

    #[test]
    fn replace_all_swaps_contents_and_bumps_version() {
        let col: EntityCollection<Category> = EntityCollection::new();
        col.replace_all(vec![category("c-1", "History"), category("c-2", "Poetry")]);
        assert_eq!(col.len(), 2);
        assert_eq!(col.version(), 1);

        col.replace_all(vec![category("c-3", "Drama")]);
        assert_eq!(col.len(), 1);
        assert_eq!(col.version(), 2);
        assert!(col.get(&EntityId::from("c-1")).is_none());
        assert_eq!(
            col.get(&EntityId::from("c-3")).map(|c| c.name.clone()),
            Some("Drama".to_string())
        );
    }

    #[test]
    fn old_snapshots_are_unaffected_by_replacement() {
        let col: EntityCollection<Category> = EntityCollection::new();
        col.replace_all(vec![category("c-1", "History")]);
        let before = col.snapshot();

        col.replace_all(Vec::new());

        assert_eq!(before.len(), 1);
        assert!(col.snapshot().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_each_replacement() {
        let col: EntityCollection<Category> = EntityCollection::new();
        let mut rx = col.subscribe();

        col.replace_all(vec![category("c-1", "History")]);
        rx.changed().await.expect("sender alive");
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
