// ── Central reactive data store ──
//
// Local mirror of the four library collections. Each collection is
// replaced wholesale on reload; mutations are broadcast to subscribers
// via `watch` channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::collection::EntityCollection;
use crate::model::{Book, BorrowRecord, Category, EntityId, Member};
use crate::stream::EntityStream;

/// Central reactive store for all library entities.
///
/// Thread-safe: readers take cheap `Arc` snapshots and never block a
/// reload. Only the library facade writes.
pub struct DataStore {
    pub(crate) books: EntityCollection<Book>,
    pub(crate) members: EntityCollection<Member>,
    pub(crate) borrow_records: EntityCollection<BorrowRecord>,
    pub(crate) categories: EntityCollection<Category>,
    pub(crate) loading: watch::Sender<bool>,
    pub(crate) last_full_refresh: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_change: watch::Sender<Option<DateTime<Utc>>>,
}

impl DataStore {
    /// An empty mirror that reports itself as loading until the first
    /// full load completes.
    pub fn new() -> Self {
        let (loading, _) = watch::channel(true);
        let (last_full_refresh, _) = watch::channel(None);
        let (last_change, _) = watch::channel(None);

        Self {
            books: EntityCollection::new(),
            members: EntityCollection::new(),
            borrow_records: EntityCollection::new(),
            categories: EntityCollection::new(),
            loading,
            last_full_refresh,
            last_change,
        }
    }

    // ── Replacement (facade only) ────────────────────────────────────

    pub(crate) fn replace_books(&self, books: Vec<Book>) {
        self.books.replace_all(books);
    }

    pub(crate) fn replace_members(&self, members: Vec<Member>) {
        self.members.replace_all(members);
    }

    pub(crate) fn replace_borrow_records(&self, records: Vec<BorrowRecord>) {
        self.borrow_records.replace_all(records);
    }

    pub(crate) fn replace_categories(&self, categories: Vec<Category>) {
        self.categories.replace_all(categories);
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.loading.send_replace(loading);
    }

    pub(crate) fn mark_full_refresh(&self) {
        self.last_full_refresh.send_replace(Some(Utc::now()));
    }

    pub(crate) fn mark_change(&self) {
        self.last_change.send_replace(Some(Utc::now()));
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn books_snapshot(&self) -> Arc<Vec<Arc<Book>>> {
        self.books.snapshot()
    }

    pub fn members_snapshot(&self) -> Arc<Vec<Arc<Member>>> {
        self.members.snapshot()
    }

    pub fn borrow_records_snapshot(&self) -> Arc<Vec<Arc<BorrowRecord>>> {
        self.borrow_records.snapshot()
    }

    pub fn categories_snapshot(&self) -> Arc<Vec<Arc<Category>>> {
        self.categories.snapshot()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn book_by_id(&self, id: &EntityId) -> Option<Arc<Book>> {
        self.books.get(id)
    }

    pub fn member_by_id(&self, id: &EntityId) -> Option<Arc<Member>> {
        self.members.get(id)
    }

    pub fn borrow_record_by_id(&self, id: &EntityId) -> Option<Arc<BorrowRecord>> {
        self.borrow_records.get(id)
    }

    /// Category whose name matches, ignoring ASCII case.
    pub fn category_by_name(&self, name: &str) -> Option<Arc<Category>> {
        self.categories
            .snapshot()
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Open loans recorded against a book, as currently mirrored.
    pub fn open_loans_for_book(&self, book_id: &EntityId) -> Vec<Arc<BorrowRecord>> {
        self.borrow_records
            .snapshot()
            .iter()
            .filter(|r| r.is_open() && r.book_id == *book_id)
            .cloned()
            .collect()
    }

    // ── Count accessors ──────────────────────────────────────────────

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn borrow_record_count(&self) -> usize {
        self.borrow_records.len()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_books(&self) -> EntityStream<Book> {
        EntityStream::new(self.books.subscribe())
    }

    pub fn subscribe_members(&self) -> EntityStream<Member> {
        EntityStream::new(self.members.subscribe())
    }

    pub fn subscribe_borrow_records(&self) -> EntityStream<BorrowRecord> {
        EntityStream::new(self.borrow_records.subscribe())
    }

    pub fn subscribe_categories(&self) -> EntityStream<Category> {
        EntityStream::new(self.categories.subscribe())
    }

    /// `true` while a full load is in flight.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn last_full_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_full_refresh.borrow()
    }

    /// When the last change notice arrived from a subscription.
    pub fn last_change(&self) -> Option<DateTime<Utc>> {
        *self.last_change.borrow()
    }

    /// How long ago the last full refresh occurred, or `None` if never refreshed.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_full_refresh().map(|t| Utc::now() - t)
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(id: &str, book: &str, returned: bool) -> BorrowRecord {
        let now = Utc::now();
        BorrowRecord {
            id: EntityId::from(id),
            book_id: EntityId::from(book),
            member_id: EntityId::from("m-1"),
            issue_date: now,
            due_date: now + Duration::days(14),
            return_date: returned.then_some(now),
            book: None,
            member: None,
        }
    }

    #[test]
    fn open_loans_ignore_returned_records() {
        let store = DataStore::new();
        store.replace_borrow_records(vec![
            loan("r-1", "b-1", true),
            loan("r-2", "b-1", false),
            loan("r-3", "b-2", false),
        ]);

        let open = store.open_loans_for_book(&EntityId::from("b-1"));
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, EntityId::from("r-2"));
    }

    #[test]
    fn category_lookup_ignores_case() {
        let store = DataStore::new();
        store.replace_categories(vec![Category {
            id: EntityId::from("c-1"),
            name: "Science Fiction".into(),
        }]);
        assert!(store.category_by_name("science fiction").is_some());
        assert!(store.category_by_name("Fantasy").is_none());
    }

    #[test]
    fn loading_flag_is_observable() {
        let store = DataStore::new();
        let rx = store.subscribe_loading();
        assert!(store.is_loading(), "a fresh store has not loaded yet");
        store.set_loading(false);
        assert!(!*rx.borrow());
        store.set_loading(true);
        assert!(*rx.borrow());
        assert!(store.is_loading());
    }
}
