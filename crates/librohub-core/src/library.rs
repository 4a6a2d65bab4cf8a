// ── Library facade ──
//
// Full lifecycle management for the local mirror: initial load, change
// subscriptions, polling fallback, mutating operations and their
// outcome notifications.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use librohub_api::{Embed, Filter, Query, Table};

use crate::config::LibraryConfig;
use crate::convert;
use crate::error::CoreError;
use crate::model::{
    Book, BorrowRecord, Category, EntityId, LibrarianAction, Member, NewBook, NewMember,
    Notification, NotificationLevel,
};
use crate::service::{ChangeNotice, ChangeSubscription, DataService};
use crate::store::DataStore;
use crate::stream::{BookFilter, EntityStream, LoanFilter};
use crate::views::{LibraryStats, MemberDashboard};

const NOTIFICATION_CHANNEL_SIZE: usize = 64;

/// Tables whose remote changes trigger a reload of the matching collection.
pub const WATCHED_TABLES: [Table; 3] = [Table::Books, Table::BorrowRecords, Table::Members];

// ── Operation outcomes ───────────────────────────────────────────

/// Fixed user-facing messages for one mutating operation.
struct Outcome {
    name: &'static str,
    success: &'static str,
    failure: &'static str,
    refused: &'static str,
}

const BORROW: Outcome = Outcome {
    name: "borrow",
    success: "Book borrowed successfully!",
    failure: "Failed to borrow book",
    refused: "Cannot Borrow",
};

const RETURN: Outcome = Outcome {
    name: "return",
    success: "Book returned successfully!",
    failure: "Failed to return book",
    refused: "Cannot Return",
};

const ADD_BOOK: Outcome = Outcome {
    name: "add_book",
    success: "Book added successfully!",
    failure: "Failed to add book",
    refused: "Invalid Book",
};

const ADD_MEMBER: Outcome = Outcome {
    name: "add_member",
    success: "Member added successfully!",
    failure: "Failed to add member",
    refused: "Invalid Member",
};

const DELETE_BOOK: Outcome = Outcome {
    name: "delete_book",
    success: "Book deleted successfully!",
    failure: "Failed to delete book",
    refused: "Cannot Delete",
};

// ── Library ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<LibraryInner>`. Owns the data service, the
/// reactive [`DataStore`] mirror and the background tasks that keep it
/// fresh.
pub struct Library<S: DataService> {
    inner: Arc<LibraryInner<S>>,
}

impl<S: DataService> Clone for Library<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct LibraryInner<S> {
    config: LibraryConfig,
    service: S,
    store: Arc<DataStore>,
    notifications: broadcast::Sender<Arc<Notification>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: DataService> Library<S> {
    /// Create a library over `service`. Does NOT load -- call
    /// [`start()`](Self::start) or [`load_all()`](Self::load_all).
    pub fn new(service: S, config: LibraryConfig) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);

        Self {
            inner: Arc::new(LibraryInner {
                config,
                service,
                store: Arc::new(DataStore::new()),
                notifications,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.inner.config
    }

    /// Access the underlying DataStore.
    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    pub fn service(&self) -> &S {
        &self.inner.service
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Load everything, then subscribe to changes and start polling.
    ///
    /// Background tasks are spawned even when the initial load fails;
    /// the returned error is that load's first failure. Starting a
    /// running library again does nothing. A library that has been shut
    /// down cannot be started again.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            debug!("library already started");
            return Ok(());
        }

        let loaded = self.load_all().await;
        let config = &self.inner.config;

        if config.realtime_enabled {
            for table in WATCHED_TABLES {
                match self.inner.service.subscribe(table).await {
                    Ok(subscription) => {
                        let library = self.clone();
                        let cancel = self.inner.cancel.clone();
                        handles.push(tokio::spawn(change_task(library, subscription, cancel)));
                    }
                    Err(e) => warn!(%table, error = %e, "change subscription failed (non-fatal)"),
                }
            }
        }

        if !config.poll_interval.is_zero() {
            let library = self.clone();
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(poll_task(library, config.poll_interval, cancel)));
        }

        info!(tasks = handles.len(), "library started");
        loaded
    }

    /// Cancel the poll timer, close every subscription and join the
    /// background tasks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        debug!("library shut down");
    }

    /// One-shot: load, run closure, shut down.
    ///
    /// Optimized for CLI: disables subscriptions and polling since we only
    /// need a single request-response cycle.
    pub async fn oneshot<F, Fut, T, E>(service: S, config: &LibraryConfig, f: F) -> Result<T, E>
    where
        F: FnOnce(Library<S>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let library = Library::new(service, config.oneshot());
        library.start().await?;
        let result = f(library.clone()).await;
        library.shutdown().await;
        result
    }

    // ── Loading ──────────────────────────────────────────────────

    /// Full reload of all four collections with the loading flag raised.
    pub async fn load_all(&self) -> Result<(), CoreError> {
        self.inner.store.set_loading(true);
        let result = self.refetch().await;
        self.inner.store.set_loading(false);
        result
    }

    /// Reload all four collections concurrently. Each failing load keeps
    /// its previous snapshot; the first failure is returned.
    pub async fn refetch(&self) -> Result<(), CoreError> {
        let (books, members, records, categories) = tokio::join!(
            self.reload_books(),
            self.reload_members(),
            self.reload_borrow_records(),
            self.reload_categories(),
        );
        books.and(members).and(records).and(categories)?;

        self.inner.store.mark_full_refresh();
        debug!(
            books = self.inner.store.book_count(),
            members = self.inner.store.member_count(),
            loans = self.inner.store.borrow_record_count(),
            "full reload complete"
        );
        Ok(())
    }

    pub async fn reload_books(&self) -> Result<(), CoreError> {
        self.reload(
            Query::table(Table::Books).embed(Embed::Category),
            convert::books_from_rows,
            DataStore::replace_books,
            "Failed to fetch books",
        )
        .await
    }

    pub async fn reload_members(&self) -> Result<(), CoreError> {
        self.reload(
            Query::table(Table::Members),
            convert::members_from_rows,
            DataStore::replace_members,
            "Failed to fetch members",
        )
        .await
    }

    pub async fn reload_borrow_records(&self) -> Result<(), CoreError> {
        self.reload(
            Query::table(Table::BorrowRecords)
                .embed(Embed::Book)
                .embed(Embed::Member),
            convert::borrow_records_from_rows,
            DataStore::replace_borrow_records,
            "Failed to fetch borrow records",
        )
        .await
    }

    pub async fn reload_categories(&self) -> Result<(), CoreError> {
        self.reload(
            Query::table(Table::Categories),
            convert::categories_from_rows,
            DataStore::replace_categories,
            "Failed to fetch categories",
        )
        .await
    }

    /// Reload the collection mirrored from `table`.
    pub async fn reload_table(&self, table: Table) -> Result<(), CoreError> {
        match table {
            Table::Books => self.reload_books().await,
            Table::Members => self.reload_members().await,
            Table::BorrowRecords => self.reload_borrow_records().await,
            Table::Categories => self.reload_categories().await,
            Table::LibrarianActions => Ok(()),
        }
    }

    async fn reload<T>(
        &self,
        query: Query,
        decode: fn(Vec<Value>) -> Result<Vec<T>, CoreError>,
        replace: fn(&DataStore, Vec<T>),
        failure: &'static str,
    ) -> Result<(), CoreError> {
        let table = query.table;
        let result = self
            .inner
            .service
            .select(&query)
            .await
            .map_err(CoreError::read(table))
            .and_then(decode);

        match result {
            Ok(items) => {
                let count = items.len();
                replace(&self.inner.store, items);
                debug!(%table, count, "collection reloaded");
                Ok(())
            }
            Err(e) => {
                warn!(%table, error = %e, "reload failed");
                self.notify(Notification::error(failure));
                Err(e)
            }
        }
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Lend a book: mark it unavailable, open a loan due after the
    /// configured period, then append an audit entry.
    ///
    /// The steps are not transactional. A failure stops the sequence
    /// where it happened and nothing is rolled back.
    pub async fn borrow(&self, book_id: &EntityId, member_id: &EntityId) -> Result<(), CoreError> {
        let result = self.borrow_steps(book_id, member_id).await;
        if result.is_ok() {
            let _ = tokio::join!(self.reload_books(), self.reload_borrow_records());
        }
        self.conclude(result, &BORROW)
    }

    async fn borrow_steps(&self, book_id: &EntityId, member_id: &EntityId) -> Result<(), CoreError> {
        // Only flips a book that is still available remotely; the mirror
        // may lag behind in either direction.
        let claimed = self
            .inner
            .service
            .update(
                Table::Books,
                &json!({ "availability_status": false }),
                &[
                    Filter::eq("book_id", book_id),
                    Filter::eq("availability_status", true),
                ],
            )
            .await
            .map_err(CoreError::write(Table::Books))?;
        if claimed.is_empty() {
            return Err(match self.remote_book(book_id).await? {
                Some(_) => not_available(),
                None => book_not_found(book_id),
            });
        }

        let now = Utc::now();
        let record = json!({
            "book_id": book_id,
            "member_id": member_id,
            "issue_date": now.to_rfc3339(),
            "due_date": (now + self.inner.config.loan_period()).to_rfc3339(),
        });
        self.inner
            .service
            .insert(Table::BorrowRecords, &record)
            .await
            .map_err(CoreError::write(Table::BorrowRecords))?;

        self.audit(LibrarianAction::borrowed(book_id, member_id))
            .await
    }

    /// Take a book back: mark it available, stamp the open loan(s) with
    /// the current time, then append an audit entry. Not transactional.
    pub async fn return_book(&self, book_id: &EntityId) -> Result<(), CoreError> {
        let result = self.return_steps(book_id).await;
        if result.is_ok() {
            let _ = tokio::join!(self.reload_books(), self.reload_borrow_records());
        }
        self.conclude(result, &RETURN)
    }

    async fn return_steps(&self, book_id: &EntityId) -> Result<(), CoreError> {
        // Checked against the service: a book left unavailable by a failed
        // borrow has no open loan but must still be returnable.
        if self.open_loans_remote(book_id).await?.is_empty() {
            match self.remote_book(book_id).await? {
                None => return Err(book_not_found(book_id)),
                Some(row) if row["availability_status"] != json!(false) => {
                    return Err(CoreError::BusinessRule {
                        message: "Book is not currently borrowed".into(),
                    });
                }
                Some(_) => {}
            }
        }

        self.inner
            .service
            .update(
                Table::Books,
                &json!({ "availability_status": true }),
                &[Filter::eq("book_id", book_id)],
            )
            .await
            .map_err(CoreError::write(Table::Books))?;

        self.inner
            .service
            .update(
                Table::BorrowRecords,
                &json!({ "return_date": Utc::now().to_rfc3339() }),
                &[Filter::eq("book_id", book_id), Filter::is_null("return_date")],
            )
            .await
            .map_err(CoreError::write(Table::BorrowRecords))?;

        self.audit(LibrarianAction::returned(book_id)).await
    }

    /// Add a catalog entry. A category given by name is stored as that
    /// category's id when the mirror knows it, verbatim otherwise.
    pub async fn add_book(&self, book: NewBook) -> Result<(), CoreError> {
        let result = self.add_book_steps(book).await;
        if result.is_ok() {
            let _ = self.reload_books().await;
        }
        self.conclude(result, &ADD_BOOK)
    }

    async fn add_book_steps(&self, book: NewBook) -> Result<(), CoreError> {
        let title = required("title", &book.title)?;
        let author = required("author", &book.author)?;
        let category = required("category", &book.category)?;

        let category_ref = self
            .inner
            .store
            .category_by_name(&category)
            .map_or(category, |c| c.id.to_string());

        let mut row = json!({
            "title": title,
            "author": author,
            "category": category_ref,
        });
        if let Some(isbn) = book.isbn.filter(|s| !s.trim().is_empty()) {
            row["isbn"] = json!(isbn.trim());
        }
        if let Some(year) = book.published_year {
            row["published_year"] = json!(year);
        }
        if let Some(description) = book.description.filter(|s| !s.trim().is_empty()) {
            row["description"] = json!(description);
        }

        self.inner
            .service
            .insert(Table::Books, &row)
            .await
            .map_err(CoreError::write(Table::Books))?;
        Ok(())
    }

    /// Register a member.
    pub async fn add_member(&self, member: NewMember) -> Result<(), CoreError> {
        let result = self.add_member_steps(member).await;
        if result.is_ok() {
            let _ = self.reload_members().await;
        }
        self.conclude(result, &ADD_MEMBER)
    }

    async fn add_member_steps(&self, member: NewMember) -> Result<(), CoreError> {
        let name = required("name", &member.name)?;
        let email = required("email", &member.email)?;

        let mut row = json!({ "name": name, "email": email });
        if let Some(phone) = member.phone.filter(|s| !s.trim().is_empty()) {
            row["phone"] = json!(phone.trim());
        }

        self.inner
            .service
            .insert(Table::Members, &row)
            .await
            .map_err(CoreError::write(Table::Members))?;
        Ok(())
    }

    /// Remove a book from the catalog, refusing while any loan on it is
    /// open (checked against the service, not the mirror).
    pub async fn delete_book(&self, book_id: &EntityId) -> Result<(), CoreError> {
        let result = self.delete_book_steps(book_id).await;
        if result.is_ok() {
            let _ = self.reload_books().await;
        }
        self.conclude(result, &DELETE_BOOK)
    }

    async fn delete_book_steps(&self, book_id: &EntityId) -> Result<(), CoreError> {
        if !self.open_loans_remote(book_id).await?.is_empty() {
            return Err(CoreError::BusinessRule {
                message: "Book is currently borrowed and cannot be deleted".into(),
            });
        }

        self.inner
            .service
            .delete(Table::Books, &[Filter::eq("book_id", book_id)])
            .await
            .map_err(CoreError::write(Table::Books))?;

        self.audit(LibrarianAction::deleted(book_id)).await
    }

    /// Open loan rows for `book_id` as the service sees them.
    async fn open_loans_remote(&self, book_id: &EntityId) -> Result<Vec<Value>, CoreError> {
        self.inner
            .service
            .select(
                &Query::table(Table::BorrowRecords)
                    .filter(Filter::eq("book_id", book_id))
                    .filter(Filter::is_null("return_date")),
            )
            .await
            .map_err(CoreError::read(Table::BorrowRecords))
    }

    async fn remote_book(&self, book_id: &EntityId) -> Result<Option<Value>, CoreError> {
        let rows = self
            .inner
            .service
            .select(&Query::table(Table::Books).filter(Filter::eq("book_id", book_id)))
            .await
            .map_err(CoreError::read(Table::Books))?;
        Ok(rows.into_iter().next())
    }

    async fn audit(&self, action: LibrarianAction) -> Result<(), CoreError> {
        let row = serde_json::to_value(&action).map_err(|e| CoreError::Internal(e.to_string()))?;
        self.inner
            .service
            .insert(Table::LibrarianActions, &row)
            .await
            .map_err(CoreError::write(Table::LibrarianActions))?;
        Ok(())
    }

    /// Log and notify the outcome of a mutation, passing the result through.
    fn conclude(&self, result: Result<(), CoreError>, op: &Outcome) -> Result<(), CoreError> {
        match &result {
            Ok(()) => {
                info!(op = op.name, "operation succeeded");
                self.notify(Notification::success(op.success));
            }
            Err(e) if e.is_refusal() => {
                warn!(op = op.name, reason = %e, "operation refused");
                let message = match e {
                    CoreError::BusinessRule { message } => message.clone(),
                    other => other.to_string(),
                };
                self.notify(Notification::new(
                    NotificationLevel::Error,
                    op.refused,
                    message,
                ));
            }
            Err(e) => {
                error!(op = op.name, error = %e, "operation failed");
                self.notify(Notification::error(op.failure));
            }
        }
        result
    }

    fn notify(&self, notification: Notification) {
        // No receivers is fine: nobody may be listening.
        let _ = self.inner.notifications.send(Arc::new(notification));
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to operation outcome notifications.
    pub fn notifications(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.inner.notifications.subscribe()
    }

    /// `true` while a full load is in flight.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.inner.store.subscribe_loading()
    }

    // ── Snapshot accessors (delegate to DataStore) ───────────────

    pub fn books_snapshot(&self) -> Arc<Vec<Arc<Book>>> {
        self.inner.store.books_snapshot()
    }

    pub fn members_snapshot(&self) -> Arc<Vec<Arc<Member>>> {
        self.inner.store.members_snapshot()
    }

    pub fn borrow_records_snapshot(&self) -> Arc<Vec<Arc<BorrowRecord>>> {
        self.inner.store.borrow_records_snapshot()
    }

    pub fn categories_snapshot(&self) -> Arc<Vec<Arc<Category>>> {
        self.inner.store.categories_snapshot()
    }

    // ── Stream accessors (delegate to DataStore) ─────────────────

    pub fn books(&self) -> EntityStream<Book> {
        self.inner.store.subscribe_books()
    }

    pub fn members(&self) -> EntityStream<Member> {
        self.inner.store.subscribe_members()
    }

    pub fn borrow_records(&self) -> EntityStream<BorrowRecord> {
        self.inner.store.subscribe_borrow_records()
    }

    pub fn categories(&self) -> EntityStream<Category> {
        self.inner.store.subscribe_categories()
    }

    // ── Derived views ────────────────────────────────────────────

    pub fn search_books(&self, filter: &BookFilter) -> Vec<Arc<Book>> {
        self.books_snapshot()
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect()
    }

    pub fn loans(&self, filter: &LoanFilter) -> Vec<Arc<BorrowRecord>> {
        let now = Utc::now();
        self.borrow_records_snapshot()
            .iter()
            .filter(|r| filter.matches_at(r, now))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> LibraryStats {
        LibraryStats::compute(
            &self.books_snapshot(),
            self.inner.store.member_count(),
            &self.borrow_records_snapshot(),
            Utc::now(),
        )
    }

    pub fn member_dashboard(&self, member_id: &EntityId) -> Option<MemberDashboard> {
        let member = self.inner.store.member_by_id(member_id)?;
        Some(MemberDashboard::build(
            member,
            &self.borrow_records_snapshot(),
            Utc::now(),
        ))
    }
}

fn not_available() -> CoreError {
    CoreError::BusinessRule {
        message: "Book is not available".into(),
    }
}

fn book_not_found(book_id: &EntityId) -> CoreError {
    CoreError::NotFound {
        entity_type: "Book".into(),
        identifier: book_id.to_string(),
    }
}

/// Trimmed value of a required text field.
fn required(field: &str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CoreError::required(field))
    } else {
        Ok(trimmed.to_owned())
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically reload books and loans as a fallback for missed changes.
async fn poll_task<S: DataService>(library: Library<S>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                debug!("poll tick");
                let _ = tokio::join!(library.reload_books(), library.reload_borrow_records());
            }
        }
    }
}

/// Reload one collection whenever its table changes remotely, then
/// release the subscription on shutdown.
async fn change_task<S: DataService>(
    library: Library<S>,
    mut subscription: ChangeSubscription,
    cancel: CancellationToken,
) {
    let table = subscription.table();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            notice = subscription.recv() => {
                let Some(notice) = notice else {
                    debug!(%table, "change feed ended");
                    break;
                };
                if let ChangeNotice::Changed(event) = &notice {
                    debug!(%table, kind = %event.kind, "change received");
                }
                library.inner.store.mark_change();
                // Failures are already logged and notified.
                let _ = library.reload_table(table).await;
            }
        }
    }

    library.inner.service.unsubscribe(subscription).await;
}
