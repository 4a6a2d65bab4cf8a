// ── In-memory backend ──
//
// A process-local stand-in for the hosted database. Applies the same
// column defaults, resolves the same embeds, enforces the loan foreign
// keys and broadcasts a change event for every row it touches. Used by
// the CLI demo mode and throughout the test suite, where `fail_next`
// exercises partial failures of multi-step operations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use librohub_api::{ChangeEvent, ChangeKind, Embed, Filter, Query, Table};

use super::{ChangeSubscription, DataService, Operation, ServiceResult};

const CHANGE_CHANNEL_SIZE: usize = 256;
const DEFAULT_DUE_DAYS: i64 = 14;

/// One scheduled failure: the next `operation` on `table` errors out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectedFailure {
    pub table: Table,
    pub operation: Operation,
}

/// In-process data service. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryService {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
    failures: Mutex<Vec<InjectedFailure>>,
    changes: broadcast::Sender<Arc<ChangeEvent>>,
}

impl MemoryService {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            inner: Arc::new(MemoryInner {
                tables: Mutex::new(HashMap::new()),
                failures: Mutex::new(Vec::new()),
                changes,
            }),
        }
    }

    /// Append rows verbatim, without defaults or change events.
    pub fn seed(&self, table: Table, rows: impl IntoIterator<Item = Value>) {
        self.tables().entry(table).or_default().extend(rows);
    }

    /// Current contents of `table`.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables().get(&table).cloned().unwrap_or_default()
    }

    /// Make the next `operation` on `table` fail with a transient error.
    pub fn fail_next(&self, table: Table, operation: Operation) {
        lock(&self.inner.failures).push(InjectedFailure { table, operation });
    }

    /// A small catalog with members and loans in every state.
    pub fn demo() -> Self {
        let service = Self::new();
        let now = Utc::now();

        let categories = [
            "Fiction",
            "Science Fiction",
            "History",
            "Science",
            "Children",
        ]
        .map(|name| (Uuid::new_v4().to_string(), name));
        let cat = |name: &str| {
            categories
                .iter()
                .find(|(_, n)| *n == name)
                .map(|(id, _)| id.clone())
        };
        service.seed(
            Table::Categories,
            categories
                .iter()
                .map(|(id, name)| json!({ "category_id": id, "category_name": name })),
        );

        let books = [
            ("Dune", "Frank Herbert", "Science Fiction", "9780441172719", 1965),
            ("The Left Hand of Darkness", "Ursula K. Le Guin", "Science Fiction", "9780441478125", 1969),
            ("Pride and Prejudice", "Jane Austen", "Fiction", "9780141439518", 1813),
            ("Middlemarch", "George Eliot", "Fiction", "9780141439549", 1871),
            ("The Guns of August", "Barbara W. Tuchman", "History", "9780345476098", 1962),
            ("A Brief History of Time", "Stephen Hawking", "Science", "9780553380163", 1988),
            ("The Selfish Gene", "Richard Dawkins", "Science", "9780198788607", 1976),
            ("Matilda", "Roald Dahl", "Children", "9780142410370", 1988),
        ]
        .map(|(title, author, category, isbn, year)| {
            json!({
                "book_id": Uuid::new_v4().to_string(),
                "title": title,
                "author": author,
                "category": cat(category),
                "availability_status": true,
                "isbn": isbn,
                "published_year": year,
                "description": null,
            })
        });

        let members = [
            ("Ada Lovelace", "ada@example.org", Some("+44 20 7946 0018")),
            ("Grace Hopper", "grace@example.org", None),
            ("Alan Turing", "alan@example.org", Some("+44 161 496 0753")),
            ("Katherine Johnson", "katherine@example.org", None),
        ]
        .map(|(name, email, phone)| {
            json!({
                "member_id": Uuid::new_v4().to_string(),
                "name": name,
                "email": email,
                "phone": phone,
            })
        });

        // (book, member, issued days ago, due in days, returned)
        let loans = [
            (0, 0, 5, 9, false),
            (4, 1, 13, 1, false),
            (5, 2, 20, -6, false),
            (2, 3, 30, -16, true),
        ];
        let mut books = books;
        let mut records = Vec::new();
        for (book, member, issued_ago, due_in, returned) in loans {
            if !returned {
                books[book]["availability_status"] = json!(false);
            }
            records.push(json!({
                "record_id": Uuid::new_v4().to_string(),
                "book_id": books[book]["book_id"],
                "member_id": members[member]["member_id"],
                "issue_date": (now - Duration::days(issued_ago)).to_rfc3339(),
                "due_date": (now + Duration::days(due_in)).to_rfc3339(),
                "return_date": returned.then(|| (now - Duration::days(2)).to_rfc3339()),
            }));
        }

        service.seed(Table::Books, books);
        service.seed(Table::Members, members);
        service.seed(Table::BorrowRecords, records);
        service
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn tables(&self) -> MutexGuard<'_, HashMap<Table, Vec<Value>>> {
        lock(&self.inner.tables)
    }

    /// Consume a matching injected failure, if one is scheduled.
    fn check_failure(&self, table: Table, operation: Operation) -> ServiceResult<()> {
        let mut failures = lock(&self.inner.failures);
        let wanted = InjectedFailure { table, operation };
        if let Some(pos) = failures.iter().position(|f| *f == wanted) {
            failures.remove(pos);
            debug!(%table, %operation, "injected failure");
            return Err(librohub_api::Error::Rest {
                message: "Service unavailable".into(),
                code: None,
                details: Some(format!("injected {operation} failure on {table}")),
                status: 503,
            });
        }
        Ok(())
    }

    fn emit(&self, table: Table, kind: ChangeKind, record: Value, old_record: Value) {
        let event = ChangeEvent {
            table,
            kind,
            record,
            old_record,
            commit_timestamp: Some(Utc::now().to_rfc3339()),
        };
        // No receivers is fine: nobody is watching yet.
        let _ = self.inner.changes.send(Arc::new(event));
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl DataService for MemoryService {
    async fn select(&self, query: &Query) -> ServiceResult<Vec<Value>> {
        self.check_failure(query.table, Operation::Select)?;
        let tables = self.tables();
        Ok(tables
            .get(&query.table)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|row| query.matches(row))
            .map(|row| with_embeds(&tables, row, &query.embeds))
            .collect())
    }

    async fn insert(&self, table: Table, row: &Value) -> ServiceResult<Vec<Value>> {
        self.check_failure(table, Operation::Insert)?;
        let Value::Object(fields) = row else {
            return Err(rejected(400, "PGRST102", "Row must be a JSON object"));
        };

        let stored = {
            let mut tables = self.tables();
            let stored = apply_defaults(table, fields.clone());
            check_references(&tables, table, &stored)?;

            let pk = table.primary_key();
            let rows = tables.entry(table).or_default();
            if let Some(id) = stored.get(pk).and_then(scalar) {
                if rows.iter().any(|r| Filter::eq(pk, &id).matches(r)) {
                    return Err(rejected(
                        409,
                        "23505",
                        &format!("duplicate key value violates unique constraint \"{table}_pkey\""),
                    ));
                }
            }
            let stored = Value::Object(stored);
            rows.push(stored.clone());
            stored
        };

        self.emit(table, ChangeKind::Insert, stored.clone(), json!({}));
        Ok(vec![stored])
    }

    async fn update(
        &self,
        table: Table,
        patch: &Value,
        filters: &[Filter],
    ) -> ServiceResult<Vec<Value>> {
        self.check_failure(table, Operation::Update)?;
        let Value::Object(changes) = patch else {
            return Err(rejected(400, "PGRST102", "Patch must be a JSON object"));
        };

        let mut touched = Vec::new();
        {
            let mut tables = self.tables();
            for row in tables.entry(table).or_default().iter_mut() {
                if !filters.iter().all(|f| f.matches(row)) {
                    continue;
                }
                let old = row.clone();
                if let Value::Object(fields) = row {
                    for (k, v) in changes {
                        fields.insert(k.clone(), v.clone());
                    }
                }
                touched.push((row.clone(), old));
            }
        }

        for (new, old) in &touched {
            self.emit(table, ChangeKind::Update, new.clone(), old.clone());
        }
        Ok(touched.into_iter().map(|(new, _)| new).collect())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> ServiceResult<()> {
        self.check_failure(table, Operation::Delete)?;
        let removed: Vec<Value> = {
            let mut tables = self.tables();
            let rows = tables.entry(table).or_default();
            let (gone, kept): (Vec<Value>, Vec<Value>) = std::mem::take(rows)
                .into_iter()
                .partition(|row| filters.iter().all(|f| f.matches(row)));
            *rows = kept;
            gone
        };

        for old in removed {
            self.emit(table, ChangeKind::Delete, json!({}), old);
        }
        Ok(())
    }

    async fn subscribe(&self, table: Table) -> ServiceResult<ChangeSubscription> {
        self.check_failure(table, Operation::Subscribe)?;
        Ok(ChangeSubscription::local(
            table,
            self.inner.changes.subscribe(),
        ))
    }
}

// ── Row helpers ─────────────────────────────────────────────────────

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn rejected(status: u16, code: &str, message: &str) -> librohub_api::Error {
    librohub_api::Error::Rest {
        message: message.into(),
        code: Some(code.into()),
        details: None,
        status,
    }
}

/// Scalar column value as text, for key comparisons.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Column defaults the hosted schema fills in on insert.
fn apply_defaults(table: Table, mut row: Map<String, Value>) -> Map<String, Value> {
    let now = Utc::now();
    row.entry(table.primary_key())
        .or_insert_with(|| json!(Uuid::new_v4().to_string()));

    let defaults: Vec<(&str, Value)> = match table {
        Table::Books => vec![
            ("availability_status", json!(true)),
            ("category", Value::Null),
            ("isbn", Value::Null),
            ("published_year", Value::Null),
            ("description", Value::Null),
        ],
        Table::Members => vec![("phone", Value::Null)],
        Table::BorrowRecords => vec![
            ("issue_date", json!(now.to_rfc3339())),
            (
                "due_date",
                json!((now + Duration::days(DEFAULT_DUE_DAYS)).to_rfc3339()),
            ),
            ("return_date", Value::Null),
        ],
        Table::LibrarianActions => vec![("created_at", json!(now.to_rfc3339()))],
        Table::Categories => Vec::new(),
    };
    for (column, value) in defaults {
        row.entry(column).or_insert(value);
    }
    row
}

/// Loans must point at an existing book and member.
fn check_references(
    tables: &HashMap<Table, Vec<Value>>,
    table: Table,
    row: &Map<String, Value>,
) -> ServiceResult<()> {
    if table != Table::BorrowRecords {
        return Ok(());
    }
    for (column, target) in [("book_id", Table::Books), ("member_id", Table::Members)] {
        let exists = row
            .get(column)
            .and_then(scalar)
            .and_then(|id| find_by_key(tables, target, &id))
            .is_some();
        if !exists {
            return Err(rejected(
                409,
                "23503",
                &format!(
                    "insert or update on table \"{table}\" violates foreign key constraint \"{table}_{column}_fkey\""
                ),
            ));
        }
    }
    Ok(())
}

fn find_by_key<'a>(
    tables: &'a HashMap<Table, Vec<Value>>,
    table: Table,
    id: &str,
) -> Option<&'a Value> {
    let filter = Filter::eq(table.primary_key(), id);
    tables.get(&table)?.iter().find(|r| filter.matches(r))
}

/// Resolve embedded relations the way the hosted select does: a left
/// join, so missing targets become `null` rather than dropping the row.
fn with_embeds(tables: &HashMap<Table, Vec<Value>>, row: &Value, embeds: &[Embed]) -> Value {
    let mut out = row.clone();
    for embed in embeds {
        let value = match embed {
            Embed::Category => category_embed(tables, row),
            Embed::Book => lookup(tables, Table::Books, row.get("book_id"))
                .map(|book| {
                    let mut book = book.clone();
                    book["categories"] = category_embed(tables, &book);
                    book
                })
                .unwrap_or(Value::Null),
            Embed::Member => lookup(tables, Table::Members, row.get("member_id"))
                .cloned()
                .unwrap_or(Value::Null),
        };
        out[embed.key()] = value;
    }
    out
}

fn lookup<'a>(
    tables: &'a HashMap<Table, Vec<Value>>,
    table: Table,
    key: Option<&Value>,
) -> Option<&'a Value> {
    find_by_key(tables, table, &scalar(key?)?)
}

fn category_embed(tables: &HashMap<Table, Vec<Value>>, book: &Value) -> Value {
    lookup(tables, Table::Categories, book.get("category"))
        .map(|c| json!({ "category_name": c["category_name"] }))
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ChangeNotice;
    use pretty_assertions::assert_eq;

    fn seeded() -> MemoryService {
        let svc = MemoryService::new();
        svc.seed(
            Table::Categories,
            [json!({ "category_id": "c-1", "category_name": "History" })],
        );
        svc.seed(
            Table::Books,
            [json!({ "book_id": "b-1", "title": "SPQR", "author": "Mary Beard",
                     "category": "c-1", "availability_status": true })],
        );
        svc.seed(
            Table::Members,
            [json!({ "member_id": "m-1", "name": "Ada", "email": "ada@example.org" })],
        );
        svc
    }

    #[tokio::test]
    async fn insert_fills_schema_defaults() {
        let svc = seeded();
        let stored = svc
            .insert(Table::Books, &json!({ "title": "Emma", "author": "Austen" }))
            .await
            .expect("insert ok");

        let row = &stored[0];
        assert_eq!(row["availability_status"], json!(true));
        assert!(row["book_id"].is_string());
        assert_eq!(row["isbn"], Value::Null);
        assert_eq!(svc.rows(Table::Books).len(), 2);
    }

    #[tokio::test]
    async fn select_resolves_nested_embeds() {
        let svc = seeded();
        svc.insert(
            Table::BorrowRecords,
            &json!({ "book_id": "b-1", "member_id": "m-1" }),
        )
        .await
        .expect("insert ok");

        let rows = svc
            .select(
                &Query::table(Table::BorrowRecords)
                    .embed(Embed::Book)
                    .embed(Embed::Member),
            )
            .await
            .expect("select ok");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["books"]["title"], "SPQR");
        assert_eq!(rows[0]["books"]["categories"]["category_name"], "History");
        assert_eq!(rows[0]["members"]["name"], "Ada");
        assert_eq!(rows[0]["return_date"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_category_embeds_null() {
        let svc = seeded();
        svc.insert(
            Table::Books,
            &json!({ "title": "Emma", "author": "Austen", "category": "Classics" }),
        )
        .await
        .expect("insert ok");

        let rows = svc
            .select(
                &Query::table(Table::Books)
                    .embed(Embed::Category)
                    .filter(Filter::eq("title", "Emma")),
            )
            .await
            .expect("select ok");
        assert_eq!(rows[0]["categories"], Value::Null);
    }

    #[tokio::test]
    async fn loan_insert_checks_foreign_keys() {
        let svc = seeded();
        let err = svc
            .insert(
                Table::BorrowRecords,
                &json!({ "book_id": "nope", "member_id": "m-1" }),
            )
            .await
            .expect_err("dangling book");
        assert_eq!(err.api_error_code(), Some("23503"));
    }

    #[tokio::test]
    async fn update_respects_all_filters() {
        let svc = seeded();
        let updated = svc
            .update(
                Table::Books,
                &json!({ "availability_status": false }),
                &[
                    Filter::eq("book_id", "b-1"),
                    Filter::eq("availability_status", true),
                ],
            )
            .await
            .expect("update ok");
        assert_eq!(updated.len(), 1);

        let again = svc
            .update(
                Table::Books,
                &json!({ "availability_status": false }),
                &[
                    Filter::eq("book_id", "b-1"),
                    Filter::eq("availability_status", true),
                ],
            )
            .await
            .expect("update ok");
        assert!(again.is_empty(), "already unavailable");
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let svc = seeded();
        svc.fail_next(Table::Members, Operation::Select);

        let first = svc.select(&Query::table(Table::Members)).await;
        assert!(first.as_ref().is_err_and(librohub_api::Error::is_transient));
        let second = svc.select(&Query::table(Table::Members)).await;
        assert_eq!(second.expect("second call ok").len(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_only_their_table() {
        let svc = seeded();
        let mut sub = svc.subscribe(Table::Members).await.expect("subscribed");

        svc.delete(Table::Books, &[Filter::eq("book_id", "b-1")])
            .await
            .expect("delete ok");
        svc.insert(Table::Members, &json!({ "name": "Bob", "email": "bob@example.org" }))
            .await
            .expect("insert ok");

        match sub.recv().await {
            Some(ChangeNotice::Changed(event)) => {
                assert_eq!(event.table, Table::Members);
                assert_eq!(event.kind, ChangeKind::Insert);
                assert_eq!(event.record["name"], "Bob");
            }
            other => panic!("expected member insert, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn demo_data_has_open_and_returned_loans() {
        let svc = MemoryService::demo();
        let loans = svc.rows(Table::BorrowRecords);
        assert_eq!(loans.len(), 4);
        let open = loans.iter().filter(|l| l["return_date"].is_null()).count();
        assert_eq!(open, 3);

        let unavailable = svc
            .rows(Table::Books)
            .iter()
            .filter(|b| b["availability_status"] == json!(false))
            .count();
        assert_eq!(unavailable, open);
    }
}
