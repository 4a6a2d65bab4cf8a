// ── Row-to-domain conversions ──
//
// Bridges raw JSON rows from the data service into canonical
// `librohub_core::model` types. Wire shapes live here as private serde
// structs; embedded relations (`categories`, `books`, `members`) are
// optional and may be null.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use librohub_api::Table;

use crate::error::CoreError;
use crate::model::{Book, BorrowRecord, Category, EntityId, Member};

// ── Wire shapes ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CategoryEmbed {
    category_name: String,
}

#[derive(Deserialize)]
struct BookRow {
    book_id: EntityId,
    title: String,
    author: String,
    #[serde(default, deserialize_with = "scalar_string")]
    category: Option<String>,
    #[serde(default = "default_available")]
    availability_status: bool,
    #[serde(default)]
    isbn: Option<String>,
    #[serde(default)]
    published_year: Option<i32>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    categories: Option<CategoryEmbed>,
}

#[derive(Deserialize)]
struct MemberRow {
    member_id: EntityId,
    name: String,
    email: String,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Deserialize)]
struct CategoryRow {
    category_id: EntityId,
    category_name: String,
}

#[derive(Deserialize)]
struct BorrowRow {
    record_id: EntityId,
    book_id: EntityId,
    member_id: EntityId,
    #[serde(deserialize_with = "timestamp")]
    issue_date: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp")]
    due_date: DateTime<Utc>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    return_date: Option<DateTime<Utc>>,
    #[serde(default)]
    books: Option<BookRow>,
    #[serde(default)]
    members: Option<MemberRow>,
}

fn default_available() -> bool {
    true
}

// ── Field helpers ───────────────────────────────────────────────────

/// Accept a category reference stored as text or as a number.
fn scalar_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse a timestamp column. Accepts RFC 3339 (`timestamptz`), naive
/// datetimes (`timestamp`, read as UTC) and bare dates (`date`, midnight UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp {raw:?}")))
}

fn optional_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp {raw:?}"))),
    }
}

// ── Row → domain ────────────────────────────────────────────────────

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        let category = row
            .categories
            .map(|c| c.category_name)
            .or_else(|| row.category.clone())
            .unwrap_or_default();

        Self {
            id: row.book_id,
            title: row.title,
            author: row.author,
            category,
            category_ref: row.category,
            available: row.availability_status,
            isbn: row.isbn,
            published_year: row.published_year,
            description: row.description,
        }
    }
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            id: row.member_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
        }
    }
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.category_id,
            name: row.category_name,
        }
    }
}

impl From<BorrowRow> for BorrowRecord {
    fn from(row: BorrowRow) -> Self {
        Self {
            id: row.record_id,
            book_id: row.book_id,
            member_id: row.member_id,
            issue_date: row.issue_date,
            due_date: row.due_date,
            return_date: row.return_date,
            book: row.books.map(Book::from),
            member: row.members.map(Member::from),
        }
    }
}

/// Decode every row or none: one malformed row fails the whole load so
/// the previous snapshot stays in place.
fn decode_rows<R, T>(table: Table, rows: Vec<Value>) -> Result<Vec<T>, CoreError>
where
    R: for<'de> Deserialize<'de>,
    T: From<R>,
{
    rows.into_iter()
        .map(|row| {
            serde_json::from_value::<R>(row)
                .map(T::from)
                .map_err(|e| CoreError::Decode {
                    table,
                    message: e.to_string(),
                })
        })
        .collect()
}

pub(crate) fn books_from_rows(rows: Vec<Value>) -> Result<Vec<Book>, CoreError> {
    decode_rows::<BookRow, Book>(Table::Books, rows)
}

pub(crate) fn members_from_rows(rows: Vec<Value>) -> Result<Vec<Member>, CoreError> {
    decode_rows::<MemberRow, Member>(Table::Members, rows)
}

pub(crate) fn categories_from_rows(rows: Vec<Value>) -> Result<Vec<Category>, CoreError> {
    decode_rows::<CategoryRow, Category>(Table::Categories, rows)
}

pub(crate) fn borrow_records_from_rows(rows: Vec<Value>) -> Result<Vec<BorrowRecord>, CoreError> {
    decode_rows::<BorrowRow, BorrowRecord>(Table::BorrowRecords, rows)
}
