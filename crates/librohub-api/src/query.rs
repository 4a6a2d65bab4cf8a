// ── Query vocabulary ──
//
// Tables, equality / null filters and embedded relations, rendered into
// PostgREST query parameters. The same types drive the in-memory backend
// in `librohub-core`, so both speak one filter language.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Remote tables the library reads and writes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Books,
    Members,
    BorrowRecords,
    Categories,
    LibrarianActions,
}

impl Table {
    /// Primary key column of the table.
    pub fn primary_key(self) -> &'static str {
        match self {
            Self::Books => "book_id",
            Self::Members => "member_id",
            Self::BorrowRecords => "record_id",
            Self::Categories => "category_id",
            Self::LibrarianActions => "action_id",
        }
    }
}

// ── Filters ─────────────────────────────────────────────────────────

/// A row predicate. Only equality and null checks are needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { column: String, value: String },
    IsNull { column: String },
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.to_string(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. } | Self::IsNull { column } => column,
        }
    }

    /// Render as a PostgREST query pair, e.g. `("book_id", "eq.42")`.
    pub fn to_query_pair(&self) -> (String, String) {
        match self {
            Self::Eq { column, value } => (column.clone(), format!("eq.{value}")),
            Self::IsNull { column } => (column.clone(), "is.null".into()),
        }
    }

    /// Evaluate the predicate against a JSON row.
    ///
    /// Missing columns count as null. Scalars compare by their textual
    /// form, matching how the REST endpoint coerces `eq.` operands.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Self::Eq { column, value } => match row.get(column) {
                Some(Value::String(s)) => s == value,
                Some(Value::Null) | None => false,
                Some(other) => other.to_string() == *value,
            },
            Self::IsNull { column } => matches!(row.get(column), None | Some(Value::Null)),
        }
    }
}

// ── Embedded relations ──────────────────────────────────────────────

/// Related rows joined into a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Embed {
    /// `books.category` → `categories.category_name`
    Category,
    /// `borrow_records.book_id` → the book, itself joined with its category
    Book,
    /// `borrow_records.member_id` → the member
    Member,
}

impl Embed {
    /// Key under which the joined object appears in each result row.
    pub fn key(self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Book => "books",
            Self::Member => "members",
        }
    }

    fn select_fragment(self) -> &'static str {
        match self {
            Self::Category => "categories(category_name)",
            Self::Book => "books(*,categories(category_name))",
            Self::Member => "members(*)",
        }
    }
}

// ── Query ───────────────────────────────────────────────────────────

/// A select against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: Table,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            embeds: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// The `select=` expression: all columns plus embedded relations.
    pub fn select_expr(&self) -> String {
        let mut expr = String::from("*");
        for embed in &self.embeds {
            expr.push(',');
            expr.push_str(embed.select_fragment());
        }
        expr
    }

    /// Full query string parameters for a GET.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_owned(), self.select_expr())];
        params.extend(self.filters.iter().map(Filter::to_query_pair));
        params
    }

    /// `true` if every filter accepts the row.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}
