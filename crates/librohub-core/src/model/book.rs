// ── Catalog domain types ──

use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;

/// A catalog entry as mirrored from the `books` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: EntityId,
    pub title: String,
    pub author: String,

    /// Display name of the category. Resolved through the categories
    /// join; falls back to the raw column value when the join is empty.
    pub category: String,
    /// Raw `category` column as stored remotely (usually a category id).
    pub category_ref: Option<String>,

    /// `true` = on the shelf, `false` = out on loan.
    pub available: bool,

    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub description: Option<String>,
}

impl Book {
    /// Availability as a short human label.
    pub fn availability_label(&self) -> &'static str {
        if self.available { "Available" } else { "Borrowed" }
    }
}

/// Fields for a new catalog entry. Availability is always `true` on
/// insert and the id is assigned remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    /// Category name or id. Names known to the mirror are resolved to ids.
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
