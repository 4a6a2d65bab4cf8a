// ── Librarian audit trail ──
//
// Append-only entries describing mutations. Written after each
// successful borrow / return / delete; never read back by the store.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::entity_id::EntityId;

/// Kind of mutation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    BookBorrowed,
    BookReturned,
    BookDeleted,
}

/// A row for the `librarian_actions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarianAction {
    pub book_id: EntityId,
    pub action_type: ActionType,
    pub details: String,
}

impl LibrarianAction {
    pub fn borrowed(book_id: &EntityId, member_id: &EntityId) -> Self {
        Self {
            book_id: book_id.clone(),
            action_type: ActionType::BookBorrowed,
            details: format!("Book borrowed by member {member_id}"),
        }
    }

    pub fn returned(book_id: &EntityId) -> Self {
        Self {
            book_id: book_id.clone(),
            action_type: ActionType::BookReturned,
            details: "Book returned".into(),
        }
    }

    pub fn deleted(book_id: &EntityId) -> Self {
        Self {
            book_id: book_id.clone(),
            action_type: ActionType::BookDeleted,
            details: "Book deleted from library".into(),
        }
    }
}
