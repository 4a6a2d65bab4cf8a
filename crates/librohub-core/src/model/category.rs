use serde::{Deserialize, Serialize};

use super::entity_id::EntityId;

/// A named grouping of books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
}
