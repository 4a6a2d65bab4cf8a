// ── Library domain model ──
//
// Canonical types consumers (CLI, watchers, tests) depend on. Raw rows
// from the data service are converted into these in `crate::convert`.

pub mod audit;
pub mod book;
pub mod category;
pub mod entity_id;
pub mod loan;
pub mod member;
pub mod notification;

// ── Re-exports ──────────────────────────────────────────────────────

pub use audit::{ActionType, LibrarianAction};
pub use book::{Book, NewBook};
pub use category::Category;
pub use entity_id::EntityId;
pub use loan::{BorrowRecord, DUE_SOON_DAYS, DueState, LoanStatus};
pub use member::{Member, NewMember};
pub use notification::{Notification, NotificationLevel};
