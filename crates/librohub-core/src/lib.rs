// librohub-core: Reactive library mirror between librohub-api and consumers (CLI).

pub mod config;
mod convert;
pub mod error;
pub mod library;
pub mod model;
pub mod service;
pub mod store;
pub mod stream;
pub mod views;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{LibraryConfig, ServiceConfig, TlsVerification};
pub use error::CoreError;
pub use library::Library;
pub use service::{
    Backend, CallObserver, CallRecord, ChangeNotice, ChangeSubscription, DataService,
    MemoryService, Observed, Operation, RecordingObserver, RemoteService, TracingObserver,
};
pub use store::DataStore;
pub use stream::{Availability, BookFilter, EntityStream, LoanFilter};
pub use views::{LibraryStats, MemberDashboard, OpenLoan};

/// Service-level error carried inside remote failures.
pub use librohub_api::Error as ApiError;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ActionType, Book, BorrowRecord, Category, DueState, EntityId, LibrarianAction, LoanStatus,
    Member, NewBook, NewMember, Notification, NotificationLevel,
};
