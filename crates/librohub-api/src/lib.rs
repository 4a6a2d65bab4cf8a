//! Async client for the hosted database behind LibroHub.
//!
//! Two surfaces, one project key:
//!
//! - **[`RestClient`]** — PostgREST table operations (`select` with
//!   embedded relations, `insert`, `update`, `delete`) driven by the
//!   [`Query`] / [`Filter`] vocabulary.
//! - **[`realtime`]** — websocket change feed (Phoenix channels) that
//!   emits a [`ChangeEvent`] per row change on a subscribed table.

pub mod error;
pub mod query;
pub mod realtime;
pub mod rest;
pub mod transport;

pub use error::Error;
pub use query::{Embed, Filter, Query, Table};
pub use realtime::{ChangeEvent, ChangeKind, ChannelSpec, RealtimeHandle, ReconnectConfig};
pub use rest::RestClient;
pub use transport::{TlsMode, TransportConfig};
