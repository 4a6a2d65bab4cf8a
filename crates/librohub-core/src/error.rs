// ── Core error types ──
//
// Every operation failure is classified at the operation boundary:
// remote read, remote write, business rule, validation. Consumers never
// match on HTTP status codes; the service error rides along as `source`.

use librohub_api::Table;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Remote failures ──────────────────────────────────────────────
    #[error("Failed to read {table}: {source}")]
    RemoteRead {
        table: Table,
        #[source]
        source: librohub_api::Error,
    },

    #[error("Failed to write {table}: {source}")]
    RemoteWrite {
        table: Table,
        #[source]
        source: librohub_api::Error,
    },

    /// A row came back that does not fit the domain model.
    #[error("Malformed {table} row: {message}")]
    Decode { table: Table, message: String },

    // ── Refusals ─────────────────────────────────────────────────────
    /// The operation was refused without changing any remote row.
    #[error("{message}")]
    BusinessRule { message: String },

    #[error("Validation failed: {field} {reason}")]
    Validation { field: String, reason: String },

    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn read(table: Table) -> impl FnOnce(librohub_api::Error) -> Self {
        move |source| Self::RemoteRead { table, source }
    }

    pub(crate) fn write(table: Table) -> impl FnOnce(librohub_api::Error) -> Self {
        move |source| Self::RemoteWrite { table, source }
    }

    pub(crate) fn required(field: &str) -> Self {
        Self::Validation {
            field: field.into(),
            reason: "is required".into(),
        }
    }

    /// `true` for refusals that left the service untouched.
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::BusinessRule { .. } | Self::Validation { .. })
    }

    /// The service error behind a remote failure, if any.
    pub fn service_error(&self) -> Option<&librohub_api::Error> {
        match self {
            Self::RemoteRead { source, .. } | Self::RemoteWrite { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

/// Errors raised while wiring up a service (bad URL, TLS setup) surface
/// as configuration problems. Table-level failures go through
/// [`CoreError::read`] / [`CoreError::write`] instead.
impl From<librohub_api::Error> for CoreError {
    fn from(err: librohub_api::Error) -> Self {
        match err {
            librohub_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            librohub_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            librohub_api::Error::InvalidApiKey => CoreError::Config {
                message: "Invalid API key".into(),
            },
            other => CoreError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_read_names_the_table() {
        let err = CoreError::read(Table::BorrowRecords)(librohub_api::Error::InvalidApiKey);
        assert_eq!(
            err.to_string(),
            "Failed to read borrow_records: Invalid API key"
        );
        assert!(err.service_error().is_some());
        assert!(!err.is_refusal());
    }

    #[test]
    fn business_rule_displays_message_only() {
        let err = CoreError::BusinessRule {
            message: "Book is not available".into(),
        };
        assert_eq!(err.to_string(), "Book is not available");
        assert!(err.is_refusal());
    }

    #[test]
    fn required_field_reads_naturally() {
        assert_eq!(
            CoreError::required("title").to_string(),
            "Validation failed: title is required"
        );
    }
}
