//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use librohub_config::ConfigError;
use librohub_core::{ApiError, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the library service")]
    #[diagnostic(
        code(librohub::connection_failed),
        help(
            "Check the service URL and your network connection.\n\
             Try the same command with --demo to rule out local problems."
        )
    )]
    ConnectionFailed {
        #[source]
        source: CoreError,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("The service rejected the API key")]
    #[diagnostic(
        code(librohub::auth_failed),
        help(
            "Verify the project API key for profile '{profile}'.\n\
             Run: librohub config init"
        )
    )]
    AuthFailed { profile: String },

    #[error("Permission denied: {message}")]
    #[diagnostic(
        code(librohub::permission_denied),
        help("The API key lacks access to this table. Check the project's row-level policies.")
    )]
    PermissionDenied { message: String },

    #[error("No API key configured for profile '{profile}'")]
    #[diagnostic(
        code(librohub::no_credentials),
        help(
            "Configure credentials with: librohub config init\n\
             Or set the LIBROHUB_API_KEY environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Library rules ────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(librohub::refused))]
    Refused { message: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(librohub::not_found),
        help("Run: librohub {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("'{identifier}' matches more than one {resource_type}")]
    #[diagnostic(
        code(librohub::ambiguous),
        help("Use the {resource_type} ID instead.")
    )]
    Ambiguous {
        resource_type: String,
        identifier: String,
    },

    #[error("Conflicting data: {message}")]
    #[diagnostic(code(librohub::conflict))]
    Conflict { message: String },

    // ── Service ──────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(librohub::service))]
    Service(CoreError),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(librohub::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(librohub::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: librohub config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No service configured")]
    #[diagnostic(
        code(librohub::no_config),
        help(
            "Create a profile with: librohub config init\n\
             Expected at: {path}\n\
             Or pass --url and --api-key, or try --demo."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(librohub::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(librohub::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Refused { .. } | Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. }
            | Self::Ambiguous { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if let Some(source) = err.service_error() {
            match source {
                ApiError::InvalidApiKey => {
                    return CliError::AuthFailed {
                        profile: "current".into(),
                    };
                }
                ApiError::PermissionDenied { message } => {
                    return CliError::PermissionDenied {
                        message: message.clone(),
                    };
                }
                // Postgres integrity violations (foreign key, unique)
                ApiError::Rest {
                    code: Some(code),
                    message,
                    ..
                } if code.starts_with("23") => {
                    return CliError::Conflict {
                        message: message.clone(),
                    };
                }
                _ => {}
            }
            if source.is_transient() {
                return CliError::ConnectionFailed { source: err };
            }
            return CliError::Service(err);
        }

        match err {
            CoreError::BusinessRule { message } => CliError::Refused { message },
            CoreError::Validation { field, reason } => CliError::Validation { field, reason },
            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                list_command: format!("{}s list", entity_type.to_lowercase()),
                resource_type: entity_type.to_lowercase(),
                identifier,
            },
            other => CliError::Service(other),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
