// ── Runtime configuration ──
//
// These types describe *where* the data lives and *how* the mirror
// behaves. They carry credential data and tuning, but never touch disk.
// The CLI builds them from its profile file and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Default loan length applied by `borrow`.
pub const DEFAULT_LOAN_DAYS: u32 = 14;

/// Default interval between background reloads of books and loans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-hosted instances with self-signed certs).
    DangerAcceptInvalid,
}

/// Connection settings for the hosted database.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Project URL (e.g., `https://abcd.example.co`).
    pub url: Url,
    /// Project API key, sent on both REST and realtime connections.
    pub api_key: SecretString,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
}

/// Behavior of the local mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Days between issue and due date for new loans.
    pub loan_period_days: u32,
    /// Background reload interval. `Duration::ZERO` disables polling.
    pub poll_interval: Duration,
    /// Subscribe to change notifications on books, loans and members.
    pub realtime_enabled: bool,
}

impl LibraryConfig {
    pub fn loan_period(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.loan_period_days))
    }

    /// One-shot settings: no polling, no subscriptions.
    pub fn oneshot(&self) -> Self {
        Self {
            poll_interval: Duration::ZERO,
            realtime_enabled: false,
            ..self.clone()
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            loan_period_days: DEFAULT_LOAN_DAYS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            realtime_enabled: true,
        }
    }
}
