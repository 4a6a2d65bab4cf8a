//! CLI configuration -- thin wrapper around `librohub_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--url, --api-key, etc.).

use std::time::Duration;

use secrecy::SecretString;

use librohub_core::{LibraryConfig, ServiceConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use librohub_config::{
    Config, Profile, config_path, load_config, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config
        .active_profile_name(global.profile.as_deref())
        .to_owned()
}

/// Service and mirror settings from the config file, profile, and flags.
pub fn resolve(global: &GlobalOpts) -> Result<(ServiceConfig, LibraryConfig), CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        let service = resolve_profile(profile, &profile_name, global)?;
        let library = librohub_config::profile_to_library_config(profile)?;
        return Ok((service, library));
    }

    // An explicitly requested profile must exist.
    if global.profile.is_some() {
        let available: Vec<_> = cfg.profiles.keys().cloned().collect();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // No profile -- build from CLI flags / env vars alone
    let url_str = global.url.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = librohub_config::parse_service_url(url_str)?;
    let api_key = global
        .api_key
        .clone()
        .map(SecretString::from)
        .ok_or(CliError::NoCredentials {
            profile: profile_name,
        })?;

    let tls = if global.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    let service = ServiceConfig {
        url,
        api_key,
        tls,
        timeout: Duration::from_secs(global.timeout),
    };
    Ok((service, LibraryConfig::default()))
}

/// Translate a `Profile` + global flags into a `ServiceConfig`.
///
/// CLI flag overrides take priority over profile values.
fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<ServiceConfig, CliError> {
    // 1. URL (flag > env > profile)
    let url = librohub_config::parse_service_url(global.url.as_deref().unwrap_or(&profile.url))?;

    // 2. API key (flag > profile chain)
    let api_key = match global.api_key {
        Some(ref key) => SecretString::from(key.clone()),
        None => librohub_config::resolve_api_key(profile, profile_name)?,
    };

    // 3. TLS verification
    let tls = if global.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        librohub_config::profile_tls(profile)
    };

    // 4. Timeout (profile > flag default)
    let timeout = Duration::from_secs(profile.timeout.unwrap_or(global.timeout));

    Ok(ServiceConfig {
        url,
        api_key,
        tls,
        timeout,
    })
}
