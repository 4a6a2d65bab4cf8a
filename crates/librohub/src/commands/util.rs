//! Shared helpers for command handlers.

use std::future::Future;
use std::io::IsTerminal;
use std::sync::Arc;

use librohub_core::{Book, CoreError, EntityId, Member};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::CliLibrary;

/// Resolve a book identifier (ID or exact title) via snapshot lookup.
pub fn resolve_book(library: &CliLibrary, identifier: &str) -> Result<Arc<Book>, CliError> {
    resolve(
        &library.books_snapshot(),
        identifier,
        |b| &b.id,
        |b, s| b.title.eq_ignore_ascii_case(s),
        "book",
    )
}

/// Resolve a member identifier (ID, email, or exact name) via snapshot lookup.
pub fn resolve_member(library: &CliLibrary, identifier: &str) -> Result<Arc<Member>, CliError> {
    resolve(
        &library.members_snapshot(),
        identifier,
        |m| &m.id,
        |m, s| m.email.eq_ignore_ascii_case(s) || m.name.eq_ignore_ascii_case(s),
        "member",
    )
}

fn resolve<T>(
    items: &[Arc<T>],
    identifier: &str,
    id_of: impl Fn(&T) -> &EntityId,
    name_matches: impl Fn(&T, &str) -> bool,
    resource_type: &str,
) -> Result<Arc<T>, CliError> {
    let wanted = identifier.trim();
    for item in items {
        if id_of(item).to_string() == wanted {
            return Ok(Arc::clone(item));
        }
    }

    let mut hits = items.iter().filter(|item| name_matches(item, wanted));
    match (hits.next(), hits.next()) {
        (Some(hit), None) => Ok(Arc::clone(hit)),
        (Some(_), Some(_)) => Err(CliError::Ambiguous {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
        }),
        (None, _) => Err(CliError::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
            list_command: format!("{resource_type}s list"),
        }),
    }
}

/// Run a library operation and echo its outcome notifications on stderr.
///
/// Failure notifications that follow a successful operation (a reload
/// that did not go through) are shown as warnings; the operation's own
/// failure is returned as the error.
pub async fn report(
    library: &CliLibrary,
    global: &GlobalOpts,
    operation: impl Future<Output = Result<(), CoreError>>,
) -> Result<(), CliError> {
    let mut notifications = library.notifications();
    let result = operation.await;

    let color = output::should_color(&global.color);
    while let Ok(note) = notifications.try_recv() {
        if global.quiet {
            continue;
        }
        if !note.is_error() {
            eprintln!("{}", output::success_line(&note.message, color));
        } else if result.is_ok() {
            eprintln!("{}", output::warning_line(&note.message, color));
        }
    }

    result.map_err(CliError::from)
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// `YYYY-MM-DD` in UTC.
pub fn short_date(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}
