//! Command dispatch: bridges CLI args -> library operations -> output formatting.

pub mod books;
pub mod categories;
pub mod config_cmd;
pub mod loans;
pub mod members;
pub mod stats;
pub mod util;
pub mod watch;

use librohub_core::{Backend, Library, LibraryConfig, Observed, TracingObserver};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// The data service every command runs against.
pub type CliService = Observed<Backend, TracingObserver>;

pub type CliLibrary = Library<CliService>;

/// Dispatch a library-bound command to the appropriate handler.
///
/// `watch` keeps the mirror live; everything else loads once, runs, and
/// shuts down.
pub async fn dispatch(
    cmd: Command,
    service: CliService,
    config: LibraryConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Command::Watch(args) = cmd {
        return watch::handle(service, config, args, global).await;
    }

    Library::oneshot(service, &config, |library| async move {
        match cmd {
            Command::Books(args) => books::handle(&library, args, global).await,
            Command::Members(args) => members::handle(&library, args, global).await,
            Command::Loans(args) => loans::handle(&library, args, global),
            Command::Categories(args) => categories::handle(&library, args, global),
            Command::Stats => stats::handle(&library, global),
            // Watch, Config and Completions are handled before dispatch
            Command::Watch(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
        }
    })
    .await
}
