//! `watch`: keep the mirror live and report each change.

use std::time::Duration;

use chrono::Local;
use tokio::sync::broadcast::error::RecvError;

use librohub_core::{Library, LibraryConfig};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::{CliLibrary, CliService, stats};

fn print_state(library: &CliLibrary, global: &GlobalOpts) -> Result<(), CliError> {
    let stats = library.stats();
    let out = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(&stats)?,
        _ => format!(
            "{}  {}",
            output::dim(Local::now().format("%H:%M:%S"), output::should_color(&global.color)),
            stats::summary_line(&stats)
        ),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(
    service: CliService,
    config: LibraryConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let library = Library::new(service, config);
    let mut notifications = library.notifications();

    // A failed first load is reported; the background tasks keep trying.
    if let Err(e) = library.start().await {
        tracing::warn!(error = %e, "initial load failed");
    }
    print_state(&library, global)?;

    let mut books = library.books();
    let mut members = library.members();
    let mut loans = library.borrow_records();

    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let color = output::should_color(&global.color);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            () = &mut deadline => break,
            Some(_) = books.changed() => print_state(&library, global)?,
            Some(_) = members.changed() => print_state(&library, global)?,
            Some(_) = loans.changed() => print_state(&library, global)?,
            note = notifications.recv() => match note {
                Ok(note) if note.is_error() => {
                    eprintln!("{}", output::warning_line(&note.message, color));
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    library.shutdown().await;
    Ok(())
}
