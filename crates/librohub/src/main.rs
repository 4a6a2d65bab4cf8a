mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use librohub_core::{Backend, LibraryConfig, MemoryService, Observed, RemoteService, TracingObserver};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::commands::CliService;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a service
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "librohub", &mut std::io::stdout());
            Ok(())
        }

        // All other commands read or write the library
        cmd => {
            let (service, library_config) = build_service(&cli.global)?;

            tracing::debug!(command = ?cmd, demo = cli.global.demo, "dispatching command");
            commands::dispatch(cmd, service, library_config, &cli.global).await
        }
    }
}

/// Pick the backend: the seeded in-memory library for `--demo`, the
/// configured service otherwise. Every call is traced.
fn build_service(global: &GlobalOpts) -> Result<(CliService, LibraryConfig), CliError> {
    if global.demo {
        let service = Observed::new(Backend::Memory(MemoryService::demo()), TracingObserver);
        return Ok((service, LibraryConfig::default()));
    }

    let (service_config, library_config) = config::resolve(global)?;
    let remote = RemoteService::new(&service_config)?;
    Ok((
        Observed::new(Backend::Remote(remote), TracingObserver),
        library_config,
    ))
}
