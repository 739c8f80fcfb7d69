mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hearth_core::{FileStore, Session};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

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
        // Config, completions and the cached layout work offline
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "hearth", &mut std::io::stdout());
            Ok(())
        }

        Command::Layout => commands::layout::handle(&cli.global).await,

        cmd => {
            let (profile_name, session_config) = config::resolve_session_config(&cli.global)?;
            let storage = Arc::new(FileStore::new(config::storage_dir(&profile_name)));
            let ready_timeout = session_config.request_timeout;

            let session = Session::open(session_config, storage).await?;
            session.connect().await?;

            tracing::debug!(command = ?cmd, profile = %profile_name, "dispatching command");
            let result = match session.wait_ready(ready_timeout).await {
                Ok(()) => commands::dispatch(cmd, &session, &cli.global).await,
                Err(e) => Err(e.into()),
            };
            session.disconnect().await;
            result
        }
    }
}
