mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // `debugMode` in the config raises the floor to debug
    let debug_mode = mktsync_config::load_config(cli.global.config.as_deref())
        .is_ok_and(|cfg| cfg.debug_mode);
    init_tracing(cli.global.verbose, debug_mode);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, debug_mode: bool) {
    let filter = match verbosity {
        0 if debug_mode => "debug",
        0 => "warn",
        1 if debug_mode => "debug",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Sync(args) => commands::sync::handle(args, &cli.global).await,
        Command::Validate => commands::validate::handle(&cli.global),
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "mktsync", &mut std::io::stdout());
            Ok(())
        }
    }
}
