//! grambench CLI entry point.

use clap::Parser;
use grambench::cli::{self, Cli, Commands, EXIT_ERROR};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Matrix(args) => cli::run_matrix(&args),
        Commands::Report(args) => cli::run_report(&args),
        Commands::Stats(args) => cli::run_stats(&args),
        Commands::Split(args) => cli::run_split(&args),
        Commands::Map(args) => cli::run_map(&args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "command failed");
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
