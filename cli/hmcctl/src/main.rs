//! hmcctl - lifecycle operations against a management console.
//!
//! Drives power transitions, configuration reconciliation, OS
//! installation, and software update/upgrade for managed systems and
//! their service partitions. Prints a result record as JSON and maps
//! outcomes to the process exit status: 0 success, 1 fatal failure,
//! 2 validation failure.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.run().await {
        Ok(result) => output::print_result(&result),
        Err(e) => {
            output::print_error_record(&e);
            error::print_error(&e);
            std::process::exit(error::exit_code(&e));
        }
    }
}
