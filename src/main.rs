//! Botpack CLI entry point
//!
//! Parses arguments, installs the tracing subscriber, runs the selected
//! command, and exits with the conventional code (`0` success, `1`
//! generic, `2` validation/conflicts, `4` network/offline, `6` trust
//! denial).

use botpack::cli::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins when set; --verbose turns on debug; otherwise quiet.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("off")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let code = cli.run().await;
    std::process::exit(code);
}
