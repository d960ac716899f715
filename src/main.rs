//! This is the main entry point for anchorchat.

use anchorchat::cli;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

fn main() {
    // stdout carries the streamed reply, so logs go to stderr
    let filter = EnvFilter::try_from_env("ANCHORCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::parse(None) {
        eprintln!("{} {e:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
