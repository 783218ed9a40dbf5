//! Binary crate for the `places` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration and address picking
//! - Human-friendly output formatting

use clap::Parser;

mod cli;
mod tracer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    tracer::init_once_with_level_int(cmd.verbose);
    cmd.run().await
}
