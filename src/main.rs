//! Tag Sleuth command-line entry point.

use clap::Parser;
use tag_sleuth::cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let directive = if args.verbose {
        "tag_sleuth=debug"
    } else {
        "tag_sleuth=info"
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    cli::run_command(&args)
}
