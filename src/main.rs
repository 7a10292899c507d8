use clap::Parser;
use stagecopy::config::Cli;
use stagecopy::Config;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Convert CLI args to Config - this validates immediately
    let config = Config::try_from(cli)?;
    tracing::info!(version = stagecopy::VERSION, source = ?config.source, destination = ?config.destination, "starting");

    stagecopy::commands::sync::run(config)?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise `-v` picks the level
fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
