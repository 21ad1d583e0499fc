use std::path::PathBuf;

use alert_config::LoggingConfig;
use anyhow::Result;
use clap::Parser;

mod cmd_replay;
mod log_macros;
mod tracing_init;

#[derive(Parser)]
#[command(name = "alert-replay", about = "Replay recorded events through a rule for manual testing")]
struct Cli {
    /// Path to a RuleOptions TOML document
    rule: PathBuf,

    /// Path to an NDJSON file of events, one JSON object per line
    events: PathBuf,

    /// Log level filter (overridden by RUST_LOG if set)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: cli.log_level.clone(),
        ..LoggingConfig::default()
    };
    tracing_init::init_tracing(&logging)?;

    cmd_replay::run(cli.rule, cli.events)
}
