use std::process::ExitCode;

use clap::Parser;
use herald::{Config, cli::Cli};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    herald_common::logging::init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    config.pool = config.pool.with_overrides(|name| std::env::var(name).ok())?;

    let outcome = cli.run(config).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(if outcome.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
