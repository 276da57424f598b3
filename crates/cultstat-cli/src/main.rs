mod cli;
mod commands;
mod error;
mod logging;
mod metadata;
mod mock;
mod output;

use clap::Parser;
use cultstat_core::Config;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let log_config = Config::read_unvalidated(&cli.config)
        .map(|config| config.log)
        .unwrap_or_default();
    logging::init(cli.log_level.as_deref(), log_config)?;

    let (envelope, failed) = commands::run(&cli).await?;
    output::render(&envelope, cli.format, cli.pretty)?;

    if failed {
        return Ok(ExitCode::from(3));
    }

    Ok(ExitCode::SUCCESS)
}
