use std::time::Instant;

use cultstat_core::{ConfigHandle, Coordinator};

use crate::cli::Cli;
use crate::error::CliError;

use super::{graphql_client, load_config, status_result, CommandResult};

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let config = load_config(cli)?;
    let coordinator = Coordinator::new(
        graphql_client(cli, &config),
        ConfigHandle::new(config.coordinator_config()?),
    );

    coordinator.refresh().await;
    let status = coordinator.status();

    Ok(status_result(&status, &cli.entry_id)?
        .with_latency(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)))
}
