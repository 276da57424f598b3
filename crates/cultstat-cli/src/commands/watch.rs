use std::sync::Arc;

use cultstat_core::{ConfigHandle, Coordinator, CoordinatorStatus};
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::{Cli, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::{graphql_client, load_config, status_result, CommandResult};

/// Prints one envelope per completed cycle, then a summary on exit.
pub async fn run(cli: &Cli, args: &WatchArgs) -> Result<CommandResult, CliError> {
    let config = load_config(cli)?;
    let coordinator = Coordinator::new(
        graphql_client(cli, &config),
        ConfigHandle::new(config.coordinator_config()?),
    );
    let updates = coordinator.subscribe();

    tokio::select! {
        () = coordinator.run(interrupted()) => {}
        result = print_updates(updates, cli, args.cycles) => result?,
    }

    let status = coordinator.status();
    Ok(CommandResult::ok(json!({
        "cycles": status.cycles,
        "health": status.health(),
        "consecutive_failures": status.consecutive_failures,
    })))
}

async fn print_updates(
    mut updates: watch::Receiver<Arc<CoordinatorStatus>>,
    cli: &Cli,
    limit: Option<u64>,
) -> Result<(), CliError> {
    let mut printed = 0_u64;
    while updates.changed().await.is_ok() {
        let status = Arc::clone(&updates.borrow_and_update());
        let (envelope, _) = status_result(&status, &cli.entry_id)?.into_envelope("watch");
        output::render(&envelope, cli.format, cli.pretty)?;

        printed += 1;
        if limit.is_some_and(|limit| printed >= limit) {
            info!(cycles = printed, "cycle limit reached");
            break;
        }
    }
    Ok(())
}

async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received, stopping"),
        Err(error) => {
            warn!(error = %error, "cannot listen for ctrl-c, running until the cycle limit");
            std::future::pending::<()>().await;
        }
    }
}
