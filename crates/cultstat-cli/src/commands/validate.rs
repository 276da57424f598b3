use std::time::Instant;

use cultstat_core::{reauthenticate, validate_credentials, Config, QueryMode};
use serde_json::json;
use tracing::info;

use crate::cli::{Cli, ValidateArgs};
use crate::error::CliError;

use super::{graphql_client, load_config, CommandResult};

/// Fails with a setup error (exit 6) when the nickname or key is rejected.
///
/// With `--api-key` the replacement key is checked against the configured
/// nickname, and `--save` stores it once accepted.
pub async fn run(cli: &Cli, args: &ValidateArgs) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let config = load_config(cli)?;
    let stored = config.credentials()?;
    let client = graphql_client(cli, &config);

    let (credentials, mode) = match &args.api_key {
        Some(new_key) => {
            let credentials = reauthenticate(&client, &config.queries, &stored, new_key).await?;
            info!(username = credentials.username(), "replacement api key accepted");
            (credentials, QueryMode::Full)
        }
        None => {
            let mode = validate_credentials(&client, &config.queries, &stored).await?;
            (stored, mode)
        }
    };

    if args.save {
        let mut file = Config::read_unvalidated(&cli.config)?;
        file.api_key = credentials.api_key().map(str::to_owned);
        file.save(&cli.config)?;
        info!(config = %cli.config.display(), "api key saved");
    }

    let mut result = CommandResult::ok(json!({
        "username": credentials.username(),
        "query_mode": mode,
        "authenticated": credentials.has_api_key(),
        "reauthenticated": args.api_key.is_some(),
        "saved": args.save,
    }))
    .with_latency(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
    if !credentials.has_api_key() {
        result = result.with_warning("no api key configured; sales metrics will be unavailable");
    }
    Ok(result)
}
