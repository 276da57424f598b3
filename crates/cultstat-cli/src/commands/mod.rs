mod fetch;
mod tracked;
mod validate;
mod watch;

use std::sync::Arc;

use cultstat_core::{
    Config, CoordinatorStatus, CycleOutcome, DeviceInfo, FetchError, GraphqlClient, Health,
    HttpClient, QueryMode, ReqwestHttpClient, StateEntry, UtcDateTime,
};
use serde::Serialize;
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::Metadata;
use crate::mock::{demo_config, FixtureHttpClient};
use crate::output::{Envelope, EnvelopeError};

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
    /// The command ran but its refresh cycle failed (exit code 3).
    pub failed: bool,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            failed: false,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn into_envelope(self, command: &'static str) -> (Envelope, bool) {
        let mut meta = Metadata::new(command, self.latency_ms);
        for warning in self.warnings {
            meta.push_warning(warning);
        }
        (
            Envelope {
                meta,
                data: self.data,
                errors: self.errors,
            },
            self.failed,
        )
    }
}

pub async fn run(cli: &Cli) -> Result<(Envelope, bool), CliError> {
    let (name, result) = match &cli.command {
        Command::Fetch => ("fetch", fetch::run(cli).await?),
        Command::Watch(args) => ("watch", watch::run(cli, args).await?),
        Command::Validate(args) => ("validate", validate::run(cli, args).await?),
        Command::Tracked(args) => ("tracked", tracked::run(cli, args)?),
    };

    Ok(result.into_envelope(name))
}

/// Loads the config file with environment overrides. `--mock` without a file
/// falls back to the demo account.
pub(crate) fn load_config(cli: &Cli) -> Result<Config, CliError> {
    if cli.mock && !cli.config.exists() {
        return Ok(demo_config());
    }
    Ok(Config::load(&cli.config, |key| std::env::var(key).ok())?)
}

pub(crate) fn graphql_client(cli: &Cli, config: &Config) -> GraphqlClient {
    let http: Arc<dyn HttpClient> = if cli.mock {
        Arc::new(FixtureHttpClient::new())
    } else {
        match &config.http.user_agent {
            Some(user_agent) => Arc::new(ReqwestHttpClient::with_user_agent(user_agent)),
            None => Arc::new(ReqwestHttpClient::new()),
        }
    };

    GraphqlClient::new(http)
        .with_endpoint(config.http.endpoint.clone())
        .with_timeout(config.http.timeout())
        .with_budget(config.request_budget())
}

/// Serialized coordinator status plus the host projection of its snapshot.
#[derive(Debug, Serialize)]
pub(crate) struct StatusReport<'a> {
    pub health: Health,
    pub outcome: Option<CycleOutcome>,
    pub query_mode: Option<QueryMode>,
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub tracked_failures: usize,
    pub last_attempt_at: Option<UtcDateTime>,
    pub last_success_at: Option<UtcDateTime>,
    pub age_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<&'a FetchError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<&'static str>,
    pub entries: Vec<StateEntry>,
}

pub(crate) fn status_result(
    status: &CoordinatorStatus,
    entry_id: &str,
) -> Result<CommandResult, CliError> {
    let projection = status
        .snapshot
        .as_ref()
        .map(|snapshot| snapshot.state_entries(entry_id));
    let (device, attribution, entries) = match projection {
        Some(projection) => (
            Some(projection.device),
            Some(projection.attribution),
            projection.entries,
        ),
        None => (None, None, Vec::new()),
    };

    let report = StatusReport {
        health: status.health(),
        outcome: status.last_outcome,
        query_mode: status.query_mode,
        cycles: status.cycles,
        consecutive_failures: status.consecutive_failures,
        tracked_failures: status.tracked_failures,
        last_attempt_at: status.last_attempt_at,
        last_success_at: status.last_success_at,
        age_secs: status.age(UtcDateTime::now()).map(|age| age.as_secs()),
        fallback_reason: status.fallback_reason.as_ref(),
        device,
        attribution,
        entries,
    };

    let mut result = CommandResult::ok(serde_json::to_value(report)?);
    let failed = matches!(status.last_outcome, Some(CycleOutcome::Failed));
    match (&status.fallback_reason, status.rejected_credentials()) {
        (_, Some(rejected)) if failed => {
            result = result.with_warning(format!(
                "api key was rejected ({}); update it with `validate --api-key`",
                rejected.code()
            ));
        }
        (Some(reason), _) if !failed => {
            result = result.with_warning(format!(
                "authenticated query failed ({}), showing public data only",
                reason.code()
            ));
        }
        _ => {}
    }
    if status.tracked_failures > 0 {
        result = result.with_warning(format!(
            "{} tracked creation lookup(s) failed",
            status.tracked_failures
        ));
    }
    if let Some(error) = &status.last_error {
        result.errors.push(EnvelopeError::from(error));
    }
    result.failed = failed;

    Ok(result)
}
