//! Refresh coordinator.
//!
//! One cycle runs the profile query (with fallback), normalizes it, refreshes
//! tracked creations and publishes a new [`CoordinatorStatus`] through a
//! `watch` channel. Status is only published once a cycle has finished, so an
//! abandoned cycle leaves the previous snapshot untouched.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::fallback::{fetch_profile, ProfileError};
use crate::graphql::{FetchError, GraphqlClient};
use crate::normalizer::normalize;
use crate::queries::QuerySet;
use crate::setup::SetupError;
use crate::tracked::{refresh_tracked, MissingLookups, TrackedCreations};
use crate::{Credentials, QueryMode, Snapshot, UtcDateTime};

/// Configuration read once at the start of every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub credentials: Credentials,
    pub tracked: TrackedCreations,
    pub update_interval: Duration,
    pub queries: QuerySet,
}

impl CoordinatorConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            tracked: TrackedCreations::new(),
            update_interval: Duration::from_secs(15 * 60),
            queries: QuerySet::default(),
        }
    }
}

/// Shared, editable coordinator configuration.
///
/// Readers take a copy, so an edit made while a cycle runs applies from the
/// next cycle. Every edit bumps a revision number.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Revisioned>>,
}

#[derive(Debug)]
struct Revisioned {
    config: CoordinatorConfig,
    revision: u64,
}

impl ConfigHandle {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Revisioned {
                config,
                revision: 0,
            })),
        }
    }

    pub async fn current(&self) -> CoordinatorConfig {
        self.inner.read().await.config.clone()
    }

    /// Copy of the configuration with the revision it was read at.
    pub async fn current_with_revision(&self) -> (CoordinatorConfig, u64) {
        let guard = self.inner.read().await;
        (guard.config.clone(), guard.revision)
    }

    pub async fn replace(&self, config: CoordinatorConfig) {
        let mut guard = self.inner.write().await;
        guard.config = config;
        guard.revision += 1;
    }

    pub async fn update<F>(&self, edit: F)
    where
        F: FnOnce(&mut CoordinatorConfig),
    {
        let mut guard = self.inner.write().await;
        edit(&mut guard.config);
        guard.revision += 1;
    }
}

/// Result of the most recent completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    Success,
    /// Profile refreshed but at least one tracked lookup failed.
    Degraded,
    /// Profile query failed; the previous snapshot is kept.
    Failed,
}

/// Consumer-facing health derived from the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    /// No cycle has ever succeeded.
    NoData,
    /// A snapshot exists but the last cycle failed.
    Stale,
    Degraded,
    Healthy,
}

/// Everything consumers can observe about the coordinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorStatus {
    pub snapshot: Option<Arc<Snapshot>>,
    pub last_outcome: Option<CycleOutcome>,
    pub last_attempt_at: Option<UtcDateTime>,
    pub last_success_at: Option<UtcDateTime>,
    pub consecutive_failures: u32,
    pub last_error: Option<FetchError>,
    /// Mode of the last successful profile query.
    pub query_mode: Option<QueryMode>,
    /// Why the last cycle abandoned FULL, kept even when PUBLIC failed too.
    pub fallback_reason: Option<FetchError>,
    pub tracked_failures: usize,
    pub cycles: u64,
    /// Configuration revision the last cycle ran with.
    pub config_revision: u64,
}

impl CoordinatorStatus {
    pub fn health(&self) -> Health {
        match (&self.snapshot, self.last_outcome) {
            (None, _) => Health::NoData,
            (Some(_), Some(CycleOutcome::Failed)) => Health::Stale,
            (Some(_), Some(CycleOutcome::Degraded)) => Health::Degraded,
            (Some(_), _) => Health::Healthy,
        }
    }

    /// Authentication failure behind the last cycle, whether it ended the
    /// cycle or only forced the fallback.
    pub fn rejected_credentials(&self) -> Option<&FetchError> {
        self.last_error
            .iter()
            .chain(self.fallback_reason.as_ref())
            .find(|error| error.is_authentication())
    }

    /// Time since the last successful cycle.
    pub fn age(&self, now: UtcDateTime) -> Option<Duration> {
        self.last_success_at.map(|at| at.elapsed_until(now))
    }
}

/// Outcome of a refresh request.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshResult {
    Completed(Arc<CoordinatorStatus>),
    /// Another cycle was already in flight; this request was dropped.
    Coalesced,
}

impl RefreshResult {
    pub fn status(&self) -> Option<&Arc<CoordinatorStatus>> {
        match self {
            Self::Completed(status) => Some(status),
            Self::Coalesced => None,
        }
    }
}

type Clock = Arc<dyn Fn() -> UtcDateTime + Send + Sync>;

/// Periodic refresh driver; at most one cycle in flight.
pub struct Coordinator {
    client: GraphqlClient,
    config: ConfigHandle,
    status: watch::Sender<Arc<CoordinatorStatus>>,
    cycle_gate: Mutex<()>,
    clock: Clock,
}

impl Coordinator {
    pub fn new(client: GraphqlClient, config: ConfigHandle) -> Self {
        let (status, _) = watch::channel(Arc::new(CoordinatorStatus::default()));
        Self {
            client,
            config,
            status,
            cycle_gate: Mutex::new(()),
            clock: Arc::new(UtcDateTime::now),
        }
    }

    /// Replaces the wall clock used for windows and timestamps.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> UtcDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<CoordinatorStatus>> {
        self.status.subscribe()
    }

    pub fn status(&self) -> Arc<CoordinatorStatus> {
        Arc::clone(&self.status.borrow())
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.status.borrow().snapshot.clone()
    }

    /// Runs one cycle unless one is already running.
    pub async fn refresh(&self) -> RefreshResult {
        let Ok(_guard) = self.cycle_gate.try_lock() else {
            debug!("refresh requested while a cycle is in flight, coalescing");
            return RefreshResult::Coalesced;
        };
        RefreshResult::Completed(self.run_cycle().await)
    }

    /// Initial cycle before the coordinator is handed to consumers.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidAuth`] when the cycle failed after credentials were
    /// rejected, even if the PUBLIC attempt then failed for another reason.
    /// [`SetupError::NotReady`] for any other failure.
    pub async fn first_refresh(&self) -> Result<Arc<CoordinatorStatus>, SetupError> {
        let _guard = self.cycle_gate.lock().await;
        let status = self.run_cycle().await;

        match (&status.last_outcome, &status.last_error) {
            (Some(CycleOutcome::Failed), Some(error)) => {
                match status.rejected_credentials() {
                    Some(rejected) => Err(SetupError::InvalidAuth(rejected.clone())),
                    None => Err(SetupError::NotReady(error.clone())),
                }
            }
            _ => Ok(status),
        }
    }

    /// Refreshes on the configured interval until `shutdown` resolves.
    ///
    /// The first cycle runs immediately. Ticks missed during a slow cycle are
    /// skipped. A cycle still running at shutdown is dropped without publishing.
    pub async fn run<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut period = self.config.current().await.update_interval;
        let mut ticker = new_ticker(Instant::now(), period);
        info!(interval_secs = period.as_secs(), "coordinator started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = self.refresh() => {}
                    }
                }
            }

            let next = self.config.current().await.update_interval;
            if next != period {
                info!(interval_secs = next.as_secs(), "update interval changed");
                period = next;
                ticker = ticker_after(period);
            }
        }

        info!("coordinator stopped");
    }

    async fn run_cycle(&self) -> Arc<CoordinatorStatus> {
        let (config, revision) = self.config.current_with_revision().await;
        let now = (self.clock)();
        let previous = self.status();
        let missing = if revision == previous.config_revision {
            MissingLookups::Skip
        } else {
            MissingLookups::Retry
        };
        let username = config.credentials.username();

        let profile = match fetch_profile(&self.client, &config.queries, &config.credentials).await
        {
            Ok(fetch) => match normalize(&fetch.response, fetch.mode, username, now) {
                Ok(snapshot) => Ok((fetch, snapshot)),
                Err(error) => Err(ProfileError {
                    error,
                    fallback_reason: fetch.fallback_reason,
                }),
            },
            Err(error) => Err(error),
        };

        let next = match profile {
            Ok((fetch, mut snapshot)) => {
                let tracked = refresh_tracked(
                    &self.client,
                    &config.queries,
                    config.tracked.as_slice(),
                    previous.snapshot.as_deref(),
                    missing,
                    now,
                )
                .await;
                snapshot.tracked = tracked.entries;
                if let Some(prior) = previous.snapshot.as_deref() {
                    snapshot.carry_forward_keys(prior);
                }

                let outcome = if tracked.failures > 0 {
                    CycleOutcome::Degraded
                } else {
                    CycleOutcome::Success
                };
                info!(
                    username,
                    mode = %fetch.mode,
                    outcome = ?outcome,
                    tracked_failures = tracked.failures,
                    latency_ms = fetch.latency_ms,
                    "refresh cycle completed"
                );

                CoordinatorStatus {
                    snapshot: Some(Arc::new(snapshot)),
                    last_outcome: Some(outcome),
                    last_attempt_at: Some(now),
                    last_success_at: Some(now),
                    consecutive_failures: 0,
                    last_error: None,
                    query_mode: Some(fetch.mode),
                    fallback_reason: fetch.fallback_reason,
                    tracked_failures: tracked.failures,
                    cycles: previous.cycles + 1,
                    config_revision: revision,
                }
            }
            Err(ProfileError {
                error,
                fallback_reason,
            }) => {
                let consecutive_failures = previous.consecutive_failures.saturating_add(1);
                warn!(
                    username,
                    code = error.code(),
                    error = %error,
                    fallback = fallback_reason.as_ref().map(FetchError::code),
                    consecutive_failures,
                    "refresh cycle failed, keeping previous snapshot"
                );

                CoordinatorStatus {
                    last_outcome: Some(CycleOutcome::Failed),
                    last_attempt_at: Some(now),
                    consecutive_failures,
                    last_error: Some(error),
                    fallback_reason,
                    cycles: previous.cycles + 1,
                    ..(*previous).clone()
                }
            }
        };

        let next = Arc::new(next);
        self.status.send_replace(Arc::clone(&next));
        next
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("client", &self.client)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn new_ticker(start: Instant, period: Duration) -> tokio::time::Interval {
    let mut ticker = interval_at(start, period.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn ticker_after(period: Duration) -> tokio::time::Interval {
    new_ticker(Instant::now() + period, period)
}
