//! Core contracts for cultstat.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - GraphQL transport, query documents and the FULL/PUBLIC fallback selector
//! - Response normalization into snapshots
//! - Tracked-creation lookups
//! - The refresh coordinator and its configuration
//! - Host state projection

pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod fallback;
pub mod graphql;
pub mod http_client;
pub mod normalizer;
pub mod queries;
pub mod setup;
pub mod state;
pub mod throttling;
pub mod tracked;

pub use config::{
    BudgetConfig, Config, ConfigError, HttpConfig, LogConfig, LogFormat, LogLevel,
    DEFAULT_CONFIG_FILE,
};
pub use coordinator::{
    ConfigHandle, Coordinator, CoordinatorConfig, CoordinatorStatus, CycleOutcome, Health,
    RefreshResult,
};
pub use domain::{
    metric_keys, CreationSales, CreationStats, Credentials, Metric, MetricValue, Money,
    QueryMode, SalesWindow, Slug, Snapshot, TrackedEntry, UtcDateTime, WINDOW_DAYS,
};
pub use error::ValidationError;
pub use fallback::{fetch_profile, ProfileError, ProfileFetch};
pub use graphql::{FetchError, FetchErrorKind, GraphqlClient};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient,
};
pub use normalizer::normalize;
pub use queries::QuerySet;
pub use setup::{reauthenticate, validate_credentials, SetupError};
pub use state::{DeviceInfo, StateEntry, StateProjection, ATTRIBUTION};
pub use throttling::RequestBudget;
pub use tracked::{refresh_tracked, TrackedCreations, TrackedError, TrackedRefresh};
