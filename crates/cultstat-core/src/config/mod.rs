//! TOML configuration.
//!
//! A minimal file only needs the nickname:
//!
//! ```toml
//! username = "alice"
//! ```
//!
//! Full example:
//!
//! ```toml
//! username = "alice"
//! api_key = "..."
//! update_interval_minutes = 15
//! tracked_creations = ["cool-gadget", "https://cults3d.com/en/3d-model/art/vase"]
//!
//! [http]
//! endpoint = "https://cults3d.com/graphql"
//! timeout_ms = 10000
//!
//! [budget]
//! requests_per_minute = 30
//!
//! [log]
//! level = "info"
//! format = "console"
//! ```
//!
//! `CULTSTAT_USERNAME` and `CULTSTAT_API_KEY` (or `CULTS3D_API_KEY`) override
//! the file when set.

mod error;
mod logging;

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};

use crate::coordinator::CoordinatorConfig;
use crate::graphql::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_MS};
use crate::queries::QuerySet;
use crate::throttling::RequestBudget;
use crate::tracked::{TrackedCreations, TrackedError};
use crate::{Credentials, Slug, ValidationError};

pub const DEFAULT_CONFIG_FILE: &str = "cultstat.toml";
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: u64 = 15;
/// Lowest accepted interval; keeps polling well under the remote rate limit.
pub const MIN_UPDATE_INTERVAL_MINUTES: u64 = 5;

pub const ENV_USERNAME: &str = "CULTSTAT_USERNAME";
pub const ENV_API_KEY: &str = "CULTSTAT_API_KEY";
pub const ENV_API_KEY_FALLBACK: &str = "CULTS3D_API_KEY";

/// Root configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub update_interval_minutes: u64,
    pub tracked_creations: Vec<String>,
    pub http: HttpConfig,
    pub budget: BudgetConfig,
    pub log: LogConfig,
    #[serde(skip_serializing_if = "QuerySet::is_default")]
    pub queries: QuerySet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            api_key: None,
            update_interval_minutes: DEFAULT_UPDATE_INTERVAL_MINUTES,
            tracked_creations: Vec::new(),
            http: HttpConfig::default(),
            budget: BudgetConfig::default(),
            log: LogConfig::default(),
            queries: QuerySet::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("update_interval_minutes", &self.update_interval_minutes)
            .field("tracked_creations", &self.tracked_creations)
            .field("http", &self.http)
            .field("budget", &self.budget)
            .field("log", &self.log)
            .field("queries", &self.queries)
            .finish()
    }
}

/// `[http]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from(DEFAULT_ENDPOINT),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// `[budget]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub requests_per_minute: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: RequestBudget::DEFAULT_REQUESTS_PER_MINUTE,
        }
    }
}

impl Config {
    /// Reads and validates a file, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::read_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a file, applies environment overrides from `lookup`, then validates.
    pub fn load<P, F>(path: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::read_unvalidated(path)?;
        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Reads a file without validating it; used when editing the file in place.
    pub fn read_unvalidated<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Environment values win over the file; empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(username) = non_empty(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(api_key) = non_empty(ENV_API_KEY).or_else(|| non_empty(ENV_API_KEY_FALLBACK)) {
            self.api_key = Some(api_key);
        }
    }

    /// Checks every field without modifying the configuration.
    pub fn validate(&self) -> Result<()> {
        self.credentials()?;
        self.tracked()?;

        if self.update_interval_minutes < MIN_UPDATE_INTERVAL_MINUTES {
            return Err(ValidationError::IntervalTooShort {
                value: self.update_interval_minutes,
                min: MIN_UPDATE_INTERVAL_MINUTES,
            }
            .into());
        }

        let endpoint = self.http.endpoint.trim();
        let has_host = endpoint
            .strip_prefix("https://")
            .or_else(|| endpoint.strip_prefix("http://"))
            .is_some_and(|rest| !rest.is_empty());
        if !has_host {
            return Err(ValidationError::InvalidEndpoint {
                value: self.http.endpoint.clone(),
            }
            .into());
        }

        if self.http.timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "http.timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.budget.requests_per_minute == 0 {
            return Err(ConfigError::invalid_value(
                "budget.requests_per_minute",
                "must be greater than zero",
            ));
        }

        Ok(())
    }

    pub fn credentials(&self) -> std::result::Result<Credentials, ValidationError> {
        Credentials::new(self.username.clone(), self.api_key.clone())
    }

    pub fn tracked(&self) -> std::result::Result<TrackedCreations, ValidationError> {
        TrackedCreations::from_identifiers(&self.tracked_creations)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes.saturating_mul(60))
    }

    pub fn request_budget(&self) -> RequestBudget {
        RequestBudget::per_minute(self.budget.requests_per_minute)
    }

    /// Per-cycle view handed to the coordinator.
    pub fn coordinator_config(&self) -> Result<CoordinatorConfig> {
        Ok(CoordinatorConfig {
            credentials: self.credentials()?,
            tracked: self.tracked()?,
            update_interval: self.update_interval(),
            queries: self.queries.clone(),
        })
    }

    /// Adds a tracked creation; the stored list is rewritten as normalized slugs.
    pub fn add_tracked(&mut self, identifier: &str) -> std::result::Result<Slug, TrackedError> {
        let mut tracked = self.tracked()?;
        let slug = tracked.add(identifier)?;
        self.store_tracked(&tracked);
        Ok(slug)
    }

    pub fn remove_tracked(&mut self, identifier: &str) -> std::result::Result<Slug, TrackedError> {
        let mut tracked = self.tracked()?;
        let slug = tracked.remove(identifier)?;
        self.store_tracked(&tracked);
        Ok(slug)
    }

    fn store_tracked(&mut self, tracked: &TrackedCreations) {
        self.tracked_creations = tracked.iter().map(ToString::to_string).collect();
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    /// Parses and validates; environment overrides are not applied.
    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_str("username = \"alice\"").expect("valid config");

        assert_eq!(config.update_interval_minutes, 15);
        assert_eq!(config.update_interval(), Duration::from_secs(900));
        assert_eq!(config.http.endpoint, "https://cults3d.com/graphql");
        assert_eq!(config.http.timeout_ms, 10_000);
        assert_eq!(config.budget.requests_per_minute, 30);
        assert!(config.api_key.is_none());
        assert!(config.queries.is_default());
    }

    #[test]
    fn rejects_short_interval() {
        let err = Config::from_str("username = \"alice\"\nupdate_interval_minutes = 2")
            .expect_err("interval below floor");
        assert!(matches!(
            err,
            ConfigError::Invalid(ValidationError::IntervalTooShort { value: 2, min: 5 })
        ));
    }

    #[test]
    fn rejects_missing_username_and_bad_endpoint() {
        assert!(matches!(
            Config::from_str("").expect_err("no username"),
            ConfigError::Invalid(ValidationError::EmptyUsername)
        ));
        assert!(matches!(
            Config::from_str("username = \"alice\"\n[http]\nendpoint = \"ftp://x\"")
                .expect_err("bad scheme"),
            ConfigError::Invalid(ValidationError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn env_overrides_win_and_fallback_key_is_used() {
        let mut config = Config::default();
        config.username = String::from("file-user");
        config.apply_env_overrides(|key| match key {
            ENV_USERNAME => Some(String::from("env-user")),
            ENV_API_KEY => Some(String::from("  ")),
            ENV_API_KEY_FALLBACK => Some(String::from("legacy-key")),
            _ => None,
        });

        assert_eq!(config.username, "env-user");
        assert_eq!(config.api_key.as_deref(), Some("legacy-key"));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = Config {
            username: String::from("alice"),
            api_key: Some(String::from("s3cret")),
            ..Config::default()
        };
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn tracked_edits_store_normalized_slugs() {
        let mut config = Config {
            username: String::from("alice"),
            tracked_creations: vec![String::from("vase")],
            ..Config::default()
        };

        let slug = config
            .add_tracked("https://cults3d.com/en/3d-model/gadget/Cool-Gadget")
            .expect("added");
        assert_eq!(slug.as_str(), "cool-gadget");
        assert_eq!(config.tracked_creations, vec!["vase", "cool-gadget"]);

        assert!(matches!(
            config.add_tracked("cool-gadget"),
            Err(TrackedError::AlreadyTracked { .. })
        ));
        config.remove_tracked("vase").expect("removed");
        assert_eq!(config.tracked_creations, vec!["cool-gadget"]);
    }
}
