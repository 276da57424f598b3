use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::graphql::FetchError;
use crate::{Money, Slug, UtcDateTime, ValidationError};

/// Length of the rolling window used for sales totals and per-creation windows.
pub const WINDOW_DAYS: i64 = 30;

/// Stable metric keys published in every snapshot.
pub mod metric_keys {
    pub const FOLLOWERS: &str = "followers";
    pub const FOLLOWING: &str = "following";
    pub const CREATIONS: &str = "creations";
    pub const TOTAL_VIEWS: &str = "total_views";
    pub const TOTAL_SALES_AMOUNT: &str = "total_sales_amount";
    pub const TOTAL_SALES_COUNT: &str = "total_sales_count";
    pub const MONTHLY_SALES_AMOUNT: &str = "monthly_sales_amount";
    pub const MONTHLY_SALES_COUNT: &str = "monthly_sales_count";
    pub const LATEST_CREATION: &str = "latest_creation";
    pub const TOP_DOWNLOADED: &str = "top_downloaded";
    pub const MOST_PROFITABLE: &str = "most_profitable";

    /// Prefix of the per-tracked-creation keys in the host projection.
    pub const TRACKED_PREFIX: &str = "tracked_";
}

/// Account credentials. The API key is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    api_key: Option<String>,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ValidationError> {
        let username = username.into().trim().to_owned();
        if username.is_empty() {
            return Err(ValidationError::EmptyUsername);
        }

        let api_key = match api_key {
            Some(key) if key.trim().is_empty() => return Err(ValidationError::BlankApiKey),
            Some(key) => Some(key.trim().to_owned()),
            None => None,
        };

        Ok(Self { username, api_key })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Same account with a replacement key, used by reauthentication.
    pub fn with_api_key(&self, api_key: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(self.username.clone(), Some(api_key.into()))
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Which query variant produced a profile response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    Full,
    Public,
}

impl QueryMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Public => "public",
        }
    }
}

impl Display for QueryMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thirty-day window that opens at publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SalesWindow {
    pub window_start: UtcDateTime,
    pub window_end: UtcDateTime,
    pub is_within_30_day_window: bool,
}

impl SalesWindow {
    pub fn from_published(published_at: UtcDateTime, now: UtcDateTime) -> Self {
        let window_start = published_at;
        let window_end = published_at.plus_days(WINDOW_DAYS);
        Self {
            window_start,
            window_end,
            is_within_30_day_window: window_start <= now && now <= window_end,
        }
    }
}

/// Sales attributed to one creation within the fetched sales batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreationSales {
    pub amount: Money,
    pub count: u64,
}

/// Public statistics of one creation, plus sales when the owner is authenticated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreationStats {
    pub slug: Option<Slug>,
    pub name: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub views: Option<u64>,
    pub downloads: Option<u64>,
    pub likes: Option<u64>,
    pub published_at: Option<UtcDateTime>,
    pub window: Option<SalesWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales: Option<CreationSales>,
}

/// Typed value of a metric.
///
/// `Unavailable` means the remote did not provide the figure; it is never a
/// stand-in for zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Count(u64),
    Money(Money),
    Text(String),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub value: MetricValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation: Option<CreationStats>,
}

impl Metric {
    pub fn count(value: u64) -> Self {
        Self {
            value: MetricValue::Count(value),
            creation: None,
        }
    }

    pub fn money(value: Money) -> Self {
        Self {
            value: MetricValue::Money(value),
            creation: None,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            value: MetricValue::Unavailable,
            creation: None,
        }
    }

    pub fn featured(creation: CreationStats) -> Self {
        Self {
            value: MetricValue::Text(creation.name.clone()),
            creation: Some(creation),
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.value, MetricValue::Unavailable)
    }
}

/// State of one tracked creation inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedEntry {
    pub slug: Slug,
    pub display_name: String,
    pub stats: Option<CreationStats>,
    /// Set when this cycle's lookup failed and `stats` comes from an earlier cycle.
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<FetchError>,
    pub last_success_at: Option<UtcDateTime>,
}

/// Normalized result of one successful refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub username: String,
    pub query_mode: QueryMode,
    pub generated_at: UtcDateTime,
    pub metrics: BTreeMap<String, Metric>,
    pub tracked: Vec<TrackedEntry>,
}

impl Snapshot {
    pub fn metric(&self, key: &str) -> Option<&Metric> {
        self.metrics.get(key)
    }

    pub fn tracked_entry(&self, slug: &Slug) -> Option<&TrackedEntry> {
        self.tracked.iter().find(|entry| &entry.slug == slug)
    }

    /// Re-adds every key of `previous` missing from `self` as unavailable, so a
    /// metric never disappears once it has been published.
    pub fn carry_forward_keys(&mut self, previous: &Snapshot) {
        for key in previous.metrics.keys() {
            self.metrics
                .entry(key.clone())
                .or_insert_with(Metric::unavailable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_api_key() {
        let credentials =
            Credentials::new("alice", Some(String::from("secret-key"))).expect("valid");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn credentials_reject_blank_values() {
        assert!(matches!(
            Credentials::new("  ", None).expect_err("must fail"),
            ValidationError::EmptyUsername
        ));
        assert!(matches!(
            Credentials::new("alice", Some(String::from(" "))).expect_err("must fail"),
            ValidationError::BlankApiKey
        ));
    }

    #[test]
    fn window_spans_thirty_days_from_publication() {
        let published = UtcDateTime::parse("2024-01-01").expect("valid");
        let inside = UtcDateTime::parse("2024-01-15T12:00:00Z").expect("valid");
        let outside = UtcDateTime::parse("2024-02-01").expect("valid");

        let window = SalesWindow::from_published(published, inside);
        assert_eq!(window.window_start.date_string(), "2024-01-01");
        assert_eq!(window.window_end.date_string(), "2024-01-31");
        assert!(window.is_within_30_day_window);

        assert!(!SalesWindow::from_published(published, outside).is_within_30_day_window);
        assert!(SalesWindow::from_published(published, published.plus_days(30)).is_within_30_day_window);
    }

    #[test]
    fn carry_forward_marks_vanished_keys_unavailable() {
        let mut previous_metrics = BTreeMap::new();
        previous_metrics.insert(String::from(metric_keys::TOTAL_VIEWS), Metric::count(10));
        let previous = Snapshot {
            username: String::from("alice"),
            query_mode: QueryMode::Full,
            generated_at: UtcDateTime::now(),
            metrics: previous_metrics,
            tracked: Vec::new(),
        };

        let mut current = Snapshot {
            metrics: BTreeMap::new(),
            query_mode: QueryMode::Public,
            ..previous.clone()
        };
        current.carry_forward_keys(&previous);

        let metric = current
            .metric(metric_keys::TOTAL_VIEWS)
            .expect("key must survive");
        assert!(!metric.is_available());
    }
}
