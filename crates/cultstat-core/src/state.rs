//! Projection of a snapshot into host state entries.
//!
//! Each metric becomes one entry with a stable `unique_id` of the form
//! `{entry_id}_{key}`; tracked creations become `tracked_{slug}` entries.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::metric_keys;
use crate::{CreationStats, Metric, MetricValue, Money, Snapshot, TrackedEntry};

pub const ATTRIBUTION: &str = "Data provided by Cults3D";
pub const MANUFACTURER: &str = "Cults3D";
pub const MODEL: &str = "Creator Profile";

/// Device grouping all entries of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub configuration_url: String,
}

impl DeviceInfo {
    pub fn for_account(entry_id: &str, username: &str) -> Self {
        Self {
            identifier: entry_id.to_owned(),
            name: format!("Cults3D ({username})"),
            manufacturer: MANUFACTURER,
            model: MODEL,
            configuration_url: format!("https://cults3d.com/en/users/{username}"),
        }
    }
}

/// One named value published to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateEntry {
    pub unique_id: String,
    pub key: String,
    /// `null` when unavailable.
    pub value: Value,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    pub attributes: BTreeMap<String, Value>,
}

/// Host-facing view of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateProjection {
    pub device: DeviceInfo,
    pub attribution: &'static str,
    pub entries: Vec<StateEntry>,
}

impl Snapshot {
    /// Metric entries in key order, followed by tracked entries in list order.
    pub fn state_entries(&self, entry_id: &str) -> StateProjection {
        let mut entries = self
            .metrics
            .iter()
            .map(|(key, metric)| metric_entry(entry_id, key, metric))
            .collect::<Vec<_>>();
        entries.extend(self.tracked.iter().map(|entry| tracked_entry(entry_id, entry)));

        StateProjection {
            device: DeviceInfo::for_account(entry_id, &self.username),
            attribution: ATTRIBUTION,
            entries,
        }
    }
}

impl StateProjection {
    pub fn entry(&self, key: &str) -> Option<&StateEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }
}

fn metric_entry(entry_id: &str, key: &str, metric: &Metric) -> StateEntry {
    let (value, unit) = match &metric.value {
        MetricValue::Count(count) => (json!(count), None),
        MetricValue::Money(amount) => (money_value(*amount), Some(Money::CURRENCY)),
        MetricValue::Text(text) => (json!(text), None),
        MetricValue::Unavailable => (Value::Null, None),
    };

    StateEntry {
        unique_id: format!("{entry_id}_{key}"),
        key: key.to_owned(),
        value,
        available: metric.is_available(),
        unit,
        attributes: metric
            .creation
            .as_ref()
            .map(creation_attributes)
            .unwrap_or_default(),
    }
}

fn tracked_entry(entry_id: &str, entry: &TrackedEntry) -> StateEntry {
    let key = format!("{}{}", metric_keys::TRACKED_PREFIX, entry.slug);
    let mut attributes = entry
        .stats
        .as_ref()
        .map(creation_attributes)
        .unwrap_or_default();
    attributes.insert(String::from("slug"), json!(entry.slug.as_str()));
    attributes.insert(String::from("stale"), json!(entry.stale));
    if let Some(at) = entry.last_success_at {
        attributes.insert(String::from("last_success_at"), json!(at.format_rfc3339()));
    }
    if let Some(error) = &entry.last_error {
        attributes.insert(String::from("last_error"), json!(error.code()));
    }

    StateEntry {
        unique_id: format!("{entry_id}_{key}"),
        key,
        value: entry
            .stats
            .as_ref()
            .and_then(|stats| stats.views)
            .map_or(Value::Null, |views| json!(views)),
        available: entry.stats.is_some(),
        unit: None,
        attributes,
    }
}

fn creation_attributes(creation: &CreationStats) -> BTreeMap<String, Value> {
    let mut attributes = BTreeMap::new();
    let mut put = |name: &str, value: Option<Value>| {
        if let Some(value) = value {
            attributes.insert(name.to_owned(), value);
        }
    };

    put("name", Some(json!(creation.name)));
    put("url", creation.url.as_ref().map(|url| json!(url)));
    put("image_url", creation.image_url.as_ref().map(|url| json!(url)));
    put("views", creation.views.map(|views| json!(views)));
    put("downloads", creation.downloads.map(|downloads| json!(downloads)));
    put("likes", creation.likes.map(|likes| json!(likes)));
    put(
        "published_at",
        creation.published_at.map(|at| json!(at.format_rfc3339())),
    );
    if let Some(window) = creation.window {
        put("window_start", Some(json!(window.window_start.date_string())));
        put("window_end", Some(json!(window.window_end.date_string())));
        put(
            "is_within_30_day_window",
            Some(json!(window.is_within_30_day_window)),
        );
    }
    if let Some(sales) = creation.sales {
        put("sales_amount", Some(money_value(sales.amount)));
        put("sales_count", Some(json!(sales.count)));
    }

    attributes
}

fn money_value(amount: Money) -> Value {
    json!(amount.as_decimal())
}
