//! Flattens a profile envelope into a [`Snapshot`].
//!
//! Every figure is read from a known path. A path that is missing or holds an
//! unexpected type yields [`MetricValue::Unavailable`](crate::MetricValue),
//! never a default.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::domain::metric_keys;
use crate::graphql::{data_field, FetchError};
use crate::{
    CreationSales, CreationStats, Metric, Money, QueryMode, SalesWindow, Slug, Snapshot,
    UtcDateTime, WINDOW_DAYS,
};

/// Base URL that relative creation links are resolved against.
pub const SITE_URL: &str = "https://cults3d.com";

/// Builds the snapshot for one profile response. Pure given `now`.
///
/// Sales metrics are only read in [`QueryMode::Full`]; under PUBLIC they are
/// published as unavailable. Featured slots whose list came back empty are
/// left out of the snapshot entirely.
///
/// # Errors
///
/// Returns a schema-class [`FetchError`] when the envelope has no `data.user`
/// object.
pub fn normalize(
    response: &Value,
    mode: QueryMode,
    username: &str,
    now: UtcDateTime,
) -> Result<Snapshot, FetchError> {
    let user = data_field(response, "user")?
        .filter(|user| user.is_object())
        .ok_or_else(|| FetchError::schema("profile response has no 'user' object"))?;

    let mut metrics = BTreeMap::new();
    metrics.insert(
        metric_keys::FOLLOWERS.to_owned(),
        count_metric(user.get("followersCount")),
    );
    metrics.insert(
        metric_keys::FOLLOWING.to_owned(),
        count_metric(user.get("followingCount")),
    );
    metrics.insert(
        metric_keys::CREATIONS.to_owned(),
        count_metric(user.get("creationsCount")),
    );
    metrics.insert(
        metric_keys::TOTAL_VIEWS.to_owned(),
        count_metric(user.get("viewsCount")),
    );

    let sales = match mode {
        QueryMode::Full => data_field(response, "myself")?
            .and_then(|myself| myself.get("salesBatch"))
            .and_then(|batch| SalesBatch::parse(batch, now)),
        QueryMode::Public => None,
    };

    match &sales {
        Some(batch) => {
            metrics.insert(
                metric_keys::TOTAL_SALES_AMOUNT.to_owned(),
                Metric::money(batch.total_amount),
            );
            metrics.insert(
                metric_keys::TOTAL_SALES_COUNT.to_owned(),
                batch.total_count.map_or_else(Metric::unavailable, Metric::count),
            );
            metrics.insert(
                metric_keys::MONTHLY_SALES_AMOUNT.to_owned(),
                Metric::money(batch.monthly_amount),
            );
            metrics.insert(
                metric_keys::MONTHLY_SALES_COUNT.to_owned(),
                Metric::count(batch.monthly_count),
            );
            if let Some(creation) = batch.most_profitable() {
                metrics.insert(
                    metric_keys::MOST_PROFITABLE.to_owned(),
                    Metric::featured(creation),
                );
            }
        }
        None => {
            for key in [
                metric_keys::TOTAL_SALES_AMOUNT,
                metric_keys::TOTAL_SALES_COUNT,
                metric_keys::MONTHLY_SALES_AMOUNT,
                metric_keys::MONTHLY_SALES_COUNT,
                metric_keys::MOST_PROFITABLE,
            ] {
                metrics.insert(key.to_owned(), Metric::unavailable());
            }
        }
    }

    for (key, field) in [
        (metric_keys::LATEST_CREATION, "latest"),
        (metric_keys::TOP_DOWNLOADED, "topDownloaded"),
    ] {
        if let Some(metric) = featured_metric(user.get(field), sales.as_ref(), now) {
            metrics.insert(key.to_owned(), metric);
        }
    }

    Ok(Snapshot {
        username: username.to_owned(),
        query_mode: mode,
        generated_at: now,
        metrics,
        tracked: Vec::new(),
    })
}

/// Reads a creation object. `None` when it has no usable name.
pub fn creation_stats(value: &Value, now: UtcDateTime) -> Option<CreationStats> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())?
        .to_owned();

    let url = string_field(value, "url").map(|url| absolute_url(&url));
    let slug = string_field(value, "slug")
        .or_else(|| url.clone())
        .and_then(|raw| Slug::parse(&raw).ok());
    let published_at = string_field(value, "publishedAt").and_then(|raw| UtcDateTime::parse(&raw).ok());

    Some(CreationStats {
        slug,
        name,
        url,
        image_url: string_field(value, "illustrationImageUrl").map(|url| absolute_url(&url)),
        views: value.get("viewsCount").and_then(Value::as_u64),
        downloads: value.get("downloadsCount").and_then(Value::as_u64),
        likes: value.get("likesCount").and_then(Value::as_u64),
        published_at,
        window: published_at.map(|published| SalesWindow::from_published(published, now)),
        sales: None,
    })
}

/// Resolves site-relative links against [`SITE_URL`].
pub fn absolute_url(url: &str) -> String {
    if url.starts_with('/') {
        format!("{SITE_URL}{url}")
    } else {
        url.to_owned()
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(str::to_owned)
}

fn count_metric(value: Option<&Value>) -> Metric {
    value
        .and_then(Value::as_u64)
        .map_or_else(Metric::unavailable, Metric::count)
}

/// `None` when the list is empty; unavailable when it is missing or malformed.
fn featured_metric(
    list: Option<&Value>,
    sales: Option<&SalesBatch>,
    now: UtcDateTime,
) -> Option<Metric> {
    let Some(items) = list.and_then(Value::as_array) else {
        return Some(Metric::unavailable());
    };
    let first = items.first()?;

    let Some(mut creation) = creation_stats(first, now) else {
        return Some(Metric::unavailable());
    };
    if let Some(batch) = sales {
        creation.sales = batch.sales_for(&creation);
    }
    Some(Metric::featured(creation))
}

/// Reduction of the FULL sales batch.
#[derive(Debug)]
struct SalesBatch {
    total_count: Option<u64>,
    total_amount: Money,
    monthly_amount: Money,
    monthly_count: u64,
    /// Per-creation totals in first-seen order.
    per_creation: Vec<(CreationStats, CreationSales)>,
}

impl SalesBatch {
    fn parse(batch: &Value, now: UtcDateTime) -> Option<Self> {
        let results = batch.get("results").and_then(Value::as_array)?;
        let window_start = now.minus_days(WINDOW_DAYS);

        let mut parsed = Self {
            total_count: batch.get("total").and_then(Value::as_u64),
            total_amount: Money::ZERO,
            monthly_amount: Money::ZERO,
            monthly_count: 0,
            per_creation: Vec::new(),
        };

        for sale in results {
            let Some(cents) = sale.pointer("/income/cents").and_then(Value::as_i64) else {
                warn!("skipping sale record without income");
                continue;
            };
            let amount = match Money::try_from_signed_cents(cents) {
                Ok(amount) => amount,
                Err(error) => {
                    warn!(cents, error = %error, "skipping sale record with negative income");
                    continue;
                }
            };

            parsed.total_amount = parsed.total_amount + amount;

            let created_at = sale
                .get("createdAt")
                .and_then(Value::as_str)
                .and_then(|raw| UtcDateTime::parse(raw).ok());
            if created_at.is_some_and(|at| window_start <= at && at <= now) {
                parsed.monthly_amount = parsed.monthly_amount + amount;
                parsed.monthly_count += 1;
            }

            if let Some(creation) = sale
                .get("creation")
                .and_then(|creation| creation_stats(creation, now))
            {
                parsed.record(creation, amount);
            }
        }

        Some(parsed)
    }

    fn record(&mut self, creation: CreationStats, amount: Money) {
        let existing = self
            .per_creation
            .iter_mut()
            .find(|(known, _)| same_creation(known, &creation));
        match existing {
            Some((_, sales)) => {
                sales.amount = sales.amount + amount;
                sales.count += 1;
            }
            None => self
                .per_creation
                .push((creation, CreationSales { amount, count: 1 })),
        }
    }

    fn sales_for(&self, creation: &CreationStats) -> Option<CreationSales> {
        self.per_creation
            .iter()
            .find(|(known, _)| same_creation(known, creation))
            .map(|(_, sales)| *sales)
    }

    /// Highest summed income; ties go to the higher count, then to the first seen.
    fn most_profitable(&self) -> Option<CreationStats> {
        let mut best: Option<&(CreationStats, CreationSales)> = None;
        for candidate in &self.per_creation {
            let better = best.map_or(true, |(_, current)| {
                (candidate.1.amount, candidate.1.count) > (current.amount, current.count)
            });
            if better {
                best = Some(candidate);
            }
        }

        best.map(|(creation, sales)| CreationStats {
            sales: Some(*sales),
            ..creation.clone()
        })
    }
}

fn same_creation(left: &CreationStats, right: &CreationStats) -> bool {
    match (&left.slug, &right.slug) {
        (Some(left), Some(right)) => left == right,
        _ => left.name == right.name,
    }
}
