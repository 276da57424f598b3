//! User-managed list of tracked creations and their per-cycle lookups.

use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::graphql::{data_field, FetchError, FetchErrorKind, GraphqlClient};
use crate::normalizer::creation_stats;
use crate::queries::QuerySet;
use crate::{SalesWindow, Slug, Snapshot, TrackedEntry, UtcDateTime, ValidationError};

/// Errors returned when editing the tracked list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackedError {
    #[error(transparent)]
    InvalidIdentifier(#[from] ValidationError),
    #[error("creation '{slug}' is already tracked")]
    AlreadyTracked { slug: Slug },
    #[error("creation '{slug}' is not tracked")]
    NotTracked { slug: Slug },
}

/// Ordered tracked identifiers, deduplicated by normalized slug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedCreations {
    slugs: Vec<Slug>,
}

impl TrackedCreations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every identifier; later duplicates of a slug are dropped.
    pub fn from_identifiers<I, S>(identifiers: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tracked = Self::new();
        for identifier in identifiers {
            let slug = Slug::parse(identifier.as_ref())?;
            if !tracked.contains(&slug) {
                tracked.slugs.push(slug);
            }
        }
        Ok(tracked)
    }

    /// Adds a slug or creation URL at the end of the list.
    pub fn add(&mut self, identifier: &str) -> Result<Slug, TrackedError> {
        let slug = Slug::parse(identifier)?;
        if self.contains(&slug) {
            return Err(TrackedError::AlreadyTracked { slug });
        }
        self.slugs.push(slug.clone());
        Ok(slug)
    }

    pub fn remove(&mut self, identifier: &str) -> Result<Slug, TrackedError> {
        let slug = Slug::parse(identifier)?;
        let position = self
            .slugs
            .iter()
            .position(|known| known == &slug)
            .ok_or_else(|| TrackedError::NotTracked { slug: slug.clone() })?;
        Ok(self.slugs.remove(position))
    }

    pub fn contains(&self, slug: &Slug) -> bool {
        self.slugs.contains(slug)
    }

    pub fn as_slice(&self) -> &[Slug] {
        &self.slugs
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slug> {
        self.slugs.iter()
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

/// Result of one cycle's tracked lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRefresh {
    /// One entry per tracked slug, in list order.
    pub entries: Vec<TrackedEntry>,
    pub failures: usize,
}

/// Whether creations that came back as not found are looked up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingLookups {
    /// Keep the stale entry without a request.
    Skip,
    /// The tracked list changed since they failed; ask again.
    Retry,
}

/// Looks up every tracked creation, one query each, sequentially.
///
/// Lookups are unauthenticated and never ask for sales. A failed lookup keeps
/// the entry from `previous` (window recomputed against `now`) and marks it
/// stale; it never affects the other entries. An entry whose last lookup was
/// not found is not queried again under [`MissingLookups::Skip`].
pub async fn refresh_tracked(
    client: &GraphqlClient,
    queries: &QuerySet,
    slugs: &[Slug],
    previous: Option<&Snapshot>,
    missing: MissingLookups,
    now: UtcDateTime,
) -> TrackedRefresh {
    let document = queries.creation();
    let mut entries = Vec::with_capacity(slugs.len());
    let mut failures = 0;

    for slug in slugs {
        let prior = previous.and_then(|snapshot| snapshot.tracked_entry(slug));
        let known_missing = prior
            .and_then(|entry| entry.last_error.as_ref())
            .is_some_and(|error| error.kind() == FetchErrorKind::NotFound);
        if known_missing && missing == MissingLookups::Skip {
            if let Some(entry) = prior {
                debug!(slug = %slug, "tracked creation not found earlier, skipping lookup");
                failures += 1;
                entries.push(carried_entry(entry, now));
                continue;
            }
        }

        match lookup(client, &document, slug, now).await {
            Ok(stats) => {
                debug!(slug = %slug, "tracked creation refreshed");
                entries.push(TrackedEntry {
                    slug: slug.clone(),
                    display_name: stats.name.clone(),
                    stats: Some(stats),
                    stale: false,
                    last_error: None,
                    last_success_at: Some(now),
                });
            }
            Err(error) => {
                warn!(slug = %slug, code = error.code(), error = %error, "tracked creation lookup failed");
                failures += 1;
                entries.push(stale_entry(slug, prior, error, now));
            }
        }
    }

    TrackedRefresh { entries, failures }
}

async fn lookup(
    client: &GraphqlClient,
    document: &str,
    slug: &Slug,
    now: UtcDateTime,
) -> Result<crate::CreationStats, FetchError> {
    let response = client
        .execute(document, json!({ "slug": slug.as_str() }), None)
        .await?;
    let creation = data_field(&response, "creation")?
        .ok_or_else(|| FetchError::not_found(format!("creation '{slug}' not found")))?;

    let mut stats = creation_stats(creation, now)
        .ok_or_else(|| FetchError::schema(format!("creation '{slug}' has no name")))?;
    stats.slug = Some(slug.clone());
    stats.sales = None;
    Ok(stats)
}

/// Previous stale entry with its window moved to `now`.
fn carried_entry(entry: &TrackedEntry, now: UtcDateTime) -> TrackedEntry {
    let mut entry = entry.clone();
    if let Some(stats) = entry.stats.as_mut() {
        stats.window = stats
            .published_at
            .map(|published| SalesWindow::from_published(published, now));
    }
    entry
}

fn stale_entry(
    slug: &Slug,
    prior: Option<&TrackedEntry>,
    error: FetchError,
    now: UtcDateTime,
) -> TrackedEntry {
    let stats = prior.and_then(|entry| entry.stats.clone()).map(|mut stats| {
        stats.window = stats
            .published_at
            .map(|published| SalesWindow::from_published(published, now));
        stats
    });

    TrackedEntry {
        slug: slug.clone(),
        display_name: prior.map_or_else(|| slug.to_string(), |entry| entry.display_name.clone()),
        stats,
        stale: true,
        last_error: Some(error),
        last_success_at: prior.and_then(|entry| entry.last_success_at),
    }
}
