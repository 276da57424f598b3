//! GraphQL documents sent to the remote API.
//!
//! The remote schema has shifted between releases (sort enums, view and sales
//! fields), so every document can be replaced from configuration through
//! [`QuerySet`]. The normalizer treats missing fields as unavailable, so a
//! trimmed override degrades metrics instead of failing the cycle.

use serde::{Deserialize, Serialize};

/// Upper bound on sale records requested per cycle. The 30-day reduction is
/// done client-side over this batch.
pub const SALES_BATCH_LIMIT: u32 = 500;

const CREATION_FIELDS: &str = r#"
fragment CreationFields on Creation {
  slug
  name
  url
  illustrationImageUrl
  viewsCount
  downloadsCount
  likesCount
  publishedAt
}
"#;

/// Profile plus the authenticated `myself` sales batch.
pub const FULL_QUERY: &str = r#"
query CreatorFull($nick: String!, $salesLimit: Int!) {
  user(nick: $nick) {
    nick
    followersCount
    followingCount
    creationsCount
    viewsCount
    latest: creations(limit: 1, sort: BY_PUBLICATION, direction: DESC) {
      ...CreationFields
    }
    topDownloaded: creations(limit: 1, sort: BY_DOWNLOADS, direction: DESC) {
      ...CreationFields
    }
  }
  myself {
    salesBatch(limit: $salesLimit) {
      total
      results {
        createdAt
        income(currency: EUR) {
          cents
        }
        creation {
          ...CreationFields
        }
      }
    }
  }
}
"#;

/// Profile only; no sales, no totals that require ownership.
pub const PUBLIC_QUERY: &str = r#"
query CreatorPublic($nick: String!) {
  user(nick: $nick) {
    nick
    followersCount
    followingCount
    creationsCount
    latest: creations(limit: 1, sort: BY_PUBLICATION, direction: DESC) {
      ...CreationFields
    }
    topDownloaded: creations(limit: 1, sort: BY_DOWNLOADS, direction: DESC) {
      ...CreationFields
    }
  }
}
"#;

/// Public proxy metrics of a single creation. Never asks for sales.
pub const CREATION_QUERY: &str = r#"
query TrackedCreation($slug: String!) {
  creation(slug: $slug) {
    ...CreationFields
  }
}
"#;

/// Minimal authenticated probe used by setup and reauthentication.
pub const VALIDATION_QUERY: &str = r#"
query ValidateAuth($nick: String!) {
  user(nick: $nick) {
    nick
  }
  myself {
    user {
      nick
    }
  }
}
"#;

/// Minimal probe for accounts configured without an API key.
pub const PUBLIC_VALIDATION_QUERY: &str = r#"
query ValidateUser($nick: String!) {
  user(nick: $nick) {
    nick
  }
}
"#;

/// Query documents in use, defaults unless overridden in `[queries]`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation: Option<String>,
}

impl QuerySet {
    pub fn full(&self) -> String {
        resolve(self.full.as_deref(), FULL_QUERY)
    }

    pub fn public(&self) -> String {
        resolve(self.public.as_deref(), PUBLIC_QUERY)
    }

    pub fn creation(&self) -> String {
        resolve(self.creation.as_deref(), CREATION_QUERY)
    }

    pub fn validation(&self, authenticated: bool) -> String {
        if authenticated {
            resolve(None, VALIDATION_QUERY)
        } else {
            resolve(None, PUBLIC_VALIDATION_QUERY)
        }
    }

    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

/// Appends the shared fragment when the document references it.
fn resolve(custom: Option<&str>, default: &str) -> String {
    let document = custom
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(default);
    if document.contains("...CreationFields") && !document.contains("fragment CreationFields") {
        format!("{}\n{}", document.trim(), CREATION_FIELDS.trim())
    } else {
        document.trim().to_owned()
    }
}
