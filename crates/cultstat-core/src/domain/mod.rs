//! # Domain Models
//!
//! Canonical types for creator statistics.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Credentials`] | Nickname plus optional API key |
//! | [`QueryMode`] | FULL (authenticated) or PUBLIC query variant |
//! | [`Snapshot`] | One cycle's complete, immutable metric set |
//! | [`Metric`] | Typed metric value with optional creation details |
//! | [`CreationStats`] | Public counters and 30-day window of a creation |
//! | [`TrackedEntry`] | Per-tracked-creation state, possibly stale |
//! | [`Slug`] | Normalized creation identifier |
//! | [`Money`] | Non-negative euro amount in cents |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! ## Validation
//!
//! Identifiers and credentials are validated at construction:
//!
//! ```rust
//! use cultstat_core::{Slug, ValidationError};
//!
//! let slug = Slug::parse("https://cults3d.com/en/3d-model/gadget/cool-gadget").unwrap();
//! assert_eq!(slug.as_str(), "cool-gadget");
//!
//! assert!(matches!(Slug::parse(""), Err(ValidationError::EmptyIdentifier)));
//! ```

mod models;
mod money;
mod slug;
mod timestamp;

pub use models::{
    metric_keys, CreationSales, CreationStats, Credentials, Metric, MetricValue, QueryMode,
    SalesWindow, Snapshot, TrackedEntry, WINDOW_DAYS,
};
pub use money::Money;
pub use slug::Slug;
pub use timestamp::UtcDateTime;
