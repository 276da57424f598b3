use std::fmt::{Display, Formatter};

use cultstat_core::UtcDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request identifier (UUID v4) attached to every printed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Envelope metadata. Field order is fixed to keep JSON output stable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub request_id: RequestId,
    pub command: &'static str,
    pub generated_at: UtcDateTime,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Metadata {
    pub fn new(command: &'static str, latency_ms: u64) -> Self {
        Self {
            request_id: RequestId::new_v4(),
            command,
            generated_at: UtcDateTime::now(),
            latency_ms,
            warnings: Vec::new(),
        }
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}
