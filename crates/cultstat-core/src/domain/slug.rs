use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Normalized creation slug, the last path segment of a creation URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Parse a bare slug or a creation URL and normalize it to lowercase.
    ///
    /// Query strings and fragments are dropped and percent-escapes decoded, so
    /// `https://cults3d.com/en/3d-model/gadget/Cool-Gadget?ref=home` and
    /// `cool-gadget` yield the same slug.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }

        let without_suffix = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let segment = without_suffix
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .ok_or_else(|| ValidationError::InvalidIdentifier {
                value: trimmed.to_owned(),
            })?;

        if segment.contains(':') || segment.eq_ignore_ascii_case("cults3d.com") {
            return Err(ValidationError::InvalidIdentifier {
                value: trimmed.to_owned(),
            });
        }

        let decoded = urlencoding::decode(segment).map_err(|_| {
            ValidationError::InvalidIdentifier {
                value: trimmed.to_owned(),
            }
        })?;
        let normalized = decoded.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::InvalidIdentifier {
                value: trimmed.to_owned(),
            });
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_';
            if !valid {
                return Err(ValidationError::SlugInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Slug {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Slug {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Slug> for String {
    fn from(value: Slug) -> Self {
        value.0
    }
}
