use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// Timestamp normalized to UTC.
///
/// The remote API reports publication and sale dates either as RFC3339 with an
/// arbitrary offset or as a bare calendar date; both are folded into UTC here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
            return Ok(Self::from_offset_datetime(parsed));
        }

        let date = Date::parse(trimmed, format_description!("[year]-[month]-[day]")).map_err(
            |_| ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            },
        )?;
        Ok(Self(date.midnight().assume_utc()))
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn plus_days(self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    pub fn minus_days(self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Elapsed time from `self` to `later`, zero when `later` is earlier.
    pub fn elapsed_until(self, later: Self) -> std::time::Duration {
        let delta = later.0 - self.0;
        std::time::Duration::try_from(delta).unwrap_or_default()
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }

    /// Calendar date in `YYYY-MM-DD` form.
    pub fn date_string(self) -> String {
        let date = self.0.date();
        format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        )
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn folds_offset_timestamps_into_utc() {
        let parsed = UtcDateTime::parse("2024-01-01T01:30:00+01:00").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:30:00Z");
    }

    #[test]
    fn parses_bare_dates_as_midnight() {
        let parsed = UtcDateTime::parse("2024-01-01").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
        assert_eq!(parsed.plus_days(30).date_string(), "2024-01-31");
    }

    #[test]
    fn rejects_garbage() {
        let err = UtcDateTime::parse("last tuesday").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidTimestamp { .. }));
    }

    #[test]
    fn elapsed_until_saturates_at_zero() {
        let earlier = UtcDateTime::parse("2024-01-01").expect("valid");
        let later = earlier.plus_days(1);
        assert_eq!(
            earlier.elapsed_until(later),
            std::time::Duration::from_secs(86_400)
        );
        assert_eq!(later.elapsed_until(earlier), std::time::Duration::ZERO);
    }
}
