use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("'{0}' is not a valid date")]
    Unparsable(String),
    #[error("{0} is in the future")]
    FutureDate(String),
}

/// Per-field picker configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatePolicy {
    pub disable_future_dates: bool,
}

impl DatePolicy {
    pub fn new(disable_future_dates: bool) -> Self {
        Self {
            disable_future_dates,
        }
    }

    /// Normalizes a picked date for storage.
    ///
    /// Empty input means "no date" and stores nothing. With
    /// `disable_future_dates` set, anything strictly after `now` is rejected.
    pub fn select(&self, raw: &str, now: DateTime<Utc>) -> Result<Option<String>, DateError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let instant = parse_date(raw)?;
        self.check(instant, now)?;
        Ok(Some(to_iso_string(instant)))
    }

    pub fn check(&self, instant: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), DateError> {
        if self.disable_future_dates && instant > now {
            return Err(DateError::FutureDate(to_iso_string(instant)));
        }
        Ok(())
    }
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or an RFC 3339 date-time.
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, DateError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|_| DateError::Unparsable(trimmed.to_string()))
}

/// `YYYY-MM-DDTHH:MM:SS.sssZ`, the platform ISO form stored in answers.
pub fn to_iso_string(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
