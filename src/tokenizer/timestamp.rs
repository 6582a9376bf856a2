use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to parse log timestamp '{value}'")]
pub struct TimestampError {
    pub value: String,
}

/// Parse the `%t` / `%m` timestamp Postgres writes into its log prefix.
///
/// Accepts numeric offsets (`+0100`, `-03`, `+05:30`) and zone abbreviations.
/// Abbreviations carry no offset information, so they are read as UTC.
pub fn parse_log_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let err = || TimestampError {
        value: value.to_string(),
    };

    let (local, zone) = value.rsplit_once(' ').ok_or_else(err)?;
    if zone.chars().all(|c| c.is_ascii_alphabetic()) {
        let naive =
            NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f").map_err(|_| err())?;
        return Ok(naive.and_utc());
    }

    DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %#z")
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| err())
}
