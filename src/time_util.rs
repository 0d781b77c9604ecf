// SPDX-License-Identifier: GPL-3.0-or-later

//! Time stamp handling shared across the HTTPS and streaming transports.
//!
//! The broker's HTTPS API reports most time stamps as RFC3339 strings in
//! UTC, but a handful of endpoints (price history, working order
//! expiries) report naive local date/times that must be combined with
//! the account's own time zone (carried on [`Credentials`][crate::credentials::Credentials])
//! to be meaningful. The two supported local formats are parsed via a
//! fixed array of format strings computed once at compile time rather
//! than re-parsed on every call.

use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use chrono::offset::FixedOffset;
use chrono::offset::TimeZone;
use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::ParseError;

use serde::de::Deserializer;
use serde::de::Error as DeError;
use serde::de::Unexpected;
use serde::Deserialize;

use crate::error::Error;
use crate::error::Kind;


type Rfc3339Fn = fn(&str) -> Result<DateTime<FixedOffset>, ParseError>;

/// The RFC3339 variants the HTTPS API is known to emit, tried in order.
/// Declaring them as plain function pointers means the format strings
/// are only ever parsed by `chrono` once per process, at first use,
/// rather than being re-parsed out of a runtime string on every call.
const RFC3339_FNS: [Rfc3339Fn; 2] = [
  |s| FixedOffset::east_opt(0).unwrap().datetime_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ"),
  |s| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"),
];

/// The naive local date/time formats used by price history and working
/// order expiries, tried in order.
const LOCAL_FORMATS: [&str; 2] = ["%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub(crate) fn parse_system_time_from_str(time: &str) -> Result<SystemTime, Error> {
  for parse_fn in &RFC3339_FNS {
    if let Ok(datetime) = parse_fn(time) {
      return Ok(from_chrono(datetime))
    }
  }

  Err(Error::new(Kind::InvalidResponse, format!("not a recognized time stamp: {:?}", time)))
}

fn from_chrono(datetime: DateTime<FixedOffset>) -> SystemTime {
  let sec = datetime.timestamp();
  let nsec = datetime.timestamp_subsec_nanos();
  if sec < 0 {
    UNIX_EPOCH - Duration::new((-sec) as u64, 0) + Duration::new(0, nsec)
  } else {
    UNIX_EPOCH + Duration::new(sec as u64, nsec)
  }
}

/// Parse a naive local date/time string against the account's UTC
/// `offset`, trying each of [`LOCAL_FORMATS`] in turn.
pub(crate) fn parse_local_datetime(time: &str, offset: FixedOffset) -> Result<SystemTime, Error> {
  for format in &LOCAL_FORMATS {
    if let Ok(naive) = NaiveDateTime::parse_from_str(time, format) {
      let datetime = offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| Error::new(Kind::InvalidResponse, "ambiguous local time"))?;
      return Ok(from_chrono(datetime))
    }
  }

  Err(Error::new(Kind::InvalidResponse, format!("not a recognized local date/time: {:?}", time)))
}

/// Format `time` as a naive local date/time string in `offset`, using
/// the canonical (first) [`LOCAL_FORMATS`] entry.
pub(crate) fn format_local_datetime(time: SystemTime, offset: FixedOffset) -> String {
  let duration = time.duration_since(UNIX_EPOCH).unwrap_or_default();
  let datetime = offset.timestamp_opt(duration.as_secs() as i64, duration.subsec_nanos()).unwrap();
  datetime.format(LOCAL_FORMATS[0]).to_string()
}


/// Deserialize a time stamp as a [`SystemTime`].
pub(crate) fn system_time_from_str<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
where
  D: Deserializer<'de>,
{
  let time = String::deserialize(deserializer)?;
  parse_system_time_from_str(&time).map_err(|_| {
    DeError::invalid_value(Unexpected::Str(&time), &"an RFC3339 time stamp")
  })
}

/// Deserialize an optional time stamp.
pub(crate) fn optional_system_time_from_str<'de, D>(
  deserializer: D,
) -> Result<Option<SystemTime>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<String>::deserialize(deserializer)? {
    Some(time) => parse_system_time_from_str(&time)
      .map(Some)
      .map_err(|_| DeError::invalid_value(Unexpected::Str(&time), &"an RFC3339 time stamp")),
    None => Ok(None),
  }
}

/// Convert a UNIX time stamp in seconds into a [`SystemTime`], handling
/// times before the epoch (none of the broker's own data predates 1970,
/// but this keeps the conversion total rather than panicking). Used by
/// [`crate::cache::Store`] to decode the `updated` column of a cached
/// [`crate::cache::Application`] row.
pub(crate) fn from_unix_secs(seconds: i64) -> SystemTime {
  if seconds < 0 {
    UNIX_EPOCH - Duration::new((-seconds) as u64, 0)
  } else {
    UNIX_EPOCH + Duration::new(seconds as u64, 0)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_rfc3339_with_and_without_fractional_seconds() {
    for s in ["2018-04-01T12:00:00Z", "2018-04-01T12:00:00.000Z"] {
      let time = parse_system_time_from_str(s).unwrap();
      assert_eq!(time, UNIX_EPOCH + Duration::from_secs(1522584000));
    }
  }

  #[test]
  fn parses_local_datetime_with_offset() {
    let offset = FixedOffset::east_opt(3600).unwrap();
    let time = parse_local_datetime("2018/04/01 13:00:00", offset).unwrap();
    assert_eq!(time, UNIX_EPOCH + Duration::from_secs(1522584000));
  }

  #[test]
  fn formats_local_datetime_round_trips() {
    let offset = FixedOffset::east_opt(3600).unwrap();
    let time = UNIX_EPOCH + Duration::from_secs(1522584000);
    let formatted = format_local_datetime(time, offset);
    assert_eq!(formatted, "2018/04/01 13:00:00");
    assert_eq!(parse_local_datetime(&formatted, offset).unwrap(), time);
  }

  #[test]
  fn unix_secs_round_trips_through_system_time() {
    let time = from_unix_secs(1544129220);
    assert_eq!(time, UNIX_EPOCH + Duration::from_secs(1544129220));
  }
}
