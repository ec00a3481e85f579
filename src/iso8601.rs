//! ISO-8601 timestamps and `PTnnHnnMnnS` durations.
//!
//! Parsing accepts the subset `YYYY(-MM(-DD(Thh:mm(:ss(.fff)?)?(Z|±hh:mm)?)?)?)?`.
//! Formatting always emits UTC.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([0-9]{4})(?:-([0-9]{2})(?:-([0-9]{2})(?:T([0-9]{2}):([0-9]{2})(?::([0-9]{2})(?:\.([0-9]+))?)?(Z|([-+])([0-9]{2}):([0-9]{2}))?)?)?)?$",
    )
    .expect("date pattern is valid")
});

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT([0-9]+)H([0-9]+)M([0-9]+)S$").expect("duration pattern is valid")
});

/// Weekday prefix of an RFC 2822 date, e.g. `Mon, `.
static WEEKDAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{3},\s*").expect("weekday pattern is valid"));

/// Parses an ISO-8601 timestamp.
///
/// A value with `Z` or an explicit offset, or with no time of day at all, is
/// read as UTC and corrected by the offset. A time of day without a zone is
/// read as local time. Returns `None` for anything outside the grammar or
/// for out-of-range fields.
///
/// ```
/// use feedpost::iso8601::{format_iso8601, parse_iso8601};
///
/// let t = parse_iso8601("2012-03-04T05:06:07+01:00").unwrap();
/// assert_eq!(format_iso8601(&t), "2012-03-04T04:06:07Z");
/// ```
pub fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    let caps = DATE_RE.captures(text.trim())?;
    let number = |idx: usize, default: u32| -> Option<u32> {
        caps.get(idx).map_or(Some(default), |m| m.as_str().parse().ok())
    };

    let year: i32 = caps[1].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, number(2, 1)?, number(3, 1)?)?;
    let millis = caps.get(7).map_or(0, |m| fraction_to_millis(m.as_str()));
    let time = NaiveTime::from_hms_milli_opt(number(4, 0)?, number(5, 0)?, number(6, 0)?, millis)?;
    let naive = NaiveDateTime::new(date, time);

    let has_time = caps.get(4).is_some();
    let has_zone = caps.get(8).is_some();
    if has_time && !has_zone {
        return Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc));
    }

    let utc = Utc.from_utc_datetime(&naive);
    match caps.get(9) {
        Some(sign) => {
            let minutes = i64::from(number(10, 0)? * 60 + number(11, 0)?);
            let offset = chrono::Duration::minutes(minutes);
            if sign.as_str() == "-" {
                utc.checked_add_signed(offset)
            } else {
                utc.checked_sub_signed(offset)
            }
        }
        None => Some(utc),
    }
}

/// First three fractional digits, right-padded.
fn fraction_to_millis(digits: &str) -> u32 {
    digits
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0, |acc, b| acc * 10 + u32::from(b - b'0'))
}

/// Formats as `YYYY-MM-DDThh:mm:ssZ`, adding `.fff` when milliseconds are non-zero.
pub fn format_iso8601(timestamp: &DateTime<Utc>) -> String {
    let millis = timestamp.timestamp_subsec_millis();
    if millis == 0 {
        timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    } else {
        format!("{}.{millis:03}Z", timestamp.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Formats only the day.
///
/// Uses the local day when the timestamp falls on local midnight, and the UTC
/// day otherwise, so that a date-only value created in local time keeps its day.
pub fn format_iso8601_date(timestamp: &DateTime<Utc>) -> String {
    let local = timestamp.with_timezone(&Local);
    if local.time() == NaiveTime::MIN {
        local.format("%Y-%m-%d").to_string()
    } else {
        timestamp.format("%Y-%m-%d").to_string()
    }
}

/// Parses a feed date (RFC 2822 or ISO-8601) into a UTC timestamp.
///
/// RSS `pubDate` values with a weekday that does not match the date are
/// accepted; the weekday is ignored.
pub fn parse_feed_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(text)
        .or_else(|_| DateTime::parse_from_rfc2822(&WEEKDAY_RE.replace(text, "")))
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_iso8601(text))
}

/// Converts a feed date to canonical ISO-8601, or `None` when unparseable.
///
/// ```
/// use feedpost::iso8601::canonicalize;
///
/// assert_eq!(
///     canonicalize("Mon, 01 Jan 2018 00:00:00 GMT").as_deref(),
///     Some("2018-01-01T00:00:00Z")
/// );
/// assert_eq!(canonicalize("yesterday"), None);
/// ```
pub fn canonicalize(text: &str) -> Option<String> {
    parse_feed_date(text).map(|t| format_iso8601(&t))
}

/// Parses `PTnnHnnMnnS`.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let caps = DURATION_RE.captures(text.trim())?;
    let field = |idx: usize| caps[idx].parse::<u64>().ok();
    let seconds = field(1)?
        .checked_mul(3600)?
        .checked_add(field(2)?.checked_mul(60)?)?
        .checked_add(field(3)?)?;
    Some(Duration::from_secs(seconds))
}

/// Formats as `PTnnHnnMnnS`, rounding to the nearest second.
pub fn format_duration(duration: Duration) -> String {
    let mut seconds = duration.as_secs();
    if duration.subsec_millis() >= 500 {
        seconds += 1;
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("PT{hours}H{minutes}M{}S", seconds % 60)
}
