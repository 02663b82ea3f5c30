//! ISO 8601 parsing for temporal fields

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use std::sync::OnceLock;

/// Parse a timestamp; offsets are converted and dropped (naive UTC)
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .ok_or_else(|| format!("Value '{s}' is not an ISO 8601 datetime"))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Value '{s}' is not an ISO 8601 date"))
}

pub fn parse_time(s: &str) -> Result<NaiveTime, String> {
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
        .ok_or_else(|| format!("Value '{s}' is not an ISO 8601 time"))
}

/// Parse `[-]P[nW][nD][T[nH][nM][n[.f]S]]`
///
/// Years and months have no fixed length and are rejected.
pub fn parse_duration(s: &str) -> Result<TimeDelta, String> {
    static DURATION_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = DURATION_REGEX.get_or_init(|| {
        Regex::new(
            r"^(?P<sign>[-+])?P(?:(?P<weeks>\d+)W)?(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+)(?:\.(?P<fraction>\d{1,9}))?S)?)?$",
        )
        .unwrap()
    });

    let invalid = || format!("Value '{s}' is not an ISO 8601 duration");
    let caps = regex.captures(s).ok_or_else(invalid)?;
    let units = ["weeks", "days", "hours", "minutes", "seconds"];
    if units.iter().all(|unit| caps.name(unit).is_none()) || s.ends_with('T') {
        return Err(invalid());
    }

    let number = |name: &str| -> Result<i64, String> {
        caps.name(name)
            .map_or(Ok(0), |m| m.as_str().parse::<i64>().map_err(|_| invalid()))
    };
    let out_of_range = || format!("Value '{s}' is out of range");

    let parts = [
        TimeDelta::try_weeks(number("weeks")?),
        TimeDelta::try_days(number("days")?),
        TimeDelta::try_hours(number("hours")?),
        TimeDelta::try_minutes(number("minutes")?),
        TimeDelta::try_seconds(number("seconds")?),
    ];
    let mut total = TimeDelta::zero();
    for part in parts {
        let delta = part.ok_or_else(out_of_range)?;
        total = total.checked_add(&delta).ok_or_else(out_of_range)?;
    }
    if let Some(fraction) = caps.name("fraction") {
        let digits = fraction.as_str();
        let nanos: i64 = format!("{digits:0<9}").parse().map_err(|_| invalid())?;
        total = total
            .checked_add(&TimeDelta::nanoseconds(nanos))
            .ok_or_else(out_of_range)?;
    }

    Ok(match caps.name("sign").map(|m| m.as_str()) {
        Some("-") => -total,
        _ => total,
    })
}
