use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::error::ParseError;
use crate::pipeline::geometry::decode_path;
use crate::pipeline::parse::{offset_time, ParseContext};
use crate::types::activity::{Origin, ParsedActivity, RemoteActivity};
use crate::types::track::{MovingStats, TIME_FORMAT};

pub fn parse(activity: &RemoteActivity, ctx: &ParseContext) -> Result<ParsedActivity, ParseError> {
    let start_local = NaiveDateTime::parse_from_str(activity.start_date_local.trim(), TIME_FORMAT)
        .map_err(|e| {
            ParseError::Malformed(format!(
                "remote activity {}: bad start_date_local {:?}: {}",
                activity.run_id, activity.start_date_local, e
            ))
        })?;

    let start = match activity.start_date.as_deref() {
        Some(text) => parse_utc(text).ok_or_else(|| {
            ParseError::Malformed(format!(
                "remote activity {}: bad start_date {:?}",
                activity.run_id, text
            ))
        })?,
        None => start_local.and_utc(),
    };

    let elapsed = to_duration(activity.elapsed_time, activity.run_id)?;
    let moving = match activity.moving_time {
        Some(moving) => to_duration(moving, activity.run_id)?,
        None => elapsed,
    };

    let encoded = activity.summary_polyline.as_deref().unwrap_or("");
    let encoded = if ctx.filter_remote_paths && !encoded.is_empty() {
        ctx.path_filter.filter(encoded)
    } else {
        encoded.to_string()
    };
    let points = decode_path(&encoded).map_err(|e| {
        ParseError::Malformed(format!("remote activity {}: {}", activity.run_id, e))
    })?;

    let mut parsed = ParsedActivity::new(Origin::Remote);
    parsed.run_id = Some(activity.run_id);
    parsed.start_time = Some(start);
    parsed.end_time = Some(offset_time(start, elapsed, "remote elapsed time")?);
    parsed.start_time_local = Some(start_local);
    parsed.end_time_local = Some(start_local.checked_add_signed(elapsed).ok_or_else(|| {
        ParseError::Invalid(format!(
            "remote activity {}: local end out of range",
            activity.run_id
        ))
    })?);
    parsed.length = activity.distance;
    parsed.moving = Some(MovingStats::new(activity.distance, moving, elapsed));
    parsed.kind = activity.kind.clone();
    parsed.source = activity.source.clone();
    parsed.name = activity.name.clone();
    parsed.average_heartrate = activity.average_heartrate;
    parsed.segments = vec![points];

    Ok(parsed)
}

fn parse_utc(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

fn to_duration(duration: std::time::Duration, run_id: i64) -> Result<Duration, ParseError> {
    Duration::from_std(duration).map_err(|e| {
        ParseError::Malformed(format!("remote activity {}: bad duration: {}", run_id, e))
    })
}
