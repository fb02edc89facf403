use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::ParseError;
use crate::pipeline::parse::{
    mean, offset_time, parse_xml_time, seconds_to_duration, ParseContext, Parser,
};
use crate::types::activity::{FileFormat, Origin, ParsedActivity};
use crate::types::geo::LatLng;
use crate::types::track::MovingStats;

pub struct TcxParser;

impl Parser for TcxParser {
    fn parse(&self, bytes: &[u8], _ctx: &ParseContext) -> Result<ParsedActivity, ParseError> {
        let content = std::str::from_utf8(bytes)
            .map_err(|e| ParseError::Malformed(format!("TCX: invalid UTF-8: {}", e)))?;

        let tcx: TrainingCenterDatabase = from_str(content)
            .map_err(|e| ParseError::Malformed(format!("TCX: {}", e)))?;

        let activity = tcx
            .activities
            .and_then(|a| a.activity.into_iter().next())
            .ok_or_else(|| ParseError::Invalid("TCX file contains no activity".into()))?;

        to_activity(activity)
    }
}

fn to_activity(activity: Activity) -> Result<ParsedActivity, ParseError> {
    let mut parsed = ParsedActivity::new(Origin::File(FileFormat::Tcx));

    parsed.kind = activity
        .sport
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    parsed.source = activity
        .creator
        .and_then(|c| c.name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    parsed.name = activity
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let trackpoints = || {
        activity
            .lap
            .iter()
            .flat_map(|lap| lap.track.iter())
            .flat_map(|track| track.trackpoint.iter())
    };

    let times: Vec<DateTime<Utc>> = trackpoints()
        .filter_map(|tp| tp.time.as_deref().and_then(parse_xml_time))
        .collect();

    let lap_seconds: f64 = activity
        .lap
        .iter()
        .filter_map(|lap| lap.total_time_seconds)
        .filter(|s| s.is_finite() && *s > 0.0)
        .sum();
    let lap_time = seconds_to_duration(lap_seconds).ok_or_else(|| {
        ParseError::Invalid(format!("TCX lap time {}s is out of range", lap_seconds))
    })?;

    parsed.start_time = times.first().copied().or_else(|| {
        activity
            .id
            .as_deref()
            .and_then(parse_xml_time)
            .or_else(|| {
                activity
                    .lap
                    .first()
                    .and_then(|lap| lap.start_time.as_deref())
                    .and_then(parse_xml_time)
            })
    });
    parsed.end_time = match (times.last().copied(), parsed.start_time) {
        (Some(last), _) => Some(last),
        (None, Some(start)) => Some(offset_time(start, lap_time, "TCX lap time")?),
        (None, None) => None,
    };

    let cumulative = trackpoints()
        .filter_map(|tp| tp.distance_meters)
        .filter(|d| d.is_finite())
        .fold(None, |max: Option<f64>, d| Some(max.map_or(d, |m| m.max(d))));
    parsed.length = cumulative.unwrap_or_else(|| {
        activity
            .lap
            .iter()
            .filter_map(|lap| lap.distance_meters)
            .filter(|d| d.is_finite())
            .sum()
    });

    let mut segments = Vec::new();
    for track in activity.lap.iter().flat_map(|lap| lap.track.iter()) {
        let mut points = Vec::new();
        for tp in &track.trackpoint {
            if let Some(position) = &tp.position {
                points.push(LatLng::new(
                    position.latitude_degrees,
                    position.longitude_degrees,
                )?);
            }
        }
        segments.push(points);
    }
    parsed.segments = segments;

    let heart_rates: Vec<f64> = trackpoints()
        .filter_map(|tp| tp.heart_rate_bpm.as_ref().map(|hr| hr.value))
        .collect();
    let lap_heart_rates: Vec<f64> = activity
        .lap
        .iter()
        .filter_map(|lap| lap.average_heart_rate_bpm.as_ref().map(|hr| hr.value))
        .collect();
    parsed.average_heartrate = mean(&heart_rates).or_else(|| mean(&lap_heart_rates));

    if let (Some(start), Some(end)) = (parsed.start_time, parsed.end_time) {
        let elapsed = end - start;
        let moving = if lap_seconds > 0.0 { lap_time } else { elapsed };
        parsed.moving = Some(MovingStats::new(parsed.length, moving, elapsed));
    }

    Ok(parsed)
}

#[derive(Debug, Deserialize)]
struct TrainingCenterDatabase {
    #[serde(rename = "Activities")]
    activities: Option<Activities>,
}

#[derive(Debug, Deserialize)]
struct Activities {
    #[serde(rename = "Activity", default)]
    activity: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
struct Activity {
    #[serde(rename = "@Sport")]
    sport: Option<String>,
    #[serde(rename = "Id")]
    id: Option<String>,
    #[serde(rename = "Notes")]
    notes: Option<String>,
    #[serde(rename = "Lap", default)]
    lap: Vec<Lap>,
    #[serde(rename = "Creator")]
    creator: Option<Creator>,
}

#[derive(Debug, Deserialize)]
struct Creator {
    #[serde(rename = "Name")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Lap {
    #[serde(rename = "@StartTime")]
    start_time: Option<String>,
    #[serde(rename = "TotalTimeSeconds")]
    total_time_seconds: Option<f64>,
    #[serde(rename = "DistanceMeters")]
    distance_meters: Option<f64>,
    #[serde(rename = "AverageHeartRateBpm")]
    average_heart_rate_bpm: Option<HeartRate>,
    #[serde(rename = "Track", default)]
    track: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    #[serde(rename = "Trackpoint", default)]
    trackpoint: Vec<Trackpoint>,
}

#[derive(Debug, Deserialize)]
struct Trackpoint {
    #[serde(rename = "Time")]
    time: Option<String>,
    #[serde(rename = "Position")]
    position: Option<Position>,
    #[serde(rename = "DistanceMeters")]
    distance_meters: Option<f64>,
    #[serde(rename = "HeartRateBpm")]
    heart_rate_bpm: Option<HeartRate>,
}

#[derive(Debug, Deserialize)]
struct Position {
    #[serde(rename = "LatitudeDegrees")]
    latitude_degrees: f64,
    #[serde(rename = "LongitudeDegrees")]
    longitude_degrees: f64,
}

#[derive(Debug, Deserialize)]
struct HeartRate {
    #[serde(rename = "Value")]
    value: f64,
}
