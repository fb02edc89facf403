use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

use crate::types::geo::{BoundingBox, LatLng, Segment};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingStats {
    pub distance: f64,
    pub moving_time: Duration,
    pub elapsed_time: Duration,
    /// Meters per second.
    pub average_speed: f64,
}

impl MovingStats {
    /// Builds the stats with `average_speed` derived from distance and moving time.
    pub fn new(distance: f64, moving_time: Duration, elapsed_time: Duration) -> Self {
        Self {
            distance,
            moving_time,
            elapsed_time,
            average_speed: average_speed(distance, moving_time),
        }
    }

    /// Builds the stats with a speed reported by the recording device.
    pub fn with_reported_speed(
        distance: f64,
        moving_time: Duration,
        elapsed_time: Duration,
        average_speed: f64,
    ) -> Self {
        Self {
            distance,
            moving_time,
            elapsed_time,
            average_speed,
        }
    }
}

pub fn average_speed(distance: f64, moving_time: Duration) -> f64 {
    let seconds = duration_seconds(moving_time);
    if seconds > 0.0 {
        distance / seconds
    } else {
        0.0
    }
}

pub fn duration_seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.0
}

/// One normalized activity, possibly merged from several recordings.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub(crate) file_names: Vec<String>,
    pub(crate) kind: String,
    pub(crate) source: String,
    pub(crate) name: String,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: DateTime<Utc>,
    pub(crate) start_time_local: NaiveDateTime,
    pub(crate) end_time_local: NaiveDateTime,
    pub(crate) length: f64,
    pub(crate) special: bool,
    pub(crate) average_heartrate: Option<u32>,
    pub(crate) moving: Option<MovingStats>,
    pub(crate) start_latlng: Option<LatLng>,
    pub(crate) run_id: i64,
    pub(crate) segments: Vec<Segment>,
    pub(crate) path: Vec<LatLng>,
    pub(crate) polyline: String,
}

impl Track {
    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn start_time_local(&self) -> NaiveDateTime {
        self.start_time_local
    }

    pub fn end_time_local(&self) -> NaiveDateTime {
        self.end_time_local
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn is_special(&self) -> bool {
        self.special
    }

    pub fn set_special(&mut self, special: bool) {
        self.special = special;
    }

    pub fn average_heartrate(&self) -> Option<u32> {
        self.average_heartrate
    }

    pub fn moving_stats(&self) -> Option<&MovingStats> {
        self.moving.as_ref()
    }

    pub fn start_latlng(&self) -> Option<LatLng> {
        self.start_latlng
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All segment points in recording order.
    pub fn path(&self) -> &[LatLng] {
        &self.path
    }

    pub fn polyline(&self) -> &str {
        &self.polyline
    }

    pub fn bbox(&self) -> BoundingBox {
        crate::pipeline::geometry::bounding_box(&self.segments)
    }

    pub fn view(&self) -> TrackView {
        TrackView {
            id: self.run_id,
            name: self.name.clone(),
            kind: self.kind.clone(),
            source: self.source.clone(),
            start_date: self.start_time.format(TIME_FORMAT).to_string(),
            end: self.end_time.format(TIME_FORMAT).to_string(),
            start_date_local: self.start_time_local.format(TIME_FORMAT).to_string(),
            end_local: self.end_time_local.format(TIME_FORMAT).to_string(),
            length: self.length,
            average_heartrate: self.average_heartrate,
            summary_polyline: self.polyline.clone(),
            start_latlng: self.start_latlng.map(|p| [p.lat, p.lng]),
            special: self.special,
            file_names: self.file_names.clone(),
            distance: self.moving.map(|m| m.distance),
            moving_time: self.moving.map(|m| duration_seconds(m.moving_time)),
            elapsed_time: self.moving.map(|m| duration_seconds(m.elapsed_time)),
            average_speed: self.moving.map(|m| m.average_speed),
        }
    }
}

/// Flat, read-only projection of a [`Track`] handed to the poster renderer.
/// Durations are in seconds, timestamps use [`TIME_FORMAT`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackView {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub start_date: String,
    pub end: String,
    pub start_date_local: String,
    pub end_local: String,
    pub length: f64,
    pub average_heartrate: Option<u32>,
    pub summary_polyline: String,
    pub start_latlng: Option<[f64; 2]>,
    pub special: bool,
    pub file_names: Vec<String>,
    pub distance: Option<f64>,
    pub moving_time: Option<f64>,
    pub elapsed_time: Option<f64>,
    pub average_speed: Option<f64>,
}

impl TrackView {
    /// Field lookup by its serialized name, for template substitution.
    pub fn get(&self, field: &str) -> Option<serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => map.remove(field),
            _ => None,
        }
    }
}
