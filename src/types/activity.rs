use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::types::geo::LatLng;
use crate::types::track::MovingStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Gpx,
    Tcx,
    Fit,
}

impl FileFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_lowercase().as_str() {
            "gpx" => Some(FileFormat::Gpx),
            "tcx" => Some(FileFormat::Tcx),
            "fit" => Some(FileFormat::Fit),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::from_filename)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Gpx => "gpx",
            FileFormat::Tcx => "tcx",
            FileFormat::Fit => "fit",
        }
    }
}

/// Where a [`ParsedActivity`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    File(FileFormat),
    Remote,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::File(format) => f.write_str(format.as_str()),
            Origin::Remote => f.write_str("remote"),
        }
    }
}

/// Fields one parser managed to extract, before validation into a `Track`.
///
/// Local times left as `None` are resolved through the time localizer; a parser
/// only presets them when the source dictates the value.
#[derive(Debug, Clone)]
pub struct ParsedActivity {
    pub origin: Origin,
    pub kind: Option<String>,
    pub source: Option<String>,
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_time_local: Option<NaiveDateTime>,
    pub end_time_local: Option<NaiveDateTime>,
    pub run_id: Option<i64>,
    pub length: f64,
    pub average_heartrate: Option<f64>,
    pub moving: Option<MovingStats>,
    pub segments: Vec<Vec<LatLng>>,
}

impl ParsedActivity {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            kind: None,
            source: None,
            name: None,
            start_time: None,
            end_time: None,
            start_time_local: None,
            end_time_local: None,
            run_id: None,
            length: 0.0,
            average_heartrate: None,
            moving: None,
            segments: Vec::new(),
        }
    }
}

/// A previously synced activity record that already carries its aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteActivity {
    pub run_id: i64,
    /// `YYYY-MM-DD HH:MM:SS` in the local time of the activity.
    pub start_date_local: String,
    /// UTC start in the same format, when the remote side provides it.
    pub start_date: Option<String>,
    pub elapsed_time: std::time::Duration,
    pub moving_time: Option<std::time::Duration>,
    pub distance: f64,
    pub summary_polyline: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub source: Option<String>,
    pub average_heartrate: Option<f64>,
}
