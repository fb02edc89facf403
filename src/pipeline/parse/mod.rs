mod fit;
mod gpx;
mod remote;
mod tcx;

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};

use crate::config::Config;
use crate::error::ParseError;
use crate::pipeline::filter::{JumpFilter, PathFilter};
use crate::pipeline::geometry::encode_path;
use crate::pipeline::localize::{TimeLocalizer, UtcLocalizer};
use crate::pipeline::moving::{MotionDetector, SpeedThresholdDetector};
use crate::types::activity::{FileFormat, ParsedActivity, RemoteActivity};
use crate::types::geo::{LatLng, Segment};
use crate::types::track::Track;

pub trait Parser {
    fn parse(&self, bytes: &[u8], ctx: &ParseContext) -> Result<ParsedActivity, ParseError>;
}

/// Collaborators and switches every parser call receives explicitly.
#[derive(Clone)]
pub struct ParseContext {
    pub localizer: Arc<dyn TimeLocalizer>,
    pub motion: Arc<dyn MotionDetector>,
    pub path_filter: Arc<dyn PathFilter>,
    pub filter_remote_paths: bool,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self {
            localizer: Arc::new(UtcLocalizer),
            motion: Arc::new(SpeedThresholdDetector::default()),
            path_filter: Arc::new(JumpFilter::default()),
            filter_remote_paths: true,
        }
    }
}

impl ParseContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            motion: Arc::new(SpeedThresholdDetector {
                stopped_speed_kmh: config.stopped_speed_kmh,
            }),
            filter_remote_paths: config.filter_remote_paths,
            ..Self::default()
        }
    }

    pub fn with_localizer(mut self, localizer: impl TimeLocalizer + 'static) -> Self {
        self.localizer = Arc::new(localizer);
        self
    }

    pub fn with_motion_detector(mut self, motion: impl MotionDetector + 'static) -> Self {
        self.motion = Arc::new(motion);
        self
    }

    pub fn with_path_filter(mut self, filter: impl PathFilter + 'static) -> Self {
        self.path_filter = Arc::new(filter);
        self
    }
}

pub fn parse(
    bytes: &[u8],
    format: FileFormat,
    file_name: &str,
    ctx: &ParseContext,
) -> Result<Track, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }

    let parsed = match format {
        FileFormat::Gpx => gpx::GpxParser.parse(bytes, ctx),
        FileFormat::Tcx => tcx::TcxParser.parse(bytes, ctx),
        FileFormat::Fit => fit::FitParser.parse(bytes, ctx),
    }?;

    build_track(parsed, vec![file_name.to_string()], ctx)
}

pub fn parse_remote(activity: &RemoteActivity, ctx: &ParseContext) -> Result<Track, ParseError> {
    let parsed = remote::parse(activity, ctx)?;
    build_track(parsed, vec![activity.run_id.to_string()], ctx)
}

/// Validates what a parser extracted and derives the geometry of the canonical track.
fn build_track(
    parsed: ParsedActivity,
    file_names: Vec<String>,
    ctx: &ParseContext,
) -> Result<Track, ParseError> {
    let origin = parsed.origin;
    let invalid = |reason: String| ParseError::Invalid(format!("{} track {}", origin, reason));

    let start_exact = parsed
        .start_time
        .ok_or_else(|| invalid("has no start time".into()))?;
    let end_exact = parsed
        .end_time
        .ok_or_else(|| invalid("has no end time".into()))?;

    if end_exact < start_exact {
        return Err(invalid(format!(
            "ends ({}) before it starts ({})",
            end_exact, start_exact
        )));
    }

    if !parsed.length.is_finite() || parsed.length <= 0.0 {
        return Err(invalid("is empty".into()));
    }

    let segments: Vec<Segment> = parsed
        .segments
        .into_iter()
        .filter(|points| !points.is_empty())
        .map(Segment::new)
        .collect();

    if segments.is_empty() {
        return Err(invalid("has no coordinates".into()));
    }

    let path: Vec<LatLng> = segments
        .iter()
        .flat_map(|segment| segment.points.iter().copied())
        .collect();
    let polyline = encode_path(&path)?;
    let start_latlng = path.first().copied();

    let run_id = parsed
        .run_id
        .unwrap_or_else(|| start_exact.timestamp_millis());

    // the cache keeps whole seconds only
    let start_time = start_exact.trunc_subsecs(0);
    let end_time = end_exact.trunc_subsecs(0);

    let (start_time_local, end_time_local) =
        match (parsed.start_time_local, parsed.end_time_local) {
            (Some(start), Some(end)) => (start, end),
            (preset_start, preset_end) => {
                let (start, end) = ctx
                    .localizer
                    .localize(start_time, end_time, start_latlng)
                    .unwrap_or_else(|| {
                        tracing::debug!(
                            "Local time lookup failed for {:?}, using UTC",
                            file_names
                        );
                        (start_time.naive_utc(), end_time.naive_utc())
                    });
                (preset_start.unwrap_or(start), preset_end.unwrap_or(end))
            }
        };

    let kind = parsed.kind.unwrap_or_default();
    let source = parsed.source.unwrap_or_default();
    let name = parsed
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("{} from {}", kind, source));

    let average_heartrate = parsed
        .average_heartrate
        .filter(|hr| hr.is_finite() && *hr >= 1.0)
        .map(|hr| hr as u32);

    tracing::debug!(
        "Built {} track {:?}: {:.0} m in {} segments",
        origin,
        file_names,
        parsed.length,
        segments.len()
    );

    Ok(Track {
        file_names,
        kind,
        source,
        name,
        start_time,
        end_time,
        start_time_local: start_time_local.trunc_subsecs(0),
        end_time_local: end_time_local.trunc_subsecs(0),
        length: parsed.length,
        special: false,
        average_heartrate,
        moving: parsed.moving,
        start_latlng,
        run_id,
        segments,
        path,
        polyline,
    })
}

/// Timestamps as written by GPX and TCX producers, with or without a zone suffix.
pub(crate) fn parse_xml_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    text.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

pub(crate) fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Non-negative seconds as a millisecond duration; `None` for values chrono cannot hold.
pub(crate) fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let millis = (seconds * 1000.0).round();
    if millis >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

/// `start` shifted by `duration`, or `Invalid` when the result leaves chrono's range.
pub(crate) fn offset_time(
    start: DateTime<Utc>,
    duration: Duration,
    what: &str,
) -> Result<DateTime<Utc>, ParseError> {
    start.checked_add_signed(duration).ok_or_else(|| {
        ParseError::Invalid(format!(
            "{} of {}s from {} is out of range",
            what,
            duration.num_seconds(),
            start
        ))
    })
}
