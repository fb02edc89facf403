use chrono::{DateTime, Duration, Utc};
use fitparser::profile::MesgNum;
use fitparser::Value;

use crate::error::ParseError;
use crate::pipeline::parse::{offset_time, seconds_to_duration, ParseContext, Parser};
use crate::types::activity::{FileFormat, Origin, ParsedActivity};
use crate::types::geo::LatLng;
use crate::types::track::MovingStats;

pub struct FitParser;

#[derive(Debug, Default)]
struct FitState {
    points: Vec<LatLng>,
    session: Option<Session>,
    manufacturer: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Session {
    start_time: Option<DateTime<Utc>>,
    total_elapsed_time: Option<f64>,
    total_timer_time: Option<f64>,
    total_moving_time: Option<f64>,
    total_distance: Option<f64>,
    avg_heart_rate: Option<f64>,
    avg_speed: Option<f64>,
    enhanced_avg_speed: Option<f64>,
    sport: Option<String>,
}

impl Parser for FitParser {
    fn parse(&self, bytes: &[u8], _ctx: &ParseContext) -> Result<ParsedActivity, ParseError> {
        let data = fitparser::from_bytes(bytes)
            .map_err(|e| ParseError::Malformed(format!("FIT: {}", e)))?;

        let mut state = FitState::default();

        for record in data {
            let fields = record.fields().iter().map(|f| (f.name(), f.value()));
            match record.kind() {
                MesgNum::Record => apply_record(&mut state, fields)?,
                MesgNum::Session => apply_session(&mut state, fields),
                MesgNum::FileId => apply_file_id(&mut state, fields),
                _ => {}
            }
        }

        to_activity(state)
    }
}

fn apply_record<'a>(
    state: &mut FitState,
    fields: impl Iterator<Item = (&'a str, &'a Value)>,
) -> Result<(), ParseError> {
    let mut lat = None;
    let mut lng = None;

    for (name, value) in fields {
        match name {
            "position_lat" => lat = semicircles_to_degrees(value),
            "position_long" => lng = semicircles_to_degrees(value),
            _ => {}
        }
    }

    // a fix without both axes is skipped, not fatal
    if let (Some(lat), Some(lng)) = (lat, lng) {
        state.points.push(LatLng::new(lat, lng)?);
    }
    Ok(())
}

fn apply_session<'a>(state: &mut FitState, fields: impl Iterator<Item = (&'a str, &'a Value)>) {
    let mut session = Session::default();

    for (name, value) in fields {
        match name {
            "start_time" => {
                if let Value::Timestamp(t) = value {
                    session.start_time = Some(t.with_timezone(&Utc));
                }
            }
            "total_elapsed_time" => session.total_elapsed_time = value_as_f64(value),
            "total_timer_time" => session.total_timer_time = value_as_f64(value),
            "total_moving_time" => session.total_moving_time = value_as_f64(value),
            "total_distance" => session.total_distance = value_as_f64(value),
            "avg_heart_rate" => session.avg_heart_rate = value_as_f64(value),
            "avg_speed" => session.avg_speed = value_as_f64(value),
            "enhanced_avg_speed" => session.enhanced_avg_speed = value_as_f64(value),
            "sport" => session.sport = sport_name(value),
            _ => {}
        }
    }

    // multi-session files keep the last summary
    state.session = Some(session);
}

fn apply_file_id<'a>(state: &mut FitState, fields: impl Iterator<Item = (&'a str, &'a Value)>) {
    for (name, value) in fields {
        if name == "manufacturer" {
            state.manufacturer = match value {
                Value::String(s) => Some(s.clone()),
                other => value_as_f64(other).map(|n| format!("manufacturer_{}", n as i64)),
            };
        }
    }
}

fn to_activity(state: FitState) -> Result<ParsedActivity, ParseError> {
    let session = state
        .session
        .ok_or_else(|| ParseError::Invalid("FIT file has no session summary".into()))?;
    let start = session
        .start_time
        .ok_or_else(|| ParseError::Invalid("FIT session has no start time".into()))?;

    let elapsed = session_duration(session.total_elapsed_time.unwrap_or(0.0), "elapsed")?;
    let distance = session.total_distance.unwrap_or(0.0);

    let mut parsed = ParsedActivity::new(Origin::File(FileFormat::Fit));
    parsed.start_time = Some(start);
    parsed.end_time = Some(offset_time(start, elapsed, "FIT elapsed time")?);
    parsed.run_id = Some(start.timestamp_millis());
    parsed.length = distance;
    parsed.average_heartrate = session.avg_heart_rate.filter(|hr| *hr != 0.0);
    parsed.kind = session.sport.clone();
    parsed.source = state.manufacturer;
    parsed.segments = vec![state.points];

    let moving_seconds = session
        .total_moving_time
        .filter(|s| *s > 0.0)
        .or(session.total_timer_time);
    if let Some(seconds) = moving_seconds {
        let moving = session_duration(seconds, "moving")?;
        let reported = session
            .enhanced_avg_speed
            .filter(|s| *s > 0.0)
            .or(session.avg_speed.filter(|s| *s > 0.0));
        parsed.moving = Some(match reported {
            Some(speed) => MovingStats::with_reported_speed(distance, moving, elapsed, speed),
            None => MovingStats::new(distance, moving, elapsed),
        });
    }

    Ok(parsed)
}

fn session_duration(seconds: f64, what: &str) -> Result<Duration, ParseError> {
    seconds_to_duration(seconds).ok_or_else(|| {
        ParseError::Invalid(format!("FIT session {} time {}s is out of range", what, seconds))
    })
}

fn semicircles_to_degrees(value: &Value) -> Option<f64> {
    let semicircles = match value {
        Value::SInt32(v) => *v as f64,
        other => value_as_f64(other)?,
    };
    Some(semicircles * (180.0 / 2_147_483_648.0))
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Byte(v) | Value::Enum(v) | Value::UInt8(v) | Value::UInt8z(v) => Some(*v as f64),
        Value::SInt8(v) => Some(*v as f64),
        Value::SInt16(v) => Some(*v as f64),
        Value::UInt16(v) | Value::UInt16z(v) => Some(*v as f64),
        Value::SInt32(v) => Some(*v as f64),
        Value::UInt32(v) | Value::UInt32z(v) => Some(*v as f64),
        Value::SInt64(v) => Some(*v as f64),
        Value::UInt64(v) | Value::UInt64z(v) => Some(*v as f64),
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}

fn sport_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_lowercase()),
        other => value_as_f64(other).map(|code| sport_from_code(code as u8).to_string()),
    }
}

fn sport_from_code(code: u8) -> &'static str {
    match code {
        0 => "generic",
        1 => "running",
        2 => "cycling",
        3 => "transition",
        4 => "fitness_equipment",
        5 => "swimming",
        6 => "basketball",
        7 => "soccer",
        8 => "tennis",
        9 => "american_football",
        10 => "training",
        11 => "walking",
        12 => "cross_country_skiing",
        13 => "alpine_skiing",
        14 => "snowboarding",
        15 => "rowing",
        16 => "mountaineering",
        17 => "hiking",
        18 => "multisport",
        19 => "paddling",
        20 => "flying",
        21 => "e_biking",
        25 => "inline_skating",
        26 => "rock_climbing",
        30 => "snowshoeing",
        37 => "stand_up_paddleboarding",
        41 => "kayaking",
        _ => "all",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn fields(pairs: &[(&'static str, Value)]) -> Vec<(&'static str, Value)> {
        pairs.to_vec()
    }

    fn session_fields(extra: &[(&'static str, Value)]) -> Vec<(&'static str, Value)> {
        let start = Utc
            .with_ymd_and_hms(2024, 5, 1, 6, 30, 0)
            .unwrap()
            .with_timezone(&Local);
        let mut all = fields(&[
            ("start_time", Value::Timestamp(start)),
            ("total_elapsed_time", Value::Float64(3600.0)),
            ("total_timer_time", Value::Float64(3000.0)),
            ("total_distance", Value::Float64(10_000.0)),
            ("avg_heart_rate", Value::UInt8(0)),
            ("avg_speed", Value::Float64(3.2)),
            ("sport", Value::String("running".to_string())),
        ]);
        all.extend_from_slice(extra);
        all
    }

    fn apply(state: &mut FitState, kind: MesgNum, pairs: &[(&'static str, Value)]) {
        let iter = pairs.iter().map(|(n, v)| (*n, v));
        match kind {
            MesgNum::Record => apply_record(state, iter).unwrap(),
            MesgNum::Session => apply_session(state, iter),
            _ => apply_file_id(state, iter),
        }
    }

    #[test]
    fn record_without_both_axes_is_skipped() {
        let mut state = FitState::default();
        apply(&mut state, MesgNum::Record, &[("position_lat", Value::SInt32(0))]);
        apply(
            &mut state,
            MesgNum::Record,
            &[
                ("position_lat", Value::SInt32(621_900_000)),
                ("position_long", Value::SInt32(160_400_000)),
            ],
        );
        assert_eq!(state.points.len(), 1);
        assert!((state.points[0].lat - 52.127).abs() < 0.001);
    }

    #[test]
    fn session_timer_time_stands_in_for_moving_time() {
        let mut state = FitState::default();
        apply(
            &mut state,
            MesgNum::Record,
            &[
                ("position_lat", Value::SInt32(621_900_000)),
                ("position_long", Value::SInt32(160_400_000)),
            ],
        );
        apply(&mut state, MesgNum::Session, &session_fields(&[]));

        let parsed = to_activity(state).unwrap();
        let moving = parsed.moving.unwrap();
        assert_eq!(moving.moving_time.num_seconds(), 3000);
        assert_eq!(moving.elapsed_time.num_seconds(), 3600);
        assert_eq!(moving.average_speed, 3.2);
        assert_eq!(parsed.average_heartrate, None);
        assert_eq!(parsed.kind.as_deref(), Some("running"));
        assert_eq!(
            parsed.end_time.unwrap() - parsed.start_time.unwrap(),
            chrono::Duration::seconds(3600)
        );
        assert_eq!(
            parsed.run_id,
            Some(parsed.start_time.unwrap().timestamp_millis())
        );
    }

    #[test]
    fn session_prefers_explicit_moving_time_and_enhanced_speed() {
        let mut state = FitState::default();
        apply(
            &mut state,
            MesgNum::Session,
            &session_fields(&[
                ("total_moving_time", Value::Float64(2800.0)),
                ("enhanced_avg_speed", Value::Float64(3.5)),
                ("avg_heart_rate", Value::UInt8(151)),
            ]),
        );

        let parsed = to_activity(state).unwrap();
        let moving = parsed.moving.unwrap();
        assert_eq!(moving.moving_time.num_seconds(), 2800);
        assert_eq!(moving.average_speed, 3.5);
        assert_eq!(parsed.average_heartrate, Some(151.0));
    }

    #[test]
    fn zero_moving_time_falls_back_to_timer_time() {
        let mut state = FitState::default();
        apply(
            &mut state,
            MesgNum::Session,
            &session_fields(&[("total_moving_time", Value::Float64(0.0))]),
        );

        let moving = to_activity(state).unwrap().moving.unwrap();
        assert_eq!(moving.moving_time.num_seconds(), 3000);
    }

    #[test]
    fn absurd_session_times_are_invalid() {
        for extra in [
            ("total_elapsed_time", Value::Float64(1e300)),
            ("total_elapsed_time", Value::Float64(-5.0)),
            ("total_timer_time", Value::Float64(f64::INFINITY)),
        ] {
            let mut state = FitState::default();
            apply(&mut state, MesgNum::Session, &session_fields(&[extra.clone()]));
            let result = to_activity(state);
            assert!(
                matches!(result, Err(ParseError::Invalid(_))),
                "{:?}: {:?}",
                extra,
                result
            );
        }
    }

    #[test]
    fn numeric_sport_codes_map_to_names() {
        assert_eq!(sport_name(&Value::Enum(2)).as_deref(), Some("cycling"));
        assert_eq!(sport_name(&Value::Enum(17)).as_deref(), Some("hiking"));
    }

    #[test]
    fn missing_session_is_invalid() {
        let state = FitState::default();
        assert!(matches!(to_activity(state), Err(ParseError::Invalid(_))));
    }
}
