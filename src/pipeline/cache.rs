use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CacheError;
use crate::pipeline::geometry::encode_path;
use crate::pipeline::parse::seconds_to_duration;
use crate::types::geo::{LatLng, Segment};
use crate::types::track::{duration_seconds, MovingStats, Track};

/// Documents without a `version` key are v1: only times, length and segments.
const CACHE_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
    #[serde(with = "cache_time")]
    start: NaiveDateTime,
    #[serde(with = "cache_time")]
    end: NaiveDateTime,
    #[serde(with = "cache_time")]
    start_local: NaiveDateTime,
    #[serde(with = "cache_time")]
    end_local: NaiveDateTime,
    length: f64,
    segments: Vec<Vec<LatLng>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default)]
    special: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    file_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    average_heartrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    moving: Option<CachedMoving>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedMoving {
    distance: f64,
    moving_time: f64,
    elapsed_time: f64,
    average_speed: f64,
}

mod cache_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::track::TIME_FORMAT;

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Cache file for a given source file inside `cache_dir`.
pub fn cache_path(cache_dir: &Path, file_name: &str) -> PathBuf {
    cache_dir.join(format!("{}.json", file_name))
}

/// Writes the track next to `path` first and renames it into place, so readers see
/// either the old document or the new one. Concurrent writers of one path must be
/// serialized by the caller.
pub fn store(track: &Track, path: &Path) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let record = to_record(track);
    let json = serde_json::to_vec(&record)
        .map_err(|e| CacheError::Corrupt(format!("cannot serialize track: {}", e)))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("track");
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    if let Err(e) = fs::write(&tmp, &json).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    tracing::debug!("Stored cache {} ({} bytes)", path.display(), json.len());
    Ok(())
}

pub fn load(path: &Path) -> Result<Track, CacheError> {
    let bytes = fs::read(path)?;
    let record: CacheRecord = serde_json::from_slice(&bytes)
        .map_err(|e| CacheError::Corrupt(format!("{}: {}", path.display(), e)))?;
    from_record(record).map_err(|e| match e {
        CacheError::Corrupt(reason) => CacheError::Corrupt(format!("{}: {}", path.display(), reason)),
        other => other,
    })
}

/// Like [`load`], but a missing file is `Ok(None)` rather than an error.
pub fn load_if_present(path: &Path) -> Result<Option<Track>, CacheError> {
    match load(path) {
        Ok(track) => Ok(Some(track)),
        Err(e) if e.is_absent() => Ok(None),
        Err(e) => Err(e),
    }
}

fn to_record(track: &Track) -> CacheRecord {
    CacheRecord {
        version: Some(CACHE_VERSION),
        start: track.start_time.naive_utc(),
        end: track.end_time.naive_utc(),
        start_local: track.start_time_local,
        end_local: track.end_time_local,
        length: track.length,
        segments: track.segments.iter().map(|s| s.points.clone()).collect(),
        id: Some(track.run_id),
        name: Some(track.name.clone()),
        kind: Some(track.kind.clone()),
        source: Some(track.source.clone()),
        special: track.special,
        file_names: track.file_names.clone(),
        average_heartrate: track.average_heartrate,
        moving: track.moving.map(|m| CachedMoving {
            distance: m.distance,
            moving_time: duration_seconds(m.moving_time),
            elapsed_time: duration_seconds(m.elapsed_time),
            average_speed: m.average_speed,
        }),
    }
}

fn from_record(record: CacheRecord) -> Result<Track, CacheError> {
    if record.version.is_some_and(|v| v > CACHE_VERSION) {
        return Err(CacheError::Corrupt(format!(
            "unsupported cache version {:?}",
            record.version
        )));
    }

    if !record.length.is_finite() || record.length < 0.0 {
        return Err(CacheError::Corrupt(format!("bad length {}", record.length)));
    }

    if record.end < record.start {
        return Err(CacheError::Corrupt("end precedes start".into()));
    }

    let segments = record
        .segments
        .into_iter()
        .map(|points| {
            points
                .into_iter()
                .map(|p| LatLng::new(p.lat, p.lng))
                .collect::<Result<Vec<_>, _>>()
                .map(Segment::new)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let path: Vec<LatLng> = segments
        .iter()
        .flat_map(|s| s.points.iter().copied())
        .collect();
    let polyline = encode_path(&path)?;

    let moving = match record.moving {
        Some(m) => Some(to_moving(m)?),
        None => None,
    };

    let start_time = record.start.and_utc();

    Ok(Track {
        file_names: record.file_names,
        kind: record.kind.unwrap_or_default(),
        source: record.source.unwrap_or_default(),
        name: record.name.unwrap_or_default(),
        start_time,
        end_time: record.end.and_utc(),
        start_time_local: record.start_local,
        end_time_local: record.end_local,
        length: record.length,
        special: record.special,
        average_heartrate: record.average_heartrate.filter(|hr| *hr > 0),
        moving,
        start_latlng: path.first().copied(),
        run_id: record.id.unwrap_or_else(|| start_time.timestamp_millis()),
        segments,
        path,
        polyline,
    })
}

fn to_moving(m: CachedMoving) -> Result<MovingStats, CacheError> {
    let valid = |v: f64| v.is_finite() && v >= 0.0;
    if !(valid(m.distance) && valid(m.moving_time) && valid(m.elapsed_time) && valid(m.average_speed)) {
        return Err(CacheError::Corrupt("bad moving statistics".into()));
    }

    let duration = |seconds: f64| {
        seconds_to_duration(seconds)
            .ok_or_else(|| CacheError::Corrupt(format!("moving statistics time {}s out of range", seconds)))
    };

    Ok(MovingStats::with_reported_speed(
        m.distance,
        duration(m.moving_time)?,
        duration(m.elapsed_time)?,
        m.average_speed,
    ))
}
