use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;
use crate::pipeline::geometry::{path_length, simplify, SIMPLIFY_TOLERANCE_M};
use crate::pipeline::moving::{moving_stats, TimedPoint};
use crate::pipeline::parse::{mean, parse_xml_time, ParseContext, Parser};
use crate::types::activity::{FileFormat, Origin, ParsedActivity};
use crate::types::geo::LatLng;

/// Vendor whose exports carry their own activity id and already-local timestamps.
const XINGZHE: &str = "xingzhe";

pub struct GpxParser;

#[derive(Debug, Default)]
struct GpxDocument {
    creator: Option<String>,
    name: Option<String>,
    tracks: Vec<GpxTrack>,
}

#[derive(Debug, Default)]
struct GpxTrack {
    name: Option<String>,
    kind: Option<String>,
    source: Option<String>,
    number: Option<i64>,
    segments: Vec<Vec<GpxPoint>>,
}

#[derive(Debug)]
struct GpxPoint {
    position: LatLng,
    time: Option<DateTime<Utc>>,
    heart_rate: Option<f64>,
}

impl Parser for GpxParser {
    fn parse(&self, bytes: &[u8], ctx: &ParseContext) -> Result<ParsedActivity, ParseError> {
        let doc = read_document(bytes)?;
        to_activity(doc, ctx)
    }
}

fn read_document(bytes: &[u8]) -> Result<GpxDocument, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut doc = GpxDocument::default();
    let mut seen_root = false;
    let mut stack: Vec<String> = Vec::new();
    let mut current_point: Option<GpxPoint> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e)?;
                seen_root |= open_element(&name, &e, &mut doc, &mut current_point)?;
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e)?;
                seen_root |= open_element(&name, &e, &mut doc, &mut current_point)?;
                if name == "trkpt" {
                    close_point(&mut doc, &mut current_point);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(malformed)?.into_owned();
                handle_text(&stack, &text, &mut doc, &mut current_point);
            }
            Ok(Event::CData(e)) => {
                let text = std::str::from_utf8(&e).map_err(malformed)?.to_string();
                handle_text(&stack, &text, &mut doc, &mut current_point);
            }
            Ok(Event::End(_)) => {
                if stack.pop().as_deref() == Some("trkpt") {
                    close_point(&mut doc, &mut current_point);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(e)),
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(ParseError::Malformed("GPX: missing <gpx> root element".into()));
    }

    Ok(doc)
}

fn malformed(err: impl std::fmt::Display) -> ParseError {
    ParseError::Malformed(format!("GPX: {}", err))
}

fn local_name(e: &BytesStart) -> Result<String, ParseError> {
    let name = e.local_name();
    std::str::from_utf8(name.as_ref())
        .map(str::to_string)
        .map_err(malformed)
}

/// Returns true when `name` is the document root.
fn open_element(
    name: &str,
    e: &BytesStart,
    doc: &mut GpxDocument,
    current_point: &mut Option<GpxPoint>,
) -> Result<bool, ParseError> {
    match name {
        "gpx" => {
            for attr in e.attributes() {
                let attr = attr.map_err(malformed)?;
                if attr.key.local_name().as_ref() == b"creator" {
                    let value = attr.unescape_value().map_err(malformed)?;
                    doc.creator = Some(value.trim().to_string()).filter(|s| !s.is_empty());
                }
            }
            return Ok(true);
        }
        "trk" => doc.tracks.push(GpxTrack::default()),
        "trkseg" => {
            if let Some(track) = doc.tracks.last_mut() {
                track.segments.push(Vec::new());
            }
        }
        "trkpt" => {
            let mut lat = None;
            let mut lon = None;

            for attr in e.attributes() {
                let attr = attr.map_err(malformed)?;
                let value = attr.unescape_value().map_err(malformed)?;
                match attr.key.local_name().as_ref() {
                    b"lat" => lat = value.trim().parse::<f64>().ok(),
                    b"lon" => lon = value.trim().parse::<f64>().ok(),
                    _ => {}
                }
            }

            let (Some(lat), Some(lon)) = (lat, lon) else {
                return Err(ParseError::Malformed(
                    "GPX: track point without valid lat/lon".into(),
                ));
            };

            *current_point = Some(GpxPoint {
                position: LatLng::new(lat, lon)?,
                time: None,
                heart_rate: None,
            });
        }
        _ => {}
    }
    Ok(false)
}

fn handle_text(
    stack: &[String],
    text: &str,
    doc: &mut GpxDocument,
    current_point: &mut Option<GpxPoint>,
) {
    let Some(element) = stack.last().map(String::as_str) else {
        return;
    };
    let parent = stack
        .len()
        .checked_sub(2)
        .map(|i| stack[i].as_str())
        .unwrap_or("");

    if let Some(point) = current_point.as_mut() {
        match element {
            "time" if parent == "trkpt" => {
                point.time = parse_xml_time(text);
                if point.time.is_none() {
                    tracing::debug!("Ignoring unparsable point time {:?}", text);
                }
            }
            // best effort: a bad sample is skipped, the point is kept
            "hr" | "heartrate" if stack.iter().any(|s| s == "extensions") => {
                point.heart_rate = text.trim().parse::<f64>().ok();
            }
            _ => {}
        }
        return;
    }

    let value = || Some(text.trim().to_string()).filter(|s| !s.is_empty());
    match (parent, element) {
        ("metadata", "name") | ("gpx", "name") => doc.name = value(),
        ("trk", field) => {
            let Some(track) = doc.tracks.last_mut() else {
                return;
            };
            match field {
                "name" => track.name = value(),
                "type" => track.kind = value(),
                "src" => track.source = value(),
                "number" => track.number = text.trim().parse().ok(),
                _ => {}
            }
        }
        _ => {}
    }
}

fn close_point(doc: &mut GpxDocument, current_point: &mut Option<GpxPoint>) {
    let Some(point) = current_point.take() else {
        return;
    };
    if let Some(segment) = doc
        .tracks
        .last_mut()
        .and_then(|track| track.segments.last_mut())
    {
        segment.push(point);
    }
}

fn to_activity(doc: GpxDocument, ctx: &ParseContext) -> Result<ParsedActivity, ParseError> {
    let mut activity = ParsedActivity::new(Origin::File(FileFormat::Gpx));

    let points = || {
        doc.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .flat_map(|s| s.iter())
    };

    activity.start_time = points().find_map(|p| p.time);
    activity.end_time = points().filter_map(|p| p.time).last();

    let all_segments: Vec<&Vec<GpxPoint>> =
        doc.tracks.iter().flat_map(|t| t.segments.iter()).collect();

    activity.length = all_segments
        .iter()
        .map(|segment| {
            let line: Vec<LatLng> = segment.iter().map(|p| p.position).collect();
            path_length(&line)
        })
        .sum();

    let timed: Vec<Vec<TimedPoint>> = all_segments
        .iter()
        .map(|segment| {
            segment
                .iter()
                .map(|p| TimedPoint {
                    position: p.position,
                    time: p.time,
                })
                .collect()
        })
        .collect();
    activity.moving = Some(moving_stats(&ctx.motion.detect(&timed)));

    activity.segments = all_segments
        .iter()
        .map(|segment| {
            let line: Vec<LatLng> = segment.iter().map(|p| p.position).collect();
            simplify(&line, SIMPLIFY_TOLERANCE_M)
        })
        .collect();

    let heart_rates: Vec<f64> = points().filter_map(|p| p.heart_rate).collect();
    activity.average_heartrate = mean(&heart_rates);

    let first = doc.tracks.first();
    activity.kind = first.and_then(|t| t.kind.clone());
    activity.source = first
        .and_then(|t| t.source.clone())
        .or_else(|| doc.creator.clone());
    activity.name = first
        .and_then(|t| t.name.clone())
        .or_else(|| doc.name.clone());

    if activity.source.as_deref() == Some(XINGZHE) {
        let number = first.and_then(|t| t.number).ok_or_else(|| {
            ParseError::Invalid("xingzhe track without a sequence number".into())
        })?;
        activity.run_id = Some(number);
        activity.start_time_local = activity.start_time.map(|t| t.naive_utc());
    }

    Ok(activity)
}
