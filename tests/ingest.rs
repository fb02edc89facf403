use std::fs;
use std::path::Path;

use trackpost_rs::error::IngestError;
use trackpost_rs::pipeline::cache::{cache_path, load};
use trackpost_rs::pipeline::ingest::{list_track_files, load_file, load_files};
use trackpost_rs::{ParseContext, ParseError};

const GOOD_GPX: &str = r#"<gpx version="1.1" creator="test"><trk><name>Loop</name><type>running</type><trkseg>
  <trkpt lat="47.3700" lon="8.5400"><time>2024-04-01T17:00:00Z</time></trkpt>
  <trkpt lat="47.3710" lon="8.5400"><time>2024-04-01T17:01:00Z</time></trkpt>
  <trkpt lat="47.3710" lon="8.5420"><time>2024-04-01T17:02:00Z</time></trkpt>
</trkseg></trk></gpx>"#;

fn populate(dir: &Path) {
    fs::write(dir.join("good.gpx"), GOOD_GPX).unwrap();
    fs::write(dir.join("empty.gpx"), "").unwrap();
    fs::write(dir.join("broken.tcx"), "<TrainingCenterDatabase><Activities>").unwrap();
    fs::write(dir.join("notes.txt"), "not a track").unwrap();
}

#[test]
fn only_known_extensions_are_listed() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());

    let names: Vec<String> = list_track_files(dir.path())
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, vec!["broken.tcx", "empty.gpx", "good.gpx"]);
}

#[test]
fn failures_are_reported_alongside_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    populate(dir.path());

    let files = list_track_files(dir.path()).unwrap();
    let report = load_files(&files, Some(cache.path()), &ParseContext::default());

    assert_eq!(report.tracks.len(), 1);
    assert_eq!(report.tracks[0].name(), "Loop");
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().any(|e| matches!(
        e,
        IngestError::Parse { source: ParseError::Empty, .. }
    )));
    assert!(report.failures.iter().any(|e| matches!(
        e,
        IngestError::Parse { source: ParseError::Malformed(_), .. }
    )));

    assert!(cache_path(cache.path(), "good.gpx").exists());
    assert!(!cache_path(cache.path(), "empty.gpx").exists());
}

#[test]
fn cached_track_is_preferred_over_source_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let source = dir.path().join("good.gpx");
    fs::write(&source, GOOD_GPX).unwrap();

    let ctx = ParseContext::default();
    let first = load_file(&source, Some(cache.path()), &ctx).unwrap();

    fs::write(&source, "garbage").unwrap();
    let second = load_file(&source, Some(cache.path()), &ctx).unwrap();

    assert_eq!(first, second);
}

#[test]
fn unreadable_cache_is_rebuilt_from_source() {
    let dir = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let source = dir.path().join("good.gpx");
    fs::write(&source, GOOD_GPX).unwrap();

    let cache_file = cache_path(cache.path(), "good.gpx");
    fs::write(&cache_file, "{ not json").unwrap();

    let track = load_file(&source, Some(cache.path()), &ParseContext::default()).unwrap();

    assert_eq!(load(&cache_file).unwrap(), track);
}

#[test]
fn without_cache_dir_files_are_parsed_directly() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("good.gpx");
    fs::write(&source, GOOD_GPX).unwrap();

    let track = load_file(&source, None, &ParseContext::default()).unwrap();
    assert_eq!(track.file_names(), &["good.gpx".to_string()]);

    let err = load_file(&dir.path().join("notes.txt"), None, &ParseContext::default())
        .unwrap_err();
    assert!(matches!(err, IngestError::Unsupported(_)));
}
