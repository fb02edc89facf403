use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use trackpost_rs::pipeline::cache::load;
use trackpost_rs::pipeline::geometry::encode_path;
use trackpost_rs::pipeline::merge::merge_contiguous;
use trackpost_rs::{parse, FileFormat, MergeError, ParseContext, Track};

fn leg(file_name: &str, start: DateTime<Utc>, lat: f64) -> Track {
    let at = |seconds: i64| {
        (start + Duration::seconds(seconds)).to_rfc3339_opts(SecondsFormat::Secs, true)
    };
    let gpx = format!(
        r#"<gpx version="1.1" creator="test"><trk><type>running</type><trkseg>
  <trkpt lat="{lat0}" lon="13.4000"><time>{t0}</time></trkpt>
  <trkpt lat="{lat1}" lon="13.4000"><time>{t1}</time></trkpt>
  <trkpt lat="{lat1}" lon="13.4020"><time>{t2}</time></trkpt>
</trkseg></trk></gpx>"#,
        lat0 = lat,
        lat1 = lat + 0.001,
        t0 = at(0),
        t1 = at(60),
        t2 = at(120),
    );
    parse(gpx.as_bytes(), FileFormat::Gpx, file_name, &ParseContext::default()).expect("leg")
}

fn morning(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
}

/// A v1 cache document carries no moving statistics.
fn track_without_stats(start: &str) -> Track {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("v1.json");
    let body = format!(
        r#"{{"start": "{start}", "end": "{start}", "start_local": "{start}", "end_local": "{start}",
            "length": 1200.0, "segments": [[{{"lat": 52.1, "lng": 13.1}}]]}}"#
    );
    std::fs::write(&path, body).expect("write");
    load(&path).expect("load")
}

#[test]
fn append_sums_totals_and_concatenates_paths() {
    let mut a = leg("a.gpx", morning(8, 0), 52.50);
    let mut b = leg("b.gpx", morning(8, 10), 52.51);
    b.set_special(true);

    let (a_len, b_len) = (a.length(), b.length());
    let a_moving = *a.moving_stats().unwrap();
    let b_moving = *b.moving_stats().unwrap();
    let b_end = b.end_time();
    let mut expected_path = a.path().to_vec();
    expected_path.extend_from_slice(b.path());

    a.append(b).expect("merge");

    assert_eq!(a.length(), a_len + b_len);
    assert_eq!(a.end_time(), b_end);
    assert_eq!(a.start_time(), morning(8, 0));
    assert_eq!(a.file_names(), &["a.gpx".to_string(), "b.gpx".to_string()]);
    assert!(a.is_special());
    assert_eq!(a.segments().len(), 2);
    assert_eq!(a.path(), expected_path.as_slice());
    assert_eq!(a.polyline(), encode_path(&expected_path).unwrap());

    let moving = a.moving_stats().unwrap();
    assert_eq!(moving.distance, a_moving.distance + b_moving.distance);
    assert_eq!(moving.moving_time, a_moving.moving_time + b_moving.moving_time);
    assert_eq!(moving.elapsed_time, a_moving.elapsed_time + b_moving.elapsed_time);
    let expected_speed = moving.distance / moving.moving_time.num_seconds() as f64;
    assert!((moving.average_speed - expected_speed).abs() < 1e-9);
}

#[test]
fn append_is_additive_over_three_legs() {
    let a = leg("a.gpx", morning(7, 0), 52.50);
    let b = leg("b.gpx", morning(7, 5), 52.51);
    let c = leg("c.gpx", morning(7, 10), 52.52);
    let expected = a.length() + b.length() + c.length();

    let mut merged = a;
    merged.append(b).expect("first merge");
    merged.append(c).expect("second merge");

    assert!((merged.length() - expected).abs() < 1e-9);
    assert_eq!(merged.file_names().len(), 3);
    assert!(!merged.is_special());
}

#[test]
fn append_without_moving_stats_fails_and_leaves_left_untouched() {
    let mut left = track_without_stats("2024-06-01 06:00:00");
    let before = left.clone();

    let err = left
        .append(leg("b.gpx", morning(8, 0), 52.5))
        .expect_err("incompatible");
    assert!(matches!(err, MergeError::IncompatibleData { .. }));
    let MergeError::IncompatibleData { files, .. } = err;
    assert_eq!(files, vec!["b.gpx".to_string()]);
    assert_eq!(left, before);

    let mut left = leg("a.gpx", morning(8, 0), 52.5);
    let before = left.clone();
    assert!(left.can_append(&track_without_stats("2024-06-01 09:00:00")).is_err());
    assert!(left
        .append(track_without_stats("2024-06-01 09:00:00"))
        .is_err());
    assert_eq!(left, before);
}

#[test]
fn contiguous_tracks_are_grouped_in_start_order() {
    let tracks = vec![
        leg("c.gpx", morning(18, 0), 52.40),
        leg("b.gpx", morning(8, 30), 52.51),
        leg("a.gpx", morning(8, 0), 52.50),
    ];

    let merged = merge_contiguous(tracks, std::time::Duration::from_secs(3600));

    assert_eq!(merged.len(), 2);
    assert_eq!(
        merged[0].file_names(),
        &["a.gpx".to_string(), "b.gpx".to_string()]
    );
    assert_eq!(merged[0].end_time(), morning(8, 32));
    assert_eq!(merged[1].file_names(), &["c.gpx".to_string()]);
}

#[test]
fn rejected_merge_keeps_donor_standalone() {
    let tracks = vec![
        leg("a.gpx", morning(8, 0), 52.50),
        track_without_stats("2024-06-01 08:10:00"),
    ];

    let merged = merge_contiguous(tracks, std::time::Duration::from_secs(3600));

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].file_names(), &["a.gpx".to_string()]);
    assert!(merged[1].moving_stats().is_none());
}

#[test]
fn legs_that_meet_exactly_are_merged() {
    let tracks = vec![
        leg("a.gpx", morning(8, 0), 52.50),
        leg("b.gpx", morning(8, 2), 52.51),
    ];

    let merged = merge_contiguous(tracks, std::time::Duration::from_secs(3600));

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].end_time(), morning(8, 4));
}

#[test]
fn overlapping_tracks_stay_separate() {
    let tracks = vec![
        leg("a.gpx", morning(8, 0), 52.50),
        leg("b.gpx", morning(8, 1), 52.51),
    ];

    let merged = merge_contiguous(tracks, std::time::Duration::from_secs(3600));

    assert_eq!(merged.len(), 2);
}
