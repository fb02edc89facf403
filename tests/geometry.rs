use trackpost_rs::pipeline::filter::{JumpFilter, NoopFilter, PathFilter};
use trackpost_rs::pipeline::geometry::{bounding_box, decode_path, encode_path, path_length};
use trackpost_rs::types::geo::{BoundingBox, LatLng, Segment};

fn ll(lat: f64, lng: f64) -> LatLng {
    LatLng::new(lat, lng).unwrap()
}

#[test]
fn polyline_round_trip_keeps_five_decimals() {
    let path = vec![ll(38.5, -120.2), ll(40.7, -120.95), ll(43.252, -126.453)];

    let encoded = encode_path(&path).unwrap();
    assert_eq!(encoded, "_p~iF~ps|U_ulLnnqC_mqNvxq`@");

    let decoded = decode_path(&encoded).unwrap();
    assert_eq!(decoded.len(), path.len());
    for (a, b) in decoded.iter().zip(&path) {
        assert!((a.lat - b.lat).abs() < 1e-5);
        assert!((a.lng - b.lng).abs() < 1e-5);
    }
}

#[test]
fn empty_path_encodes_to_empty_string() {
    assert_eq!(encode_path(&[]).unwrap(), "");
    assert!(decode_path("").unwrap().is_empty());
}

#[test]
fn bounding_box_spans_all_segments() {
    let segments = vec![
        Segment::new(vec![ll(10.0, 20.0), ll(11.0, 19.0)]),
        Segment::new(vec![]),
        Segment::new(vec![ll(9.5, 22.0)]),
    ];

    let BoundingBox::Rect(rect) = bounding_box(&segments) else {
        panic!("expected a rectangle");
    };
    assert_eq!((rect.min_lat, rect.max_lat), (9.5, 11.0));
    assert_eq!((rect.min_lng, rect.max_lng), (19.0, 22.0));

    assert!(bounding_box(&[]).is_empty());
    assert!(bounding_box(&[Segment::default()]).is_empty());
}

#[test]
fn bounding_box_union_ignores_empty() {
    let a = bounding_box(&[Segment::new(vec![ll(1.0, 1.0)])]);
    let b = bounding_box(&[Segment::new(vec![ll(-1.0, 3.0)])]);

    assert_eq!(a.union(BoundingBox::Empty), a);
    assert_eq!(BoundingBox::Empty.union(b), b);

    let rect = a.union(b).rect().unwrap();
    assert_eq!((rect.min_lat, rect.min_lng, rect.max_lat, rect.max_lng), (-1.0, 1.0, 1.0, 3.0));
}

#[test]
fn coordinates_are_normalized() {
    assert_eq!(ll(95.0, 10.0).lat, 90.0);
    assert_eq!(ll(-91.0, 10.0).lat, -90.0);
    assert_eq!(ll(0.0, 190.0).lng, -170.0);
    assert_eq!(ll(0.0, 180.0).lng, -180.0);
    assert_eq!(ll(0.0, -180.0).lng, -180.0);
    assert_eq!(ll(52.52, 13.405), LatLng { lat: 52.52, lng: 13.405 });

    assert!(LatLng::new(f64::NAN, 0.0).is_err());
    assert!(LatLng::new(0.0, f64::INFINITY).is_err());
}

#[test]
fn path_length_sums_legs() {
    let path = vec![ll(0.0, 0.0), ll(1.0, 0.0), ll(2.0, 0.0)];
    let total = path_length(&path);
    assert!((total - 2.0 * 111_195.0).abs() < 2.0);
    assert_eq!(path_length(&path[..1]), 0.0);
}

#[test]
fn jump_filter_drops_teleports() {
    let path = vec![ll(31.2, 121.4), ll(31.201, 121.4), ll(35.0, 121.4), ll(31.202, 121.401)];
    let encoded = encode_path(&path).unwrap();

    let filtered = decode_path(&JumpFilter::default().filter(&encoded)).unwrap();
    assert_eq!(filtered.len(), 3);
    assert!(filtered.iter().all(|p| p.lat < 32.0));

    assert_eq!(NoopFilter.filter(&encoded), encoded);
    assert_eq!(JumpFilter::default().filter(""), "");
}

#[test]
fn jump_filter_keeps_sparse_consistent_paths() {
    // about 6 km between fixes along one meridian
    let path: Vec<LatLng> = (0..5).map(|i| ll(31.0 + 0.054 * i as f64, 121.4)).collect();
    let encoded = encode_path(&path).unwrap();

    let filtered = decode_path(&JumpFilter::default().filter(&encoded)).unwrap();
    assert_eq!(filtered.len(), 5);
}

#[test]
fn jump_filter_drops_bad_first_fix_without_losing_the_rest() {
    let mut path = vec![ll(0.0, 0.0)];
    path.extend((0..5).map(|i| ll(31.2 + 0.001 * i as f64, 121.4)));
    let encoded = encode_path(&path).unwrap();

    let filtered = decode_path(&JumpFilter::default().filter(&encoded)).unwrap();
    assert_eq!(filtered.len(), 5);
    assert!(filtered.iter().all(|p| p.lat > 31.0));
}

#[test]
fn jump_filter_drops_bad_last_fix() {
    let mut path: Vec<LatLng> = (0..4).map(|i| ll(31.2 + 0.001 * i as f64, 121.4)).collect();
    path.push(ll(0.0, 0.0));
    let encoded = encode_path(&path).unwrap();

    let filtered = decode_path(&JumpFilter::default().filter(&encoded)).unwrap();
    assert_eq!(filtered.len(), 4);
}
