use geo::{Coord, Distance, Haversine, LineString, Point, SimplifyIdx};

use crate::error::GeometryError;
use crate::types::geo::{BoundingBox, LatLng, Segment};

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const POLYLINE_PRECISION: u32 = 5;

/// Tolerance used when thinning recorded GPX paths.
pub const SIMPLIFY_TOLERANCE_M: f64 = 10.0;

pub fn encode_path(points: &[LatLng]) -> Result<String, GeometryError> {
    if points.is_empty() {
        return Ok(String::new());
    }

    // polyline works on (x, y) = (lng, lat)
    let line: LineString<f64> = points.iter().map(|p| (p.lng, p.lat)).collect();

    polyline::encode_coordinates(line, POLYLINE_PRECISION)
        .map_err(|e| GeometryError::Polyline(e.to_string()))
}

pub fn decode_path(encoded: &str) -> Result<Vec<LatLng>, GeometryError> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }

    let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION)
        .map_err(|e| GeometryError::Polyline(e.to_string()))?;

    line.coords().map(|c| LatLng::new(c.y, c.x)).collect()
}

pub fn bounding_box(segments: &[Segment]) -> BoundingBox {
    segments
        .iter()
        .flat_map(|segment| segment.points.iter())
        .fold(BoundingBox::Empty, |bbox, point| bbox.extend(*point))
}

pub fn haversine_distance(a: LatLng, b: LatLng) -> f64 {
    Haversine::distance(Point::new(a.lng, a.lat), Point::new(b.lng, b.lat))
}

pub fn path_length(points: &[LatLng]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum()
}

/// Ramer-Douglas-Peucker with a tolerance in meters. Points are projected onto a local
/// plane around the first point; the kept points are the original, unprojected ones.
pub fn simplify(points: &[LatLng], tolerance_m: f64) -> Vec<LatLng> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let origin = points[0];
    let meters_per_degree = EARTH_RADIUS_M.to_radians();
    let lng_scale = origin.lat.to_radians().cos() * meters_per_degree;

    let projected: LineString<f64> = points
        .iter()
        .map(|p| Coord {
            x: (p.lng - origin.lng) * lng_scale,
            y: (p.lat - origin.lat) * meters_per_degree,
        })
        .collect();

    projected
        .simplify_idx(&tolerance_m)
        .into_iter()
        .map(|i| points[i])
        .collect()
}
