use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// A coordinate in degrees. Constructed through [`LatLng::new`], latitude is always
/// within [-90, 90] and longitude within [-180, 180).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeometryError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(GeometryError::NonFinite { lat, lng });
        }

        let lat = lat.clamp(-90.0, 90.0);
        let lng = if (-180.0..180.0).contains(&lng) {
            lng
        } else {
            let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
            // rem_euclid can round up to exactly 360 for tiny negative inputs
            if wrapped >= 180.0 {
                wrapped - 360.0
            } else {
                wrapped
            }
        };

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..180.0).contains(&lng) {
            return Err(GeometryError::OutOfRange { lat, lng });
        }

        Ok(Self { lat, lng })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub points: Vec<LatLng>,
}

impl Segment {
    pub fn new(points: Vec<LatLng>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLngRect {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundingBox {
    Empty,
    Rect(LatLngRect),
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        matches!(self, BoundingBox::Empty)
    }

    pub fn rect(&self) -> Option<LatLngRect> {
        match self {
            BoundingBox::Empty => None,
            BoundingBox::Rect(rect) => Some(*rect),
        }
    }

    pub fn extend(self, point: LatLng) -> Self {
        match self {
            BoundingBox::Empty => BoundingBox::Rect(LatLngRect {
                min_lat: point.lat,
                min_lng: point.lng,
                max_lat: point.lat,
                max_lng: point.lng,
            }),
            BoundingBox::Rect(r) => BoundingBox::Rect(LatLngRect {
                min_lat: r.min_lat.min(point.lat),
                min_lng: r.min_lng.min(point.lng),
                max_lat: r.max_lat.max(point.lat),
                max_lng: r.max_lng.max(point.lng),
            }),
        }
    }

    pub fn union(self, other: BoundingBox) -> Self {
        match (self, other) {
            (BoundingBox::Empty, b) | (b, BoundingBox::Empty) => b,
            (BoundingBox::Rect(a), BoundingBox::Rect(b)) => BoundingBox::Rect(LatLngRect {
                min_lat: a.min_lat.min(b.min_lat),
                min_lng: a.min_lng.min(b.min_lng),
                max_lat: a.max_lat.max(b.max_lat),
                max_lng: a.max_lng.max(b.max_lng),
            }),
        }
    }
}
