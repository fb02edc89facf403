use crate::pipeline::geometry::{decode_path, encode_path, haversine_distance};
use crate::types::geo::LatLng;

/// Cleans an encoded path before it is decoded.
pub trait PathFilter: Send + Sync {
    fn filter(&self, encoded: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFilter;

impl PathFilter for NoopFilter {
    fn filter(&self, encoded: &str) -> String {
        encoded.to_string()
    }
}

/// Drops isolated spikes: a point far from its neighbours while those neighbours stay
/// close to each other. Sparse paths with long but consistent legs are left intact.
#[derive(Debug, Clone, Copy)]
pub struct JumpFilter {
    pub max_jump_m: f64,
}

impl Default for JumpFilter {
    fn default() -> Self {
        Self { max_jump_m: 5_000.0 }
    }
}

impl JumpFilter {
    fn is_spike(&self, points: &[LatLng], i: usize) -> bool {
        let far = |a: LatLng, b: LatLng| haversine_distance(a, b) > self.max_jump_m;
        let last = points.len() - 1;

        match i {
            // endpoints are judged against the next two points inward
            0 => far(points[0], points[1]) && !far(points[1], points[2]),
            i if i == last => {
                far(points[last], points[last - 1]) && !far(points[last - 1], points[last - 2])
            }
            i => {
                far(points[i], points[i - 1])
                    && far(points[i], points[i + 1])
                    && !far(points[i - 1], points[i + 1])
            }
        }
    }
}

impl PathFilter for JumpFilter {
    fn filter(&self, encoded: &str) -> String {
        let Ok(points) = decode_path(encoded) else {
            // left for the decoder to report
            return encoded.to_string();
        };

        if points.len() < 3 {
            return encoded.to_string();
        }

        let kept: Vec<LatLng> = (0..points.len())
            .filter(|&i| {
                let spike = self.is_spike(&points, i);
                if spike {
                    tracing::debug!("Dropping outlier point {:?}", points[i]);
                }
                !spike
            })
            .map(|i| points[i])
            .collect();

        if kept.len() == points.len() {
            return encoded.to_string();
        }
        encode_path(&kept).unwrap_or_else(|_| encoded.to_string())
    }
}
