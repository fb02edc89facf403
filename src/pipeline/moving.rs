use chrono::{DateTime, Duration, Utc};

use crate::pipeline::geometry::haversine_distance;
use crate::types::geo::LatLng;
use crate::types::track::MovingStats;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedPoint {
    pub position: LatLng,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSummary {
    pub moving_distance: f64,
    pub moving_time: Duration,
    pub stopped_time: Duration,
}

/// Splits a raw recording into moving and stopped portions.
pub trait MotionDetector: Send + Sync {
    fn detect(&self, segments: &[Vec<TimedPoint>]) -> MotionSummary;
}

/// Classifies each pair of consecutive timed points by their average speed.
#[derive(Debug, Clone, Copy)]
pub struct SpeedThresholdDetector {
    pub stopped_speed_kmh: f64,
}

impl Default for SpeedThresholdDetector {
    fn default() -> Self {
        Self {
            stopped_speed_kmh: 1.0,
        }
    }
}

impl MotionDetector for SpeedThresholdDetector {
    fn detect(&self, segments: &[Vec<TimedPoint>]) -> MotionSummary {
        let mut moving_distance = 0.0;
        let mut moving_ms = 0i64;
        let mut stopped_ms = 0i64;

        for segment in segments {
            for pair in segment.windows(2) {
                let (Some(t0), Some(t1)) = (pair[0].time, pair[1].time) else {
                    continue;
                };

                let ms = (t1 - t0).num_milliseconds();
                if ms <= 0 {
                    continue;
                }

                let distance = haversine_distance(pair[0].position, pair[1].position);
                let speed_kmh = (distance / 1000.0) / (ms as f64 / 3_600_000.0);

                if speed_kmh <= self.stopped_speed_kmh {
                    stopped_ms += ms;
                } else {
                    moving_ms += ms;
                    moving_distance += distance;
                }
            }
        }

        MotionSummary {
            moving_distance,
            moving_time: Duration::milliseconds(moving_ms),
            stopped_time: Duration::milliseconds(stopped_ms),
        }
    }
}

pub fn moving_stats(summary: &MotionSummary) -> MovingStats {
    MovingStats::new(
        summary.moving_distance,
        summary.moving_time,
        summary.moving_time + summary.stopped_time,
    )
}
