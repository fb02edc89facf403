use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::types::geo::LatLng;

/// Converts UTC bounds of an activity into wall-clock time at the recording location.
/// Returning `None` means the lookup failed; callers then fall back to UTC wall time.
pub trait TimeLocalizer: Send + Sync {
    fn localize(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        hint: Option<LatLng>,
    ) -> Option<(NaiveDateTime, NaiveDateTime)>;
}

impl<F> TimeLocalizer for F
where
    F: Fn(DateTime<Utc>, DateTime<Utc>, Option<LatLng>) -> Option<(NaiveDateTime, NaiveDateTime)>
        + Send
        + Sync,
{
    fn localize(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        hint: Option<LatLng>,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self(start, end, hint)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UtcLocalizer;

impl TimeLocalizer for UtcLocalizer {
    fn localize(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _hint: Option<LatLng>,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((start.naive_utc(), end.naive_utc()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedOffsetLocalizer(pub FixedOffset);

impl TimeLocalizer for FixedOffsetLocalizer {
    fn localize(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _hint: Option<LatLng>,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        Some((
            start.with_timezone(&self.0).naive_local(),
            end.with_timezone(&self.0).naive_local(),
        ))
    }
}
