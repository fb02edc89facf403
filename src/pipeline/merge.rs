use chrono::Duration;

use crate::error::MergeError;
use crate::pipeline::geometry::encode_path;
use crate::types::track::{MovingStats, Track};

impl Track {
    /// Folds `other`, the chronologically next leg of the same activity, into `self`.
    /// On error `self` is untouched.
    pub fn append(&mut self, other: Track) -> Result<(), MergeError> {
        let moving = self.merged_moving_stats(&other)?;

        let mut path = Vec::with_capacity(self.path.len() + other.path.len());
        path.extend_from_slice(&self.path);
        path.extend_from_slice(&other.path);
        let polyline = encode_path(&path).map_err(|e| self.incompatible(&other, e.to_string()))?;

        self.end_time = other.end_time;
        self.end_time_local = other.end_time_local;
        self.length += other.length;
        self.moving = Some(moving);
        self.path = path;
        self.polyline = polyline;
        self.segments.extend(other.segments);
        self.file_names.extend(other.file_names);
        self.special = self.special || other.special;
        self.average_heartrate = self.average_heartrate.or(other.average_heartrate);
        self.start_latlng = self.start_latlng.or(other.start_latlng);

        Ok(())
    }

    /// Checks whether [`Track::append`] would succeed without consuming `other`.
    pub fn can_append(&self, other: &Track) -> Result<(), MergeError> {
        self.merged_moving_stats(other).map(|_| ())
    }

    fn merged_moving_stats(&self, other: &Track) -> Result<MovingStats, MergeError> {
        let (Some(mine), Some(theirs)) = (self.moving, other.moving) else {
            return Err(self.incompatible(other, "moving statistics missing".into()));
        };

        let moving_time = mine
            .moving_time
            .checked_add(&theirs.moving_time)
            .ok_or_else(|| self.incompatible(other, "moving time overflow".into()))?;
        let elapsed_time = mine
            .elapsed_time
            .checked_add(&theirs.elapsed_time)
            .ok_or_else(|| self.incompatible(other, "elapsed time overflow".into()))?;

        Ok(MovingStats::new(
            mine.distance + theirs.distance,
            moving_time,
            elapsed_time,
        ))
    }

    fn incompatible(&self, other: &Track, reason: String) -> MergeError {
        MergeError::IncompatibleData {
            files: self
                .file_names
                .iter()
                .chain(other.file_names.iter())
                .cloned()
                .collect(),
            reason,
        }
    }
}

/// Sorts tracks by start time and folds each one into its predecessor when it starts
/// less than `max_gap` after the previous recording ended. Overlapping tracks stay apart.
pub fn merge_contiguous(mut tracks: Vec<Track>, max_gap: std::time::Duration) -> Vec<Track> {
    let max_gap = Duration::from_std(max_gap).unwrap_or_else(|_| Duration::days(365 * 100));
    tracks.sort_by_key(|t| t.start_time);

    let mut merged: Vec<Track> = Vec::with_capacity(tracks.len());
    let mut last_end = None;

    for track in tracks {
        let end = track.end_time;
        let gap = last_end.map(|last_end| track.start_time - last_end);
        last_end = Some(end);

        let Some(gap) = gap.filter(|gap| *gap >= Duration::zero() && *gap < max_gap) else {
            merged.push(track);
            continue;
        };

        let Some(previous) = merged.last_mut() else {
            merged.push(track);
            continue;
        };

        match previous.can_append(&track) {
            Ok(()) => {
                tracing::debug!(
                    "Merging {:?} into {:?} (gap {}s)",
                    track.file_names,
                    previous.file_names,
                    gap.num_seconds()
                );
                if let Err(e) = previous.append(track) {
                    tracing::warn!("{}", e);
                }
            }
            Err(e) => {
                tracing::warn!("{}", e);
                merged.push(track);
            }
        }
    }

    merged
}
