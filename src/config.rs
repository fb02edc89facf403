use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub tracks_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Run remote-activity polylines through the outlier filter before decoding.
    pub filter_remote_paths: bool,
    pub merge_gap: Duration,
    pub stopped_speed_kmh: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tracks_dir: PathBuf::from("GPX_OUT"),
            cache_dir: PathBuf::from(".cache/tracks"),
            filter_remote_paths: true,
            merge_gap: Duration::from_secs(3600),
            stopped_speed_kmh: 1.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tracks_dir = std::env::var("TRACKS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.tracks_dir);

        let cache_dir = std::env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let ignore_before_saving = std::env::var("IGNORE_BEFORE_SAVING")
            .ok()
            .map(|s| is_truthy(&s))
            .unwrap_or(false);

        let merge_gap_seconds = std::env::var("MERGE_GAP_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        let stopped_speed_kmh = std::env::var("STOPPED_SPEED_KMH")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(defaults.stopped_speed_kmh);

        Self {
            tracks_dir,
            cache_dir,
            filter_remote_paths: !ignore_before_saving,
            merge_gap: Duration::from_secs(merge_gap_seconds),
            stopped_speed_kmh,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
