use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::IngestError;
use crate::pipeline::cache;
use crate::pipeline::parse::{self, ParseContext};
use crate::types::activity::FileFormat;
use crate::types::track::Track;

#[derive(Debug, Default)]
pub struct IngestReport {
    pub tracks: Vec<Track>,
    pub failures: Vec<IngestError>,
}

/// Recognized activity files directly inside `dir`, sorted by name.
pub fn list_track_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && FileFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads one file, preferring its cache entry and refreshing the cache after a parse.
pub fn load_file(
    path: &Path,
    cache_dir: Option<&Path>,
    ctx: &ParseContext,
) -> Result<Track, IngestError> {
    let format =
        FileFormat::from_path(path).ok_or_else(|| IngestError::Unsupported(path.to_path_buf()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cache_file = cache_dir.map(|dir| cache::cache_path(dir, &file_name));

    if let Some(cache_file) = &cache_file {
        match cache::load_if_present(cache_file) {
            Ok(Some(track)) => {
                tracing::debug!("Cache hit for {}", file_name);
                return Ok(track);
            }
            Ok(None) => tracing::debug!("Cache miss for {}", file_name),
            Err(e) => tracing::warn!("Unreadable cache for {}, re-parsing: {}", file_name, e),
        }
    }

    let bytes = fs::read(path)?;
    let track = parse::parse(&bytes, format, &file_name, ctx).map_err(|source| {
        IngestError::Parse {
            file: file_name.clone(),
            source,
        }
    })?;

    if let Some(cache_file) = &cache_file {
        if let Err(e) = cache::store(&track, cache_file) {
            tracing::warn!("Failed to cache {}: {}", file_name, e);
        }
    }

    Ok(track)
}

/// Loads all files in parallel. A failing file is logged and reported, never fatal.
pub fn load_files(paths: &[PathBuf], cache_dir: Option<&Path>, ctx: &ParseContext) -> IngestReport {
    let results: Vec<Result<Track, IngestError>> = paths
        .par_iter()
        .map(|path| load_file(path, cache_dir, ctx))
        .collect();

    let mut report = IngestReport::default();
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(track) => report.tracks.push(track),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                report.failures.push(e);
            }
        }
    }

    tracing::info!(
        "Loaded {} tracks ({} failed)",
        report.tracks.len(),
        report.failures.len()
    );
    report
}
