use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty input file")]
    Empty,
    #[error("Malformed input: {0}")]
    Malformed(String),
    #[error("Invalid track: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Corrupt cache file: {0}")]
    Corrupt(String),
    #[error("Cache I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl CacheError {
    /// True when the cache file simply does not exist.
    pub fn is_absent(&self) -> bool {
        matches!(self, CacheError::IoFailure(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Cannot merge files {files:?}: {reason}")]
    IncompatibleData { files: Vec<String>, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("Non-finite coordinate ({lat}, {lng})")]
    NonFinite { lat: f64, lng: f64 },
    #[error("Coordinate out of range after normalization ({lat}, {lng})")]
    OutOfRange { lat: f64, lng: f64 },
    #[error("Polyline codec failure: {0}")]
    Polyline(String),
}

impl From<GeometryError> for ParseError {
    fn from(err: GeometryError) -> Self {
        ParseError::Invalid(err.to_string())
    }
}

impl From<GeometryError> for CacheError {
    fn from(err: GeometryError) -> Self {
        CacheError::Corrupt(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: ParseError,
    },
    #[error("Unsupported file type: {0}")]
    Unsupported(PathBuf),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
