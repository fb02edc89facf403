pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use error::{CacheError, IngestError, MergeError, ParseError};
pub use pipeline::parse::{parse, parse_remote, ParseContext};
pub use types::activity::{FileFormat, RemoteActivity};
pub use types::track::{MovingStats, Track, TrackView};
