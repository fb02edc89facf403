pub mod cache;
pub mod filter;
pub mod geometry;
pub mod ingest;
pub mod localize;
pub mod merge;
pub mod moving;
pub mod parse;
