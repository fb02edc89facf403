pub mod activity;
pub mod geo;
pub mod track;
