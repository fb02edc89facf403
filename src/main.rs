use std::process::ExitCode;

use trackpost_rs::config::Config;
use trackpost_rs::pipeline::{ingest, merge};
use trackpost_rs::ParseContext;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackpost_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    let ctx = ParseContext::from_config(&config);

    let files = match ingest::list_track_files(&config.tracks_dir) {
        Ok(files) => files,
        Err(e) => {
            tracing::error!("Cannot list {}: {}", config.tracks_dir.display(), e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "Ingesting {} files from {} (cache: {})",
        files.len(),
        config.tracks_dir.display(),
        config.cache_dir.display()
    );

    let report = ingest::load_files(&files, Some(&config.cache_dir), &ctx);
    let tracks = merge::merge_contiguous(report.tracks, config.merge_gap);
    let views: Vec<_> = tracks.iter().map(|t| t.view()).collect();

    tracing::info!("{} activities after merging", views.len());

    if let Err(e) = serde_json::to_writer_pretty(std::io::stdout().lock(), &views) {
        tracing::error!("Failed to write output: {}", e);
        return ExitCode::FAILURE;
    }
    println!();

    ExitCode::SUCCESS
}
