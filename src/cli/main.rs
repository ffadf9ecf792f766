use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use tripnote::config::Config;
use tripnote::model::{RunReport, RunStatus};
use tripnote::pipeline::{Pipeline, PipelineSettings, build_service};
use tripnote::request::{PropertySpec, TravelRequest};

#[derive(Parser, Debug)]
#[command(
    name = "tripnote",
    version,
    about = "Turn a folder of geotagged photos into a trip note with a map and one marker note per photo"
)]
struct Cli {
    /// Trip name; becomes the trip folder and note name
    #[arg(short, long, required_unless_present = "init")]
    name: Option<String>,

    /// Trip date, YYYY-MM-DD
    #[arg(short, long, required_unless_present = "init")]
    date: Option<String>,

    /// Folder containing the trip's photos
    #[arg(short, long, value_name = "DIR", required_unless_present = "init")]
    input: Option<PathBuf>,

    /// Folder the trip folder is created in
    #[arg(short, long, value_name = "DIR", required_unless_present = "init")]
    output: Option<PathBuf>,

    /// Extra frontmatter property, `type:name=value` or `type=value` (repeatable)
    #[arg(short, long = "property", value_name = "PROPERTY")]
    properties: Vec<PropertySpec>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Archive the photos after the notes are written
    #[arg(long)]
    archive: bool,

    /// Archive quality, 1-100 (100 copies files untouched)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Delete originals once archived (implies --archive)
    #[arg(long)]
    delete_originals: bool,

    /// Output the run report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    // Load config, then apply CLI overrides
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.archive || cli.delete_originals {
        config.archive.enabled = true;
    }
    if cli.delete_originals {
        config.archive.delete_originals = true;
    }
    if let Some(quality) = cli.quality {
        config.archive.quality = quality;
    }

    let mut properties = config.properties.clone();
    properties.extend(cli.properties);

    let request = TravelRequest {
        trip_name: cli.name.context("--name is required")?,
        trip_date: cli.date.context("--date is required")?,
        input_dir: cli.input.context("--input is required")?,
        output_dir: cli.output.context("--output is required")?,
        properties,
    };

    let service = build_service(&config).context("Failed to set up the AMap client")?;
    log::info!("Coordinate service: {}", service.name());

    let mut pipeline = Pipeline::new(service, PipelineSettings::from_config(&config));

    // Ctrl-C stops new conversions; the run then ends without writing anything
    let token = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling");
            token.store(true, Ordering::SeqCst);
        }
    });

    let report = pipeline.run(&request).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    log_summary(&report);
    Ok(())
}

fn log_summary(report: &RunReport) {
    if report.status == RunStatus::Cancelled {
        log::warn!("Cancelled: no notes written");
        return;
    }

    if let Some(ref note) = report.artifacts.note {
        log::info!("Trip note: {}", note.display());
    }
    if let Some(center) = report.center {
        log::info!("Map center: {:.6},{:.6}", center.latitude, center.longitude);
    }
    log::info!("Markers written: {}", report.artifacts.markers.len());

    for collision in &report.marker_collisions {
        log::warn!(
            "  {} shares a marker with {}: {}",
            collision.file_name,
            collision.kept,
            collision.marker.display()
        );
    }

    if let Some(ref target) = report.artifacts.archive_target {
        log::info!(
            "Archived {} photo(s) to {}",
            report.artifacts.archived.len(),
            target.path().display()
        );
    }
    if !report.artifacts.deleted.is_empty() {
        log::info!("Deleted {} original(s)", report.artifacts.deleted.len());
    }
    for failure in &report.archive_failures {
        log::warn!("  Archive: {} ({})", failure.file_name, failure.reason);
    }

    if !report.invalid_photos.is_empty() {
        log::info!("Not on the map ({}):", report.invalid_photos.len());
        for photo in &report.invalid_photos {
            log::info!("  {}: {}", photo.file_name, photo.reason);
        }
    }

    log::info!(
        "Done: {} photo(s) on the map, {} skipped",
        report.valid_count,
        report.invalid_photos.len()
    );
}
