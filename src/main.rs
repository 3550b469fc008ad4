mod audio;
mod cli;
mod config;
mod error;
mod model;
mod pipeline;
mod queue;
mod store;

use anyhow::{Context, Result};
use clap::Parser;

use audio::decode::SymphoniaDecoder;
use audio::tags::LoftyTagReader;
use cli::{AnalyzeArgs, Cli, Command, ShowArgs};
use config::Config;
use pipeline::metrics::PipelineMetrics;
use pipeline::{format_duration, BatchPipeline};
use store::{SqliteTrackSink, TrackDatabase};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let config = match config::find_config(cli.config.as_deref()) {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };

    match cli.command {
        Command::Analyze(args) => analyze(config, args),
        Command::Show(args) => show(config, args),
    }
}

fn analyze(mut config: Config, args: AnalyzeArgs) -> Result<()> {
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    if !args.input_dir.is_dir() {
        anyhow::bail!("Input directory not found: {}", args.input_dir.display());
    }

    log::info!("spectral-audit - batch audio analysis");
    log::info!("Input: {}", args.input_dir.display());
    log::info!("Database: {}", config.store.database.display());

    let pipeline = BatchPipeline::new(
        &args.input_dir,
        config.analysis.clone(),
        config.pipeline.clone(),
        Box::new(SymphoniaDecoder),
        Box::new(LoftyTagReader),
        PipelineMetrics::new(!args.quiet),
    )?;

    let sink = SqliteTrackSink::open(
        &config.store.database,
        config.store.batch_size,
        config.pipeline.result_queue_capacity,
    )
    .with_context(|| format!("Failed to open database {}", config.store.database.display()))?;

    let report = pipeline.run(sink).context("Analysis run failed")?;

    let stored = TrackDatabase::open(&config.store.database)?.track_count()?;
    log::info!("{} tracks now stored", stored);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Processed: {}, Failed: {}, Enqueued: {}",
            report.tracks_processed, report.tracks_failed, report.paths_enqueued
        );
        println!(
            "Committed {} tracks in {} batches ({} in database)",
            report.tracks_committed, report.batches_committed, stored
        );
        println!(
            "Total time: {}",
            format_duration(std::time::Duration::from_secs_f64(report.total_seconds))
        );
    }

    if !report.walk_completed {
        log::warn!("Directory walk stopped early; some files were not analyzed");
    }

    Ok(())
}

fn show(mut config: Config, args: ShowArgs) -> Result<()> {
    if let Some(db) = args.db {
        config.store.database = db;
    }
    let db_path = &config.store.database;
    if !db_path.exists() {
        anyhow::bail!("Database not found: {}", db_path.display());
    }

    let db = TrackDatabase::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let track = db
        .load_track(&args.path)?
        .with_context(|| format!("No record for {}", args.path.display()))?;

    println!("{}", serde_json::to_string_pretty(&track)?);
    Ok(())
}

/// CLI flags win over the config file, which wins over built-in defaults.
fn apply_overrides(config: &mut Config, args: &AnalyzeArgs) {
    if let Some(db) = &args.db {
        config.store.database = db.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.store.batch_size = batch_size;
    }
    if let Some(workers) = args.workers {
        config.pipeline.workers = Some(workers);
    }
    if let Some(capacity) = args.queue_capacity {
        config.pipeline.queue_capacity = capacity;
    }
    if let Some(capacity) = args.result_queue_capacity {
        config.pipeline.result_queue_capacity = capacity;
    }
    if !args.extensions.is_empty() {
        config.pipeline.extensions = args.extensions.clone();
    }
    if let Some(window_size) = args.window_size {
        config.analysis.window_size = window_size;
    }
    if let Some(hop_size) = args.hop_size {
        config.analysis.hop_size = hop_size;
    }
}
