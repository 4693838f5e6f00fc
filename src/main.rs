use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediaflow::{
    cli::{Args, Commands},
    config::Config,
    ingest::InputSource,
    media::{MediaToolkit, MediaToolkitFactory},
    ops::ScreenshotParams,
    pipeline::{PipelineExecutor, PipelineRequest},
    retention::{self, RetentionPolicy, RetentionSweeper},
};

const DEFAULT_CONFIG_FILE: &str = "mediaflow.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    if let Commands::InitConfig { output, force } = &args.command {
        return init_config(output, *force);
    }

    let config = Arc::new(load_config(args.config.as_deref())?);
    info!("Scratch directory: {}", config.storage.scratch_dir.display());

    let start_time = Instant::now();
    match args.command {
        Commands::Run { pipeline } => {
            let request = PipelineRequest::from_file(&pipeline)
                .with_context(|| format!("Failed to load pipeline {}", pipeline.display()))?;
            run_pipeline(&config, request).await?;
        }
        Commands::Info { input } => {
            let report = executor(&config)?.inspect(&InputSource::parse(&input)).await?;
            print_json(&report)?;
        }
        Commands::Convert { input, format, quality, resolution } => {
            let op = json!({
                "type": "convert",
                "format": format,
                "quality": quality,
                "resolution": resolution,
            });
            run_pipeline(&config, single_op(vec![input], op)).await?;
        }
        Commands::Screenshot { input, timestamps, count } => {
            let params = ScreenshotParams {
                timestamps: timestamps.as_deref().map(parse_timestamps).transpose()?,
                count,
            };
            let shots = executor(&config)?.capture(&InputSource::parse(&input), &params).await?;
            print_json(&shots)?;
        }
        Commands::Concat { inputs, resolution, fps, crf, preset, mute } => {
            let op = json!({
                "type": "concat",
                "resolution": resolution,
                "fps": fps,
                "crf": crf,
                "preset": preset,
                "mute": mute,
            });
            run_pipeline(&config, single_op(inputs, op)).await?;
        }
        Commands::Subtitle { input, subtitle, mode, fonts_dir, crf, preset } => {
            let op = json!({
                "type": "subtitle",
                "subtitle_url": subtitle,
                "mode": mode,
                "fonts_dir": fonts_dir,
                "crf": crf,
                "preset": preset,
            });
            run_pipeline(&config, single_op(vec![input], op)).await?;
        }
        Commands::Bgm { input, bgm, mode, gain } => {
            let op = json!({
                "type": "bgm",
                "bgm_url": bgm,
                "mode": mode,
                "bgm_gain": gain,
            });
            run_pipeline(&config, single_op(vec![input], op)).await?;
        }
        Commands::Download { name, dest, delete } => {
            let executor = executor(&config)?;
            let bytes = executor.scratch().download(&name, &dest, delete).await?;
            info!("Copied {} ({} bytes) to {}", name, bytes, dest.display());
            println!("{}", dest.display());
        }
        Commands::Sweep { watch } => {
            sweep(&config, watch).await?;
        }
        Commands::Doctor => {
            doctor(&config).await?;
        }
        // Written before any configuration is loaded
        Commands::InitConfig { .. } => {}
    }

    info!("Finished in {}", format_duration(start_time.elapsed().as_secs_f64()));
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).with_context(|| format!("Failed to load {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Config::from_file(DEFAULT_CONFIG_FILE).with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_FILE))
        }
        None => {
            info!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
            Ok(Config::default())
        }
    }
}

fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(anyhow!("{} already exists (use --force to overwrite)", output.display()));
    }
    Config::default().save_to_file(output)?;
    println!("Wrote default configuration to {}", output.display());
    Ok(())
}

fn executor(config: &Arc<Config>) -> Result<PipelineExecutor> {
    let toolkit = MediaToolkitFactory::create_toolkit(&config.media);
    Ok(PipelineExecutor::new(config.clone(), toolkit)?.with_progress(true))
}

fn single_op(inputs: Vec<String>, op: Value) -> PipelineRequest {
    let inputs = inputs.iter().map(|input| InputSource::parse(input)).collect();
    PipelineRequest::new(inputs, vec![op])
}

async fn run_pipeline(config: &Arc<Config>, request: PipelineRequest) -> Result<()> {
    match executor(config)?.run(request).await {
        Ok(result) => print_json(&result),
        Err(e) if e.is_validation() => Err(anyhow!("Pipeline rejected: {}", e)),
        Err(e) => Err(anyhow!("Pipeline failed: {}", e)),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_timestamps(value: &str) -> Result<Vec<f64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().map_err(|_| anyhow!("Invalid timestamp '{}'", part)))
        .collect()
}

async fn sweep(config: &Config, watch: bool) -> Result<()> {
    if !watch {
        let policy = RetentionPolicy::from_config(&config.storage);
        let report = retention::sweep(&config.storage.scratch_dir, &policy, SystemTime::now());
        print_json(&report)?;
        return Ok(());
    }

    let sweeper = RetentionSweeper::from_config(&config.storage);
    info!(
        "Sweeping {} every {} (Ctrl+C to stop)",
        config.storage.scratch_dir.display(),
        format_duration(config.storage.cleanup_interval().as_secs_f64())
    );
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
    sweeper.stop().await;
    Ok(())
}

async fn doctor(config: &Config) -> Result<()> {
    let toolkit = MediaToolkitFactory::create_toolkit(&config.media);
    match toolkit.version().await {
        Ok(version) => println!("ffmpeg: {}", version),
        Err(e) => {
            warn!("ffmpeg check failed: {}", e);
            return Err(anyhow!("ffmpeg is not available at '{}': {}", config.media.ffmpeg_path, e));
        }
    }
    println!("ffprobe: {}", config.media.ffprobe_path);
    println!("Scratch directory: {}", config.storage.scratch_dir.display());
    println!("Retention: {}", format_duration(config.storage.retention_window().as_secs_f64()));
    println!("Max file size: {} bytes", config.storage.max_file_size);
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".mediaflow").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "mediaflow.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);

    // Keep the writer alive for the lifetime of the process
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn format_duration(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u32;
    let minutes = ((seconds % 3600.0) / 60.0) as u32;
    let secs = seconds % 60.0;

    if hours > 0 {
        format!("{}h {}m {:.1}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:.1}s", minutes, secs)
    } else {
        format!("{:.1}s", secs)
    }
}
