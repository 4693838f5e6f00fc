use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::artifact::{ArtifactLifecycle, ArtifactNaming, MediaArtifact};
use crate::error::{Result, MediaflowError};
use crate::media::presets::{DEFAULT_SCREENSHOT_FRACTIONS, MAX_SCREENSHOT_COUNT};
use crate::media::MediaKind;
use super::{output_size, require_video, OpContext};

pub const SCREENSHOT_PREFIX: &str = "screenshot";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScreenshotParams {
    /// Explicit capture positions in seconds; wins over `count`
    pub timestamps: Option<Vec<f64>>,
    /// Evenly spaced captures
    pub count: Option<i64>,
}

impl ScreenshotParams {
    pub fn validate(&self) -> Result<()> {
        if self.count.is_some_and(|count| count <= 0) {
            return Err(MediaflowError::Validation("Screenshot count must be positive".to_string()));
        }
        if let Some(count) = self.count.filter(|count| *count > MAX_SCREENSHOT_COUNT as i64) {
            return Err(MediaflowError::Validation(format!(
                "Too many screenshots requested (max {}), got {}",
                MAX_SCREENSHOT_COUNT, count
            )));
        }
        if let Some(timestamps) = &self.timestamps {
            if timestamps.len() > MAX_SCREENSHOT_COUNT {
                return Err(MediaflowError::Validation(format!(
                    "Too many screenshot timestamps (max {}), got {}",
                    MAX_SCREENSHOT_COUNT,
                    timestamps.len()
                )));
            }
            if timestamps.iter().any(|t| !t.is_finite() || *t < 0.0) {
                return Err(MediaflowError::Validation(
                    "Screenshot timestamps must be non-negative numbers".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenshotRecord {
    pub timestamp: f64,
    pub filename: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub url: String,
}

/// Capture positions for a video of `duration` seconds.
///
/// Explicit timestamps past the end are skipped. A count `N` spreads captures
/// at `i * duration / (N + 1)`; with neither, the default fractions apply.
pub fn plan_timestamps(duration: f64, params: &ScreenshotParams) -> Vec<f64> {
    match (&params.timestamps, params.count) {
        (Some(timestamps), _) if !timestamps.is_empty() => timestamps
            .iter()
            .copied()
            .filter(|timestamp| {
                let within = *timestamp <= duration;
                if !within {
                    warn!("Timestamp {}s exceeds video duration {}s", timestamp, duration);
                }
                within
            })
            .collect(),
        (_, Some(count)) if count > 0 => {
            let count = count.min(MAX_SCREENSHOT_COUNT as i64);
            let interval = duration / (count as f64 + 1.0);
            (1..=count).map(|i| i as f64 * interval).collect()
        }
        _ => DEFAULT_SCREENSHOT_FRACTIONS.iter().map(|fraction| duration * fraction).collect(),
    }
}

pub async fn execute(
    ctx: &OpContext<'_>,
    lifecycle: &mut ArtifactLifecycle,
    video: &MediaArtifact,
    params: &ScreenshotParams,
) -> Result<Vec<ScreenshotRecord>> {
    require_video(video, "screenshot")?;
    info!("Taking screenshots from video: {}", video.path.display());

    let probe = ctx.toolkit.probe(&video.path).await?;
    if !probe.has_stream(MediaKind::Video) {
        return Err(MediaflowError::NoStreamFound(MediaKind::Video.to_string()));
    }

    let timestamps = plan_timestamps(probe.duration(), params);
    let mut records = Vec::with_capacity(timestamps.len());

    for timestamp in timestamps {
        let path = ArtifactNaming::generate_with_suffix(ctx.scratch.path(), SCREENSHOT_PREFIX, timestamp as u64, "jpg");
        let frame = lifecycle.register_intermediate(path, MediaKind::Unknown);

        ctx.run(ctx.commands.capture_frame(&video.path, timestamp, &frame.path)).await?;

        let filename = frame.file_name();
        records.push(ScreenshotRecord {
            timestamp,
            file_size: output_size(&frame.path, "Screenshot").await?,
            url: ctx.scratch.download_url(&filename),
            filename,
            file_path: frame.path,
        });
    }

    info!("Screenshot capture completed: {} screenshots taken", records.len());
    Ok(records)
}
