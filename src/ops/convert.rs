use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::artifact::{ArtifactLifecycle, MediaArtifact};
use crate::config::MediaConfig;
use crate::error::{Result, MediaflowError};
use crate::media::presets::Quality;
use crate::media::MediaKind;
use super::{output_size, resolution_of, OpContext};

pub const VIDEO_PREFIX: &str = "converted";
pub const AUDIO_PREFIX: &str = "converted_audio";

pub const DEFAULT_VIDEO_FORMAT: &str = "mp4";
pub const DEFAULT_AUDIO_FORMAT: &str = "mp3";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConvertParams {
    /// Target container; `mp4` for video and `mp3` for audio when unset
    pub format: Option<String>,
    /// `low`, `medium` or `high`
    pub quality: Option<String>,
    /// Scale target, video only
    pub resolution: Option<String>,
}

impl ConvertParams {
    pub fn validate(&self) -> Result<()> {
        resolution_of(self.resolution.as_deref())?;
        Ok(())
    }

    /// Requested tier; anything unrecognised converts at medium.
    pub fn quality(&self) -> Quality {
        match self.quality.as_deref() {
            None => Quality::default(),
            Some(name) => name.parse().unwrap_or_else(|_| {
                warn!("Unknown quality '{}', falling back to {}", name, Quality::Medium);
                Quality::Medium
            }),
        }
    }

    /// Normalised target format for an artifact of `kind`
    pub fn format_for(&self, kind: MediaKind) -> String {
        self.format
            .as_deref()
            .map(|format| format.trim().trim_start_matches('.').to_lowercase())
            .filter(|format| !format.is_empty())
            .unwrap_or_else(|| match kind {
                MediaKind::Audio => DEFAULT_AUDIO_FORMAT.to_string(),
                _ => DEFAULT_VIDEO_FORMAT.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionRecord {
    pub filename: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub format: String,
    pub quality: Quality,
    /// The requested expression, or `original`
    pub resolution: String,
    pub url: String,
}

/// Check `format` against the whitelist for `kind`
pub fn check_output_format(config: &MediaConfig, kind: MediaKind, format: &str) -> Result<()> {
    let (supported, whitelist) = match kind {
        MediaKind::Video => (config.supports_video_output(format), &config.video_output_formats),
        MediaKind::Audio => (config.supports_audio_output(format), &config.audio_output_formats),
        MediaKind::Unknown => {
            return Err(MediaflowError::UnsupportedMediaType(format!("cannot convert unknown media to {}", format)));
        }
    };

    if supported {
        Ok(())
    } else {
        Err(MediaflowError::UnsupportedFormat(format!(
            "{} output '{}' (supported: {})",
            kind,
            format,
            whitelist.join(", ")
        )))
    }
}

pub async fn execute(
    ctx: &OpContext<'_>,
    lifecycle: &mut ArtifactLifecycle,
    current: &MediaArtifact,
    params: &ConvertParams,
) -> Result<(MediaArtifact, ConversionRecord)> {
    let kind = current.kind;
    let format = params.format_for(kind);
    check_output_format(&ctx.config.media, kind, &format)?;

    let quality = params.quality();
    info!("Converting {} to {} format with {} quality", kind, format, quality);

    let (output, command) = match kind {
        MediaKind::Video => {
            let resolution = resolution_of(params.resolution.as_deref())?;
            if let Some(resolution) = &resolution {
                info!("Resolution scaling: {}", resolution);
            }
            let output = lifecycle.register_intermediate(ctx.output_path(VIDEO_PREFIX, &format), MediaKind::Video);
            let command = ctx.commands.convert_video(&current.path, &output.path, quality, resolution);
            (output, command)
        }
        _ => {
            if params.resolution.is_some() {
                warn!("Resolution is ignored when converting audio");
            }
            let output = lifecycle.register_intermediate(ctx.output_path(AUDIO_PREFIX, &format), MediaKind::Audio);
            let command = ctx.commands.convert_audio(&current.path, &output.path, &format, quality);
            (output, command)
        }
    };

    ctx.run(command).await?;

    let filename = output.file_name();
    let record = ConversionRecord {
        file_size: output_size(&output.path, "Conversion").await?,
        url: ctx.scratch.download_url(&filename),
        filename,
        file_path: output.path.clone(),
        format,
        quality,
        resolution: match kind {
            MediaKind::Video => params.resolution.clone().unwrap_or_else(|| "original".to_string()),
            _ => "original".to_string(),
        },
    };
    info!("Conversion completed: {} ({} bytes)", record.filename, record.file_size);

    Ok((output, record))
}
