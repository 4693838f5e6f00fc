use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::artifact::{ArtifactLifecycle, MediaArtifact};
use crate::error::{Result, MediaflowError};
use crate::ingest::{IngestKind, InputSource};
use crate::media::MediaKind;
use super::{require_video, validate_encode, OpContext};

pub const HARD_PREFIX: &str = "sub_hard";
pub const SOFT_PREFIX: &str = "sub_soft";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleMode {
    /// Rendered into the pixels, video re-encoded
    #[default]
    Hard,
    /// Muxed as a separate text stream, nothing re-encoded
    Soft,
}

impl FromStr for SubtitleMode {
    type Err = MediaflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hard" => Ok(SubtitleMode::Hard),
            "soft" => Ok(SubtitleMode::Soft),
            other => Err(MediaflowError::Validation(format!(
                "Unknown subtitle mode '{}' (expected hard or soft)",
                other
            ))),
        }
    }
}

impl fmt::Display for SubtitleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtitleMode::Hard => f.write_str("hard"),
            SubtitleMode::Soft => f.write_str("soft"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubtitleParams {
    pub mode: Option<String>,
    /// Subtitle track, URL or local path
    #[serde(alias = "subtitle_url", alias = "url")]
    pub subtitle: Option<String>,
    /// Font directory for hard subtitles
    pub fonts_dir: Option<PathBuf>,
    pub crf: Option<u8>,
    pub preset: Option<String>,
}

impl SubtitleParams {
    pub fn mode(&self) -> Result<SubtitleMode> {
        self.mode.as_deref().map(str::parse).transpose().map(Option::unwrap_or_default)
    }

    pub fn source(&self) -> Result<&str> {
        self.subtitle
            .as_deref()
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .ok_or_else(|| MediaflowError::Validation("subtitle_url is required".to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.mode()?;
        self.source()?;
        validate_encode(self.crf, self.preset.as_deref())
    }
}

/// Burn in or mux the subtitle track onto `video`.
pub async fn execute(
    ctx: &OpContext<'_>,
    lifecycle: &mut ArtifactLifecycle,
    video: &MediaArtifact,
    params: &SubtitleParams,
) -> Result<MediaArtifact> {
    require_video(video, "subtitle")?;
    let mode = params.mode()?;
    let track = ctx.ingest(&InputSource::parse(params.source()?), IngestKind::Subtitle, lifecycle).await?;

    info!("Applying {} subtitle {} to {}", mode, track.file_name(), video.file_name());
    let media = &ctx.config.media;
    let (output, command) = match mode {
        SubtitleMode::Hard => {
            let output = lifecycle.register_intermediate(ctx.output_path(HARD_PREFIX, "mp4"), MediaKind::Video);
            let preset = params.preset.as_deref().unwrap_or(media.encode_preset.as_str()).trim().to_lowercase();
            let command = ctx.commands.hard_subtitle(
                &video.path,
                &track.path,
                params.fonts_dir.as_deref(),
                params.crf.unwrap_or(media.encode_crf),
                &preset,
                &output.path,
            );
            (output, command)
        }
        SubtitleMode::Soft => {
            let output = lifecycle.register_intermediate(ctx.output_path(SOFT_PREFIX, "mp4"), MediaKind::Video);
            let command = ctx.commands.soft_subtitle(&video.path, &track.path, &media.subtitle_language, &output.path);
            (output, command)
        }
    };

    ctx.run(command).await?;
    info!("Subtitle applied: {}", output.file_name());
    Ok(output)
}
