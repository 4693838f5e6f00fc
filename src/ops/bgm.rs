use serde::Deserialize;
use tracing::info;

use crate::artifact::{ArtifactLifecycle, MediaArtifact};
use crate::error::{Result, MediaflowError};
use crate::ingest::{IngestKind, InputSource};
use crate::media::presets::{BgmMode, DEFAULT_BGM_GAIN};
use crate::media::MediaKind;
use super::{require_video, OpContext};

pub const BGM_PREFIX: &str = "bgm";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BgmParams {
    /// Background track, URL or local path
    #[serde(alias = "bgm_url", alias = "url")]
    pub bgm: Option<String>,
    /// `mix` or `ducking`
    pub mode: Option<String>,
    /// Background level relative to the main audio
    #[serde(alias = "gain")]
    pub bgm_gain: Option<f64>,
}

impl BgmParams {
    pub fn mode(&self) -> Result<BgmMode> {
        self.mode.as_deref().map(str::parse).transpose().map(Option::unwrap_or_default)
    }

    pub fn gain(&self) -> Result<f64> {
        match self.bgm_gain {
            None => Ok(DEFAULT_BGM_GAIN),
            Some(gain) if gain.is_finite() && gain >= 0.0 => Ok(gain),
            Some(gain) => Err(MediaflowError::Validation(format!(
                "bgm_gain must be a non-negative number, got {}",
                gain
            ))),
        }
    }

    pub fn source(&self) -> Result<&str> {
        self.bgm
            .as_deref()
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .ok_or_else(|| MediaflowError::Validation("bgm_url is required".to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.mode()?;
        self.gain()?;
        self.source()?;
        Ok(())
    }
}

/// Combine a background track with the audio of `video`; video is copied.
pub async fn execute(
    ctx: &OpContext<'_>,
    lifecycle: &mut ArtifactLifecycle,
    video: &MediaArtifact,
    params: &BgmParams,
) -> Result<MediaArtifact> {
    require_video(video, "bgm")?;
    let mode = params.mode()?;
    let gain = params.gain()?;
    let track = ctx.ingest(&InputSource::parse(params.source()?), IngestKind::Media, lifecycle).await?;

    info!("Mixing background {} into {} (mode: {}, gain: {})", track.file_name(), video.file_name(), mode.as_str(), gain);
    let output = lifecycle.register_intermediate(ctx.output_path(BGM_PREFIX, "mp4"), MediaKind::Video);
    ctx.run(ctx.commands.mix_background(&video.path, &track.path, mode, gain, &output.path))
        .await?;

    info!("Background audio applied: {}", output.file_name());
    Ok(output)
}
