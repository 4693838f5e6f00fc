use serde::Deserialize;
use tracing::info;

use crate::artifact::{ArtifactLifecycle, ArtifactNaming, MediaArtifact};
use crate::config::MediaConfig;
use crate::error::{Result, MediaflowError};
use crate::media::{MediaKind, NormalizeSettings};
use super::{require_video, resolution_of, validate_encode, OpContext};

pub const MIN_CONCAT_INPUTS: usize = 2;
pub const MAX_CONCAT_INPUTS: usize = 10;

pub const NORMALIZED_PREFIX: &str = "norm";
pub const CONCAT_PREFIX: &str = "concat";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConcatParams {
    /// Scale applied to every clip before joining
    pub resolution: Option<String>,
    /// Frame rate applied to every clip; 0 leaves it unchanged
    pub fps: Option<u32>,
    pub crf: Option<u8>,
    pub preset: Option<String>,
    /// Drop audio from every clip and join video only
    #[serde(default)]
    pub mute: bool,
}

impl ConcatParams {
    pub fn validate(&self) -> Result<()> {
        resolution_of(self.resolution.as_deref())?;
        validate_encode(self.crf, self.preset.as_deref())
    }

    /// Normalisation shared by every clip, with config defaults filled in
    pub fn settings(&self, config: &MediaConfig) -> Result<NormalizeSettings> {
        Ok(NormalizeSettings {
            crf: self.crf.unwrap_or(config.encode_crf),
            preset: self
                .preset
                .as_deref()
                .unwrap_or(config.encode_preset.as_str())
                .trim()
                .to_lowercase(),
            resolution: resolution_of(self.resolution.as_deref())?,
            fps: self.fps,
            mute: self.mute,
        })
    }
}

pub fn check_input_count(count: usize) -> Result<()> {
    if count < MIN_CONCAT_INPUTS {
        return Err(MediaflowError::Validation(format!(
            "concat requires at least {} inputs, got {}",
            MIN_CONCAT_INPUTS, count
        )));
    }
    if count > MAX_CONCAT_INPUTS {
        return Err(MediaflowError::Validation(format!(
            "Too many inputs for concat (max {}), got {}",
            MAX_CONCAT_INPUTS, count
        )));
    }
    Ok(())
}

/// Normalise every input, then join the clips in input order.
pub async fn execute(
    ctx: &OpContext<'_>,
    lifecycle: &mut ArtifactLifecycle,
    inputs: &[MediaArtifact],
    params: &ConcatParams,
) -> Result<MediaArtifact> {
    check_input_count(inputs.len())?;
    for input in inputs {
        require_video(input, "concat")?;
    }
    let settings = params.settings(&ctx.config.media)?;

    info!("Normalizing {} clips (mute: {})", inputs.len(), settings.mute);
    let mut clips = Vec::with_capacity(inputs.len());
    for (idx, input) in inputs.iter().enumerate() {
        let path = ArtifactNaming::generate_with_suffix(ctx.scratch.path(), NORMALIZED_PREFIX, idx + 1, "mp4");
        let clip = lifecycle.register_intermediate(path, MediaKind::Video);
        ctx.run(ctx.commands.normalize_clip(&input.path, &clip.path, &settings)).await?;
        clips.push(clip.path);
    }

    let output = lifecycle.register_intermediate(ctx.output_path(CONCAT_PREFIX, "mp4"), MediaKind::Video);
    ctx.run(ctx.commands.concat_clips(&clips, &output.path, !settings.mute)).await?;
    info!("Concatenated {} clips into {}", clips.len(), output.file_name());

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaToolkit;
    use crate::ops::testing::Harness;
    use crate::resolution::ResolutionSpec;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_input_count_bounds() {
        assert!(check_input_count(1).is_err());
        assert!(check_input_count(2).is_ok());
        assert!(check_input_count(10).is_ok());
        assert!(check_input_count(11).is_err());
    }

    #[test]
    fn test_settings_fill_config_defaults() {
        let params = ConcatParams {
            resolution: Some("1920x1080".to_string()),
            fps: Some(30),
            ..ConcatParams::default()
        };
        let settings = params.settings(&MediaConfig::default()).unwrap();
        assert_eq!(settings.crf, 23);
        assert_eq!(settings.preset, "veryfast");
        assert_eq!(settings.resolution, Some(ResolutionSpec::Exact { width: 1920, height: 1080 }));
        assert!(!settings.mute);
    }

    #[test]
    fn test_invalid_resolution_fails_loudly() {
        let params = ConcatParams {
            resolution: Some("99999x99999".to_string()),
            ..ConcatParams::default()
        };
        assert!(matches!(params.validate(), Err(MediaflowError::InvalidResolution(_))));
        assert!(params.settings(&MediaConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_normalize_then_join_in_order() {
        let harness = Harness::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();

        let mut toolkit = MockMediaToolkit::new();
        toolkit.expect_execute().times(3).returning(move |command| {
            recorded.lock().unwrap().push(command.clone());
            if let Some(path) = command.output_path() {
                std::fs::write(path, b"clip").unwrap();
            }
            Ok(())
        });

        let mut lifecycle = ArtifactLifecycle::new("cat1");
        let inputs = vec![
            lifecycle.register_input(harness.touch("input_1.mp4"), MediaKind::Video),
            lifecycle.register_input(harness.touch("input_2.mov"), MediaKind::Video),
        ];
        let params = ConcatParams { mute: true, ..ConcatParams::default() };

        let output = execute(&harness.context(&toolkit), &mut lifecycle, &inputs, &params).await.unwrap();
        assert!(output.file_name().starts_with("concat_"));

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].description, "Normalization");
        assert!(calls[0].args.contains(&inputs[0].path.to_string_lossy().to_string()));
        assert!(calls[0].args.contains(&"-an".to_string()));
        assert!(calls[1].args.contains(&inputs[1].path.to_string_lossy().to_string()));
        assert_eq!(calls[2].description, "Concat");
        assert!(calls[2].args.contains(&"[0:v:0][1:v:0]concat=n=2:v=1:a=0[outv]".to_string()));

        let normalized: Vec<_> = lifecycle
            .artifacts()
            .iter()
            .filter(|a| a.file_name().starts_with("norm_"))
            .collect();
        assert_eq!(normalized.len(), 2);
        assert!(normalized[1].file_name().ends_with("_2.mp4"));
        lifecycle.abort().await;
    }

    #[tokio::test]
    async fn test_normalization_failure_aborts_concat() {
        let harness = Harness::new();
        let mut toolkit = MockMediaToolkit::new();
        toolkit.expect_execute().times(1).returning(|_| {
            Err(MediaflowError::ExternalTool {
                tool: "Normalization".to_string(),
                message: "moov atom not found".to_string(),
            })
        });

        let mut lifecycle = ArtifactLifecycle::new("cat2");
        let inputs = vec![
            lifecycle.register_input(harness.touch("input_1.mp4"), MediaKind::Video),
            lifecycle.register_input(harness.touch("input_2.mp4"), MediaKind::Video),
        ];

        let result = execute(&harness.context(&toolkit), &mut lifecycle, &inputs, &ConcatParams::default()).await;
        assert!(matches!(result, Err(MediaflowError::ExternalTool { .. })));
        lifecycle.abort().await;
        assert!(harness.files().is_empty());
    }

    #[tokio::test]
    async fn test_single_input_is_rejected_before_the_toolkit() {
        let harness = Harness::new();
        let mut toolkit = MockMediaToolkit::new();
        toolkit.expect_execute().times(0);

        let mut lifecycle = ArtifactLifecycle::new("cat3");
        let inputs = vec![lifecycle.register_input(harness.touch("input_1.mp4"), MediaKind::Video)];

        let result = execute(&harness.context(&toolkit), &mut lifecycle, &inputs, &ConcatParams::default()).await;
        assert!(matches!(result, Err(MediaflowError::Validation(_))));
        lifecycle.abort().await;
    }
}
