// Operation library
//
// One executor per transformation kind. Each executor registers every file it
// is about to create with the run's ArtifactLifecycle before the toolkit runs,
// so a failed invocation never leaves an untracked file behind:
// - Concat: normalise every input, then join them through a concat filter graph
// - Subtitle: burn a subtitle track in (hard) or mux it as a stream (soft)
// - Bgm: mix or duck a background track under the main audio
// - Convert: re-encode to a whitelisted container at a quality tier
// - Screenshot: capture single frames at planned timestamps
// - Metadata: probe the artifact and extract kind-specific fields

pub mod bgm;
pub mod concat;
pub mod convert;
pub mod metadata;
pub mod screenshot;
pub mod subtitle;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::artifact::{ArtifactLifecycle, ArtifactNaming, MediaArtifact};
use crate::config::Config;
use crate::error::{Result, MediaflowError};
use crate::ingest::{IngestKind, Ingestor, InputSource};
use crate::media::presets;
use crate::media::{MediaClassifier, MediaCommand, MediaCommandBuilder, MediaKind, MediaToolkit};
use crate::resolution::{self, ResolutionSpec};
use crate::scratch::ScratchDir;

pub use bgm::BgmParams;
pub use concat::{ConcatParams, MAX_CONCAT_INPUTS, MIN_CONCAT_INPUTS};
pub use convert::{ConversionRecord, ConvertParams};
pub use metadata::MediaReport;
pub use screenshot::{ScreenshotParams, ScreenshotRecord};
pub use subtitle::{SubtitleMode, SubtitleParams};

/// One step of a pipeline, immutable once parsed
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Concat(ConcatParams),
    Subtitle(SubtitleParams),
    Bgm(BgmParams),
    Convert(ConvertParams),
    Screenshot(ScreenshotParams),
    Metadata,
}

/// What a successful operation hands back to the executor
#[derive(Debug, Clone)]
pub enum OpOutcome {
    /// A new current artifact
    Produced(MediaArtifact),
    /// A new current artifact plus its conversion record
    Converted(MediaArtifact, ConversionRecord),
    Metadata(MediaReport),
    Screenshots(Vec<ScreenshotRecord>),
}

impl Operation {
    /// Parse one entry of a pipeline document. The `type` field selects the
    /// kind, case-insensitively; the remaining fields are its parameters.
    pub fn from_value(value: &Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(|t| t.trim().to_lowercase())
            .unwrap_or_default();

        match kind.as_str() {
            "concat" => parse_params(&kind, value).map(Operation::Concat),
            "subtitle" => parse_params(&kind, value).map(Operation::Subtitle),
            "bgm" | "bgm_mix" => parse_params(&kind, value).map(Operation::Bgm),
            "convert" => parse_params(&kind, value).map(Operation::Convert),
            "screenshot" => parse_params(&kind, value).map(Operation::Screenshot),
            "metadata" => Ok(Operation::Metadata),
            "" => Err(MediaflowError::UnknownOperation("<missing type>".to_string())),
            other => Err(MediaflowError::UnknownOperation(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Concat(_) => "concat",
            Operation::Subtitle(_) => "subtitle",
            Operation::Bgm(_) => "bgm",
            Operation::Convert(_) => "convert",
            Operation::Screenshot(_) => "screenshot",
            Operation::Metadata => "metadata",
        }
    }

    /// Whether the operation works on the current artifact.
    ///
    /// Concat reads the run inputs instead; metadata falls back to the first input.
    pub fn requires_current(&self) -> bool {
        matches!(
            self,
            Operation::Subtitle(_) | Operation::Bgm(_) | Operation::Convert(_) | Operation::Screenshot(_)
        )
    }

    /// Whether success replaces the current artifact
    pub fn replaces_current(&self) -> bool {
        matches!(
            self,
            Operation::Concat(_) | Operation::Subtitle(_) | Operation::Bgm(_) | Operation::Convert(_)
        )
    }

    /// Parameter checks that need no artifact and no toolkit
    pub fn validate(&self) -> Result<()> {
        match self {
            Operation::Concat(params) => params.validate(),
            Operation::Subtitle(params) => params.validate(),
            Operation::Bgm(params) => params.validate(),
            Operation::Convert(params) => params.validate(),
            Operation::Screenshot(params) => params.validate(),
            Operation::Metadata => Ok(()),
        }
    }

    pub async fn execute(
        &self,
        ctx: &OpContext<'_>,
        lifecycle: &mut ArtifactLifecycle,
        inputs: &[MediaArtifact],
        current: Option<&MediaArtifact>,
    ) -> Result<OpOutcome> {
        match self {
            Operation::Concat(params) => concat::execute(ctx, lifecycle, inputs, params)
                .await
                .map(OpOutcome::Produced),
            Operation::Subtitle(params) => subtitle::execute(ctx, lifecycle, self.current(current)?, params)
                .await
                .map(OpOutcome::Produced),
            Operation::Bgm(params) => bgm::execute(ctx, lifecycle, self.current(current)?, params)
                .await
                .map(OpOutcome::Produced),
            Operation::Convert(params) => {
                let (artifact, record) = convert::execute(ctx, lifecycle, self.current(current)?, params).await?;
                Ok(OpOutcome::Converted(artifact, record))
            }
            Operation::Screenshot(params) => screenshot::execute(ctx, lifecycle, self.current(current)?, params)
                .await
                .map(OpOutcome::Screenshots),
            Operation::Metadata => {
                let target = current
                    .or_else(|| inputs.first())
                    .ok_or_else(|| MediaflowError::MissingArtifact(self.name().to_string()))?;
                metadata::execute(ctx, target).await.map(OpOutcome::Metadata)
            }
        }
    }

    fn current<'a>(&self, current: Option<&'a MediaArtifact>) -> Result<&'a MediaArtifact> {
        current.ok_or_else(|| MediaflowError::MissingArtifact(self.name().to_string()))
    }
}

fn parse_params<T: DeserializeOwned>(kind: &str, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| MediaflowError::Validation(format!("Invalid {} parameters: {}", kind, e)))
}

/// Resolve an optional resolution expression; blank means none
pub fn resolution_of(expr: Option<&str>) -> Result<Option<ResolutionSpec>> {
    match expr.map(str::trim).filter(|expr| !expr.is_empty()) {
        Some(expr) => resolution::resolve(expr).map(Some),
        None => Ok(None),
    }
}

/// Range check for per-operation encoder overrides
pub fn validate_encode(crf: Option<u8>, preset: Option<&str>) -> Result<()> {
    if let Some(crf) = crf.filter(|crf| *crf > presets::MAX_CRF) {
        return Err(MediaflowError::Validation(format!(
            "crf must be between 0 and {}, got {}",
            presets::MAX_CRF,
            crf
        )));
    }

    if let Some(preset) = preset {
        if !presets::is_x264_preset(&preset.trim().to_lowercase()) {
            return Err(MediaflowError::Validation(format!(
                "Unknown preset '{}' (expected one of: {})",
                preset,
                presets::X264_PRESETS.join(", ")
            )));
        }
    }

    Ok(())
}

pub fn require_video(artifact: &MediaArtifact, operation: &str) -> Result<()> {
    require_video_kind(artifact.kind, operation, &artifact.file_name())
}

/// `subject` names the file (or the producing step) in the error
pub fn require_video_kind(kind: MediaKind, operation: &str, subject: &str) -> Result<()> {
    match kind {
        MediaKind::Video => Ok(()),
        other => Err(MediaflowError::UnsupportedMediaType(format!(
            "{} requires a video, got {} ({})",
            operation, other, subject
        ))),
    }
}

/// Size of a file the toolkit reported as written
pub async fn output_size(path: &Path, tool: &str) -> Result<u64> {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.len())
        .map_err(|e| MediaflowError::ExternalTool {
            tool: tool.to_string(),
            message: format!("expected output {} was not written: {}", path.display(), e),
        })
}

/// Everything an operation needs besides its parameters
pub struct OpContext<'a> {
    pub config: &'a Config,
    pub toolkit: &'a dyn MediaToolkit,
    pub commands: &'a MediaCommandBuilder,
    pub classifier: &'a MediaClassifier,
    pub ingestor: &'a Ingestor,
    pub scratch: &'a ScratchDir,
}

impl OpContext<'_> {
    pub async fn run(&self, command: MediaCommand) -> Result<()> {
        debug!("{}: {} {}", command.description, command.binary_path, command.args.join(" "));
        self.toolkit.execute(&command).await
    }

    /// Fresh scratch path for an operation output
    pub fn output_path(&self, prefix: &str, extension: &str) -> PathBuf {
        ArtifactNaming::generate(self.scratch.path(), prefix, Some(extension))
    }

    /// Ingest a source and register it as a run input.
    ///
    /// Media that classifies as neither video nor audio is registered first,
    /// so it is still removed when the run fails.
    pub async fn ingest(
        &self,
        source: &InputSource,
        kind: IngestKind,
        lifecycle: &mut ArtifactLifecycle,
    ) -> Result<MediaArtifact> {
        let path = self.ingestor.ingest(source, kind).await?;
        let media_kind = match kind {
            IngestKind::Media => self.classifier.classify(&path),
            IngestKind::Subtitle => MediaKind::Unknown,
        };
        let artifact = lifecycle.register_input(path, media_kind);

        if kind == IngestKind::Media && media_kind == MediaKind::Unknown {
            return Err(MediaflowError::UnsupportedMediaType(source.to_string()));
        }
        Ok(artifact)
    }
}
