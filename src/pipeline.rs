//! Pipeline executor: an ordered list of operations applied to an evolving
//! current artifact, with all-or-nothing cleanup of the run's files.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::artifact::{ArtifactLifecycle, MediaArtifact};
use crate::config::{Config, MediaConfig};
use crate::error::{Result, MediaflowError};
use crate::ingest::{IngestKind, Ingestor, InputSource};
use crate::media::{MediaClassifier, MediaCommandBuilder, MediaKind, MediaToolkit};
use crate::ops::{self, concat, convert, ConversionRecord, MediaReport, OpContext, OpOutcome, Operation, ScreenshotParams, ScreenshotRecord};
use crate::scratch::ScratchDir;

/// A pipeline document: `{"inputs": [...], "operations": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineRequest {
    #[serde(default)]
    pub inputs: Vec<InputSource>,
    #[serde(default)]
    pub operations: Vec<Value>,
}

impl PipelineRequest {
    pub fn new(inputs: Vec<InputSource>, operations: Vec<Value>) -> Self {
        Self { inputs, operations }
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|_| MediaflowError::NotFound(path.as_ref().display().to_string()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRecord {
    pub filename: String,
    pub file_path: PathBuf,
    pub media_type: MediaKind,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: String,
    pub output: OutputRecord,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<ScreenshotRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<ConversionRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Validating(usize),
    Executing(usize),
    Completed,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Validating(index) => write!(f, "validating op {}", index + 1),
            PipelineState::Executing(index) => write!(f, "executing op {}", index + 1),
            PipelineState::Completed => f.write_str("completed"),
            PipelineState::Failed => f.write_str("failed"),
        }
    }
}

/// Statically check every operation before anything touches the filesystem.
///
/// Whether a current artifact exists is simulated through the list: it starts
/// set only for a single input and is set by every replacing operation.
pub fn plan(input_count: usize, operations: &[Value]) -> Result<Vec<Operation>> {
    if operations.is_empty() {
        return Err(MediaflowError::NoOutputProduced);
    }

    let mut has_current = input_count == 1;
    let mut planned = Vec::with_capacity(operations.len());

    for (index, value) in operations.iter().enumerate() {
        debug!("State: {}", PipelineState::Validating(index));
        let operation = Operation::from_value(value)?;
        operation.validate()?;

        match &operation {
            Operation::Concat(_) => concat::check_input_count(input_count)?,
            Operation::Metadata if !has_current && input_count == 0 => {
                return Err(MediaflowError::MissingArtifact(operation.name().to_string()));
            }
            op if op.requires_current() && !has_current => {
                return Err(MediaflowError::MissingArtifact(op.name().to_string()));
            }
            _ => {}
        }

        has_current |= operation.replaces_current();
        planned.push(operation);
    }

    if !has_current {
        return Err(MediaflowError::NoOutputProduced);
    }
    Ok(planned)
}

/// Check media kinds and output formats through the planned list.
///
/// Runs once the inputs are classified and before the first toolkit call.
/// Concat, subtitle and bgm always yield a video; convert keeps the kind.
pub fn check_media(operations: &[Operation], inputs: &[MediaArtifact], config: &MediaConfig) -> Result<()> {
    let mut current = match inputs {
        [single] => Some((single.kind, single.file_name())),
        _ => None,
    };

    for operation in operations {
        match operation {
            Operation::Concat(_) => {
                for input in inputs {
                    ops::require_video(input, operation.name())?;
                }
            }
            Operation::Subtitle(_) | Operation::Bgm(_) | Operation::Screenshot(_) => {
                if let Some((kind, subject)) = &current {
                    ops::require_video_kind(*kind, operation.name(), subject)?;
                }
            }
            Operation::Convert(params) => {
                if let Some((kind, _)) = &current {
                    convert::check_output_format(config, *kind, &params.format_for(*kind))?;
                }
            }
            Operation::Metadata => {}
        }

        if matches!(operation, Operation::Concat(_) | Operation::Subtitle(_) | Operation::Bgm(_)) {
            current = Some((MediaKind::Video, format!("{} output", operation.name())));
        }
    }
    Ok(())
}

fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub struct PipelineExecutor {
    config: Arc<Config>,
    toolkit: Arc<dyn MediaToolkit>,
    commands: MediaCommandBuilder,
    classifier: MediaClassifier,
    ingestor: Ingestor,
    scratch: ScratchDir,
}

impl PipelineExecutor {
    pub fn new(config: Arc<Config>, toolkit: Arc<dyn MediaToolkit>) -> Result<Self> {
        Ok(Self {
            commands: MediaCommandBuilder::new(&config.media.ffmpeg_path, &config.media.ffprobe_path),
            classifier: MediaClassifier::new(&config.media),
            ingestor: Ingestor::new(&config)?,
            scratch: ScratchDir::new(&config.storage),
            toolkit,
            config,
        })
    }

    /// Draw download progress bars for remote inputs
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.ingestor = self.ingestor.with_progress(show_progress);
        self
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    fn context(&self) -> OpContext<'_> {
        OpContext {
            config: &self.config,
            toolkit: self.toolkit.as_ref(),
            commands: &self.commands,
            classifier: &self.classifier,
            ingestor: &self.ingestor,
            scratch: &self.scratch,
        }
    }

    /// Run a pipeline to completion.
    ///
    /// On success only the final artifact and any screenshots remain on disk;
    /// on failure nothing the run created or ingested remains.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineResult> {
        let run_id = new_run_id();
        let span = info_span!("pipeline", run_id = %run_id);
        self.run_with_id(run_id, request).instrument(span).await
    }

    async fn run_with_id(&self, run_id: String, request: PipelineRequest) -> Result<PipelineResult> {
        debug!("State: {}", PipelineState::Idle);
        info!(
            "Pipeline started: {} inputs, {} operations",
            request.inputs.len(),
            request.operations.len()
        );

        let operations = match plan(request.inputs.len(), &request.operations) {
            Ok(operations) => operations,
            Err(e) => {
                error!("State: {} during validation: {}", PipelineState::Failed, e);
                return Err(e);
            }
        };

        let mut lifecycle = ArtifactLifecycle::new(run_id.clone());
        match self.execute(&run_id, &operations, &request.inputs, &mut lifecycle).await {
            Ok(result) => {
                let kept = lifecycle.commit().await;
                info!("State: {} ({} files kept)", PipelineState::Completed, kept.len());
                Ok(result)
            }
            Err(e) => {
                let removed = lifecycle.abort().await;
                error!("State: {}: {} ({} files removed)", PipelineState::Failed, e, removed);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run_id: &str,
        operations: &[Operation],
        sources: &[InputSource],
        lifecycle: &mut ArtifactLifecycle,
    ) -> Result<PipelineResult> {
        let ctx = self.context();

        let mut inputs = Vec::with_capacity(sources.len());
        for source in sources {
            inputs.push(ctx.ingest(source, IngestKind::Media, lifecycle).await?);
        }
        check_media(operations, &inputs, &self.config.media)?;

        let mut current = if inputs.len() == 1 { Some(inputs[0].clone()) } else { None };
        let mut screenshots = Vec::new();
        let mut metadata = None;
        let mut conversion = None;

        for (index, operation) in operations.iter().enumerate() {
            info!("State: {} ({})", PipelineState::Executing(index), operation.name());

            match operation.execute(&ctx, lifecycle, &inputs, current.as_ref()).await? {
                OpOutcome::Produced(artifact) => current = Some(artifact),
                OpOutcome::Converted(artifact, record) => {
                    conversion = Some(record);
                    current = Some(artifact);
                }
                OpOutcome::Metadata(report) => metadata = Some(report),
                OpOutcome::Screenshots(records) => screenshots.extend(records),
            }
        }

        let current = current.ok_or(MediaflowError::NoOutputProduced)?;
        let output = lifecycle.promote(&current.path).await?;
        for shot in &screenshots {
            lifecycle.promote(&shot.file_path).await?;
        }

        // A later operation may have replaced the converted file
        let conversion = conversion.filter(|record: &ConversionRecord| {
            let survives = record.file_path == output.path;
            if !survives {
                warn!("Conversion output {} was superseded by a later operation", record.filename);
            }
            survives
        });

        Ok(PipelineResult {
            run_id: run_id.to_string(),
            output: self.output_record(&output),
            screenshots,
            metadata,
            conversion,
        })
    }

    fn output_record(&self, artifact: &MediaArtifact) -> OutputRecord {
        let filename = artifact.file_name();
        OutputRecord {
            url: self.scratch.download_url(&filename),
            filename,
            file_path: artifact.path.clone(),
            media_type: artifact.kind,
        }
    }

    /// Probe a single source and remove it again
    pub async fn inspect(&self, source: &InputSource) -> Result<MediaReport> {
        let run_id = new_run_id();
        let span = info_span!("inspect", run_id = %run_id);

        async {
            let mut lifecycle = ArtifactLifecycle::new(run_id.clone());
            let ctx = self.context();
            let result = match ctx.ingest(source, IngestKind::Media, &mut lifecycle).await {
                Ok(artifact) => ops::metadata::execute(&ctx, &artifact).await,
                Err(e) => Err(e),
            };
            lifecycle.abort().await;
            result
        }
        .instrument(span)
        .await
    }

    /// Capture frames from a single source. The frames are kept, the source is removed.
    pub async fn capture(&self, source: &InputSource, params: &ScreenshotParams) -> Result<Vec<ScreenshotRecord>> {
        params.validate()?;
        let run_id = new_run_id();
        let span = info_span!("capture", run_id = %run_id);

        async {
            let mut lifecycle = ArtifactLifecycle::new(run_id.clone());
            match self.capture_frames(source, params, &mut lifecycle).await {
                Ok(records) => {
                    lifecycle.commit().await;
                    Ok(records)
                }
                Err(e) => {
                    lifecycle.abort().await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn capture_frames(
        &self,
        source: &InputSource,
        params: &ScreenshotParams,
        lifecycle: &mut ArtifactLifecycle,
    ) -> Result<Vec<ScreenshotRecord>> {
        let ctx = self.context();
        let video = ctx.ingest(source, IngestKind::Media, lifecycle).await?;
        let records = ops::screenshot::execute(&ctx, lifecycle, &video, params).await?;
        for record in &records {
            lifecycle.promote(&record.file_path).await?;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_rejects_concat_outside_bounds() {
        let ops = vec![json!({"type": "concat"})];
        assert!(matches!(plan(1, &ops), Err(MediaflowError::Validation(_))));
        assert!(matches!(plan(11, &ops), Err(MediaflowError::Validation(_))));
        assert_eq!(plan(2, &ops).unwrap().len(), 1);
    }

    #[test]
    fn test_plan_simulates_current_artifact() {
        // Two inputs and no concat: nothing to subtitle
        let ops = vec![json!({"type": "subtitle", "subtitle_url": "https://x.y/a.srt"})];
        assert!(matches!(plan(2, &ops), Err(MediaflowError::MissingArtifact(name)) if name == "subtitle"));

        let ops = vec![
            json!({"type": "concat"}),
            json!({"type": "subtitle", "subtitle_url": "https://x.y/a.srt"}),
            json!({"type": "screenshot", "count": 2}),
        ];
        assert_eq!(plan(2, &ops).unwrap().len(), 3);
    }

    #[test]
    fn test_plan_fails_on_a_late_invalid_operation() {
        let ops = vec![
            json!({"type": "convert", "format": "mp4"}),
            json!({"type": "convert", "resolution": "12345678"}),
        ];
        assert!(matches!(plan(1, &ops), Err(MediaflowError::InvalidResolution(_))));

        let ops = vec![json!({"type": "metadata"}), json!({"type": "rotate"})];
        assert!(matches!(plan(1, &ops), Err(MediaflowError::UnknownOperation(_))));
    }

    #[test]
    fn test_plan_requires_an_output() {
        assert!(matches!(plan(1, &[]), Err(MediaflowError::NoOutputProduced)));
        assert!(matches!(plan(2, &[json!({"type": "metadata"})]), Err(MediaflowError::NoOutputProduced)));
        assert!(matches!(plan(0, &[json!({"type": "metadata"})]), Err(MediaflowError::MissingArtifact(_))));
        assert_eq!(plan(1, &[json!({"type": "metadata"})]).unwrap(), vec![Operation::Metadata]);
    }

    fn planned(ops: &[Value]) -> Vec<Operation> {
        ops.iter().map(|op| Operation::from_value(op).unwrap()).collect()
    }

    #[test]
    fn test_check_media_follows_the_current_kind() {
        let config = MediaConfig::default();
        let mut lifecycle = ArtifactLifecycle::new("kinds");
        let clips = vec![
            lifecycle.register_input(PathBuf::from("/scratch/upload_a.mp4"), MediaKind::Video),
            lifecycle.register_input(PathBuf::from("/scratch/upload_b.mp4"), MediaKind::Video),
        ];
        let song = vec![lifecycle.register_input(PathBuf::from("/scratch/upload_c.mp3"), MediaKind::Audio)];

        let gif = planned(&[json!({"type": "concat"}), json!({"type": "convert", "format": "gif"})]);
        assert!(matches!(check_media(&gif, &clips, &config), Err(MediaflowError::UnsupportedFormat(_))));

        // Audio in, mp3 out; audio formats are checked against the audio whitelist
        assert!(check_media(&planned(&[json!({"type": "convert"})]), &song, &config).is_ok());
        let wrong = planned(&[json!({"type": "convert", "format": "mkv"})]);
        assert!(matches!(check_media(&wrong, &song, &config), Err(MediaflowError::UnsupportedFormat(_))));

        let shots = planned(&[json!({"type": "screenshot"})]);
        assert!(matches!(check_media(&shots, &song, &config), Err(MediaflowError::UnsupportedMediaType(_))));

        let mixed = vec![clips[0].clone(), song[0].clone()];
        let concat = planned(&[json!({"type": "concat"})]);
        assert!(matches!(check_media(&concat, &mixed, &config), Err(MediaflowError::UnsupportedMediaType(_))));

        // Concat output is a video whatever comes next
        let chain = planned(&[
            json!({"type": "concat"}),
            json!({"type": "screenshot", "count": 2}),
            json!({"type": "convert", "format": "webm"}),
        ]);
        assert!(check_media(&chain, &clips, &config).is_ok());
    }

    #[test]
    fn test_request_document() {
        let request: PipelineRequest = serde_json::from_str(
            r#"{"inputs": [{"url": "https://x.y/a.mp4"}, {"path": "/data/b.mp4"}],
                "operations": [{"type": "concat", "fps": 30}]}"#,
        )
        .unwrap();
        assert_eq!(request.inputs.len(), 2);
        assert_eq!(request.operations[0]["fps"], 30);
    }

    #[test]
    fn test_run_ids_are_short_and_distinct() {
        let a = new_run_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, new_run_id());
    }
}
