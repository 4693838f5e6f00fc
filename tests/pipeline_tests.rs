use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use mediaflow::config::Config;
use mediaflow::error::{MediaflowError, Result};
use mediaflow::ingest::InputSource;
use mediaflow::media::{MediaCommand, MediaKind, MediaToolkit, ProbeOutput};
use mediaflow::pipeline::{PipelineExecutor, PipelineRequest};

/// Stands in for ffmpeg: records each command, writes its output file and
/// fails on the command whose description matches `fail_on`.
struct ScriptedToolkit {
    calls: Mutex<Vec<MediaCommand>>,
    fail_on: Option<String>,
    duration: f64,
}

impl ScriptedToolkit {
    fn new(duration: f64) -> Self {
        Self { calls: Mutex::new(Vec::new()), fail_on: None, duration }
    }

    fn failing_on(description: &str) -> Self {
        Self { fail_on: Some(description.to_string()), ..Self::new(10.0) }
    }

    fn descriptions(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.description.clone()).collect()
    }
}

#[async_trait]
impl MediaToolkit for ScriptedToolkit {
    async fn execute(&self, command: &MediaCommand) -> Result<()> {
        self.calls.lock().unwrap().push(command.clone());
        if self.fail_on.as_deref() == Some(command.description.as_str()) {
            return Err(MediaflowError::ExternalTool {
                tool: command.description.clone(),
                message: "Invalid data found when processing input".to_string(),
            });
        }
        if let Some(path) = command.output_path() {
            std::fs::write(path, b"encoded")?;
        }
        Ok(())
    }

    async fn probe(&self, _path: &Path) -> Result<ProbeOutput> {
        Ok(serde_json::from_value(json!({
            "format": {"duration": self.duration.to_string(), "size": "2048", "format_name": "mov,mp4,m4a,3gp,3g2,mj2", "bit_rate": "640000"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "30/1"},
                {"codec_type": "audio", "codec_name": "aac", "sample_rate": "44100", "channels": 2, "channel_layout": "stereo"}
            ]
        }))?)
    }

    async fn version(&self) -> Result<String> {
        Ok("ffmpeg version scripted".to_string())
    }
}

struct Fixture {
    scratch: TempDir,
    sources: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            scratch: tempfile::tempdir().unwrap(),
            sources: tempfile::tempdir().unwrap(),
        }
    }

    fn source(&self, name: &str) -> PathBuf {
        let path = self.sources.path().join(name);
        std::fs::write(&path, b"source media").unwrap();
        path
    }

    fn executor(&self, toolkit: Arc<ScriptedToolkit>) -> PipelineExecutor {
        let mut config = Config::default();
        config.storage.scratch_dir = self.scratch.path().to_path_buf();
        PipelineExecutor::new(Arc::new(config), toolkit).unwrap()
    }

    fn scratch_files(&self) -> Vec<String> {
        let mut files: Vec<String> = std::fs::read_dir(self.scratch.path())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        files.sort();
        files
    }
}

fn path_input(path: &Path) -> InputSource {
    InputSource::Path(path.to_path_buf())
}

#[tokio::test]
async fn concat_subtitle_bgm_convert_leaves_only_the_final_output() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(12.0));
    let executor = fixture.executor(toolkit.clone());

    let clip_a = fixture.source("a.mp4");
    let clip_b = fixture.source("b.mov");
    let srt = fixture.source("captions.srt");
    let music = fixture.source("music.mp3");

    let request = PipelineRequest::new(
        vec![path_input(&clip_a), path_input(&clip_b)],
        vec![
            json!({"type": "concat", "resolution": "720p", "fps": 30}),
            json!({"type": "subtitle", "mode": "hard", "subtitle_url": srt}),
            json!({"type": "bgm", "bgm_url": music, "mode": "mix", "bgm_gain": 0.3}),
            json!({"type": "convert", "format": "mp4", "quality": "medium"}),
        ],
    );

    let result = executor.run(request).await.unwrap();

    assert_eq!(
        toolkit.descriptions(),
        vec!["Normalization", "Normalization", "Concat", "Hard-sub", "BGM mix", "Video conversion"]
    );
    assert_eq!(result.output.media_type, MediaKind::Video);
    assert!(result.output.filename.starts_with("converted_"));
    assert!(result.output.filename.ends_with(".mp4"));
    assert_eq!(result.output.url, format!("/download/{}", result.output.filename));

    let conversion = result.conversion.expect("conversion record");
    assert_eq!(conversion.filename, result.output.filename);
    assert_eq!(conversion.file_size, 7);

    assert_eq!(fixture.scratch_files(), vec![result.output.filename.clone()]);
    for source in [&clip_a, &clip_b, &srt, &music] {
        assert!(source.exists(), "caller files are never touched");
    }
}

#[tokio::test]
async fn missing_subtitle_source_leaves_scratch_empty() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(12.0));
    let executor = fixture.executor(toolkit.clone());

    let clip_a = fixture.source("a.mp4");
    let clip_b = fixture.source("b.mp4");
    let request = PipelineRequest::new(
        vec![path_input(&clip_a), path_input(&clip_b)],
        vec![
            json!({"type": "concat"}),
            json!({"type": "subtitle", "subtitle_url": fixture.sources.path().join("missing.srt")}),
        ],
    );

    let result = executor.run(request).await;
    assert!(matches!(result, Err(MediaflowError::NotFound(_))));
    assert_eq!(toolkit.descriptions(), vec!["Normalization", "Normalization", "Concat"]);
    assert!(fixture.scratch_files().is_empty());
}

#[tokio::test]
async fn toolkit_failure_leaves_scratch_empty() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::failing_on("Concat"));
    let executor = fixture.executor(toolkit.clone());

    let request = PipelineRequest::new(
        vec![path_input(&fixture.source("a.mp4")), path_input(&fixture.source("b.mp4"))],
        vec![json!({"type": "concat"}), json!({"type": "convert"})],
    );

    let result = executor.run(request).await;
    assert!(matches!(result, Err(MediaflowError::ExternalTool { tool, .. }) if tool == "Concat"));
    assert!(fixture.scratch_files().is_empty());
}

#[tokio::test]
async fn single_input_concat_is_rejected_before_any_work() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(12.0));
    let executor = fixture.executor(toolkit.clone());

    let request = PipelineRequest::new(
        vec![path_input(&fixture.source("a.mp4"))],
        vec![json!({"type": "concat"})],
    );

    let result = executor.run(request).await;
    assert!(matches!(result, Err(MediaflowError::Validation(_))));
    assert!(toolkit.descriptions().is_empty());
    assert!(fixture.scratch_files().is_empty());
}

#[tokio::test]
async fn unsupported_format_is_rejected_before_any_encode() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(12.0));
    let executor = fixture.executor(toolkit.clone());

    let request = PipelineRequest::new(
        vec![path_input(&fixture.source("a.mp4")), path_input(&fixture.source("b.mp4"))],
        vec![json!({"type": "concat"}), json!({"type": "convert", "format": "gif"})],
    );

    let result = executor.run(request).await;
    assert!(matches!(result, Err(MediaflowError::UnsupportedFormat(_))));
    assert!(toolkit.descriptions().is_empty());
    assert!(fixture.scratch_files().is_empty());
}

#[tokio::test]
async fn audio_input_is_rejected_before_any_encode() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(12.0));
    let executor = fixture.executor(toolkit.clone());

    let request = PipelineRequest::new(
        vec![path_input(&fixture.source("song.mp3"))],
        vec![
            json!({"type": "convert", "format": "wav"}),
            json!({"type": "bgm", "bgm_url": fixture.source("music.mp3")}),
        ],
    );

    let result = executor.run(request).await;
    assert!(matches!(result, Err(MediaflowError::UnsupportedMediaType(_))));
    assert!(toolkit.descriptions().is_empty());
    assert!(fixture.scratch_files().is_empty());
}

#[test]
fn unknown_operation_is_rejected() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(12.0));
    let executor = fixture.executor(toolkit.clone());

    let request = PipelineRequest::new(
        vec![path_input(&fixture.source("a.mp4"))],
        vec![json!({"type": "convert"}), json!({"type": "stabilize"})],
    );

    let result = tokio_test::block_on(executor.run(request));
    assert!(matches!(result, Err(MediaflowError::UnknownOperation(name)) if name == "stabilize"));
    assert!(toolkit.descriptions().is_empty());
}

#[tokio::test]
async fn screenshots_past_the_end_are_skipped() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(10.0));
    let executor = fixture.executor(toolkit.clone());

    let request = PipelineRequest::new(
        vec![path_input(&fixture.source("a.mp4"))],
        vec![json!({"type": "screenshot", "timestamps": [2, 5, 15]})],
    );

    let result = executor.run(request).await.unwrap();
    let timestamps: Vec<f64> = result.screenshots.iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![2.0, 5.0]);
    assert_eq!(toolkit.descriptions(), vec!["Screenshot", "Screenshot"]);

    // The untouched input becomes the output alongside both frames
    let files = fixture.scratch_files();
    assert_eq!(files.len(), 3);
    assert!(files.contains(&result.output.filename));
    assert!(result.output.filename.starts_with("result_"));
    for shot in &result.screenshots {
        assert!(shot.file_path.exists());
        assert!(shot.filename.starts_with("screenshot_"));
    }
}

#[tokio::test]
async fn metadata_is_reported_next_to_the_output() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(42.5));
    let executor = fixture.executor(toolkit.clone());

    let request = PipelineRequest::new(
        vec![path_input(&fixture.source("a.mp4"))],
        vec![json!({"type": "metadata"}), json!({"type": "convert", "resolution": "480p"})],
    );

    let result = executor.run(request).await.unwrap();
    let report = result.metadata.expect("metadata report");
    assert_eq!(report.media_type, MediaKind::Video);
    assert_eq!(report.info.duration, 42.5);
    assert_eq!(result.conversion.map(|c| c.resolution), Some("480p".to_string()));
    assert_eq!(fixture.scratch_files().len(), 1);
}

#[tokio::test]
async fn empty_operation_list_produces_nothing() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(10.0));
    let executor = fixture.executor(toolkit);

    let request = PipelineRequest::new(vec![path_input(&fixture.source("a.mp4"))], vec![]);
    assert!(matches!(executor.run(request).await, Err(MediaflowError::NoOutputProduced)));
    assert!(fixture.scratch_files().is_empty());
}

#[tokio::test]
async fn standalone_capture_keeps_frames_and_removes_the_source() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(9.0));
    let executor = fixture.executor(toolkit);

    let params = serde_json::from_value(json!({"count": 2})).unwrap();
    let shots = executor.capture(&path_input(&fixture.source("a.mp4")), &params).await.unwrap();

    let timestamps: Vec<f64> = shots.iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![3.0, 6.0]);
    assert_eq!(fixture.scratch_files().len(), 2);
}

#[tokio::test]
async fn inspect_removes_everything_it_ingested() {
    let fixture = Fixture::new();
    let toolkit = Arc::new(ScriptedToolkit::new(5.0));
    let executor = fixture.executor(toolkit);

    let report = executor.inspect(&path_input(&fixture.source("song.mp3"))).await.unwrap();
    assert_eq!(report.media_type, MediaKind::Audio);
    assert!(fixture.scratch_files().is_empty());
}
