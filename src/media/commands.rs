use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, MediaflowError};
use crate::resolution::ResolutionSpec;
use super::presets::{self, BgmMode, Quality};

/// Abstract media processing command representation
#[derive(Debug, Clone, PartialEq)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn subtitle_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:s").arg(codec)
    }

    pub fn copy_video(self) -> Self {
        self.video_codec("copy")
    }

    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Disable audio
    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    pub fn crf(self, crf: u8) -> Self {
        self.arg("-crf").arg(crf.to_string())
    }

    pub fn preset<S: Into<String>>(self, preset: S) -> Self {
        self.arg("-preset").arg(preset)
    }

    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    pub fn filter_complex<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-filter_complex").arg(graph)
    }

    /// Select a stream or filter-graph label for the output
    pub fn map<S: Into<String>>(self, stream: S) -> Self {
        self.arg("-map").arg(stream)
    }

    pub fn faststart(self) -> Self {
        self.arg("-movflags").arg("+faststart")
    }

    /// Path of the file this command writes, when it writes one
    pub fn output_path(&self) -> Option<PathBuf> {
        match self.args.last() {
            Some(last) if !last.starts_with('-') && self.args.len() > 1 => Some(PathBuf::from(last)),
            _ => None,
        }
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }

    /// Execute the command and return its standard output
    pub async fn capture(&self) -> Result<String> {
        let output = self.run().await?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run(&self) -> Result<std::process::Output> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaflowError::ExternalTool {
                tool: self.description.clone(),
                message: format!("Failed to execute {}: {}", self.binary_path, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaflowError::ExternalTool {
                tool: self.description.clone(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(output)
    }
}

/// Settings shared by every clip normalised for concatenation
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeSettings {
    pub crf: u8,
    pub preset: String,
    pub resolution: Option<ResolutionSpec>,
    pub fps: Option<u32>,
    pub mute: bool,
}

impl NormalizeSettings {
    /// Comma-joined `-vf` chain, if any filter applies
    pub fn video_filters(&self) -> Option<String> {
        let mut filters = Vec::new();
        if let Some(resolution) = &self.resolution {
            filters.push(resolution.scale_filter());
        }
        if let Some(fps) = self.fps.filter(|fps| *fps > 0) {
            filters.push(format!("fps={}", fps));
        }
        if filters.is_empty() { None } else { Some(filters.join(",")) }
    }
}

/// Escape a path for use inside an ffmpeg filter argument
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | ':' | '\'' | ',' | '[' | ']' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Builder for the argument vectors of every operation
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn ffmpeg<S: Into<String>>(&self, description: S) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, description).overwrite()
    }

    /// Build format/stream probing command (JSON on stdout)
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Probe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .output(path)
    }

    /// Re-encode one concat input to the shared codec settings
    pub fn normalize_clip<P: AsRef<Path>>(&self, source: P, output: P, settings: &NormalizeSettings) -> MediaCommand {
        let mut cmd = self
            .ffmpeg("Normalization")
            .input(source)
            .video_codec(presets::VIDEO_CODEC)
            .preset(settings.preset.clone())
            .crf(settings.crf);

        cmd = if settings.mute { cmd.no_audio() } else { cmd.audio_codec(presets::AUDIO_CODEC) };

        if let Some(filters) = settings.video_filters() {
            cmd = cmd.video_filter(filters);
        }

        cmd.output(output)
    }

    /// Join normalised clips in order through the concat filter
    pub fn concat_clips<P: AsRef<Path>>(&self, clips: &[PathBuf], output: P, with_audio: bool) -> MediaCommand {
        let mut cmd = self.ffmpeg("Concat");
        for clip in clips {
            cmd = cmd.input(clip);
        }

        cmd = cmd
            .filter_complex(presets::concat_filter_graph(clips.len(), with_audio))
            .map("[outv]");
        if with_audio {
            cmd = cmd.map("[outa]");
        }

        cmd.faststart().output(output)
    }

    /// Build subtitle burn-in command
    pub fn hard_subtitle<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        fonts_dir: Option<&Path>,
        crf: u8,
        preset: &str,
        output_path: P,
    ) -> MediaCommand {
        let mut filter = format!("subtitles={}", escape_filter_path(subtitle_path.as_ref()));
        if let Some(dir) = fonts_dir {
            filter.push_str(&format!(":fontsdir={}", escape_filter_path(dir)));
        }

        self.ffmpeg("Hard-sub")
            .input(video_path)
            .video_filter(filter)
            .video_codec(presets::VIDEO_CODEC)
            .crf(crf)
            .preset(preset)
            .copy_audio()
            .output(output_path)
    }

    /// Build subtitle stream muxing command
    pub fn soft_subtitle<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        language: &str,
        output_path: P,
    ) -> MediaCommand {
        self.ffmpeg("Soft-sub")
            .input(video_path)
            .input(subtitle_path)
            .copy_video()
            .copy_audio()
            .subtitle_codec(presets::SOFT_SUBTITLE_CODEC)
            .arg("-metadata:s:s:0")
            .arg(format!("language={}", language))
            .output(output_path)
    }

    /// Build background audio mixing command
    pub fn mix_background<P: AsRef<Path>>(
        &self,
        video_path: P,
        bgm_path: P,
        mode: BgmMode,
        gain: f64,
        output_path: P,
    ) -> MediaCommand {
        self.ffmpeg("BGM mix")
            .input(video_path)
            .input(bgm_path)
            .filter_complex(presets::bgm_filter_graph(mode, gain))
            .map("0:v")
            .map("[outa]")
            .copy_video()
            .audio_codec(presets::AUDIO_CODEC)
            .audio_bitrate(presets::BGM_AUDIO_BITRATE)
            .output(output_path)
    }

    pub fn convert_video<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: P,
        quality: Quality,
        resolution: Option<ResolutionSpec>,
    ) -> MediaCommand {
        let mut cmd = self
            .ffmpeg("Video conversion")
            .input(input_path)
            .video_codec(presets::VIDEO_CODEC)
            .audio_codec(presets::AUDIO_CODEC)
            .crf(presets::video_crf(quality));

        if let Some(resolution) = resolution {
            cmd = cmd.video_filter(resolution.scale_filter());
        }

        cmd.output(output_path)
    }

    pub fn convert_audio<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: P,
        format: &str,
        quality: Quality,
    ) -> MediaCommand {
        let (flag, value) = presets::audio_quality_args(format, quality);
        self.ffmpeg("Audio conversion")
            .input(input_path)
            .arg(flag)
            .arg(value)
            .output(output_path)
    }

    /// Extract a single frame at `timestamp` seconds
    pub fn capture_frame<P: AsRef<Path>>(&self, input_path: P, timestamp: f64, output_path: P) -> MediaCommand {
        self.ffmpeg("Screenshot")
            .input(input_path)
            .arg("-ss")
            .arg(timestamp.to_string())
            .arg("-vframes")
            .arg("1")
            .arg("-q:v")
            .arg(presets::SCREENSHOT_JPEG_QUALITY)
            .output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MediaCommandBuilder {
        MediaCommandBuilder::new("ffmpeg", "ffprobe")
    }

    #[test]
    fn test_probe_command() {
        let cmd = builder().probe("/tmp/videos/a.mp4");
        assert_eq!(cmd.binary_path, "ffprobe");
        assert_eq!(
            cmd.args,
            vec!["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams", "/tmp/videos/a.mp4"]
        );
    }

    #[test]
    fn test_normalize_mute_with_filters() {
        let settings = NormalizeSettings {
            crf: 23,
            preset: "veryfast".to_string(),
            resolution: Some(ResolutionSpec::Exact { width: 1920, height: 1080 }),
            fps: Some(30),
            mute: true,
        };
        let cmd = builder().normalize_clip(Path::new("in.mp4"), Path::new("norm.mp4"), &settings);
        assert_eq!(
            cmd.args,
            vec![
                "-y", "-i", "in.mp4", "-c:v", "libx264", "-preset", "veryfast", "-crf", "23", "-an",
                "-vf", "scale=1920:1080,fps=30", "norm.mp4"
            ]
        );
    }

    #[test]
    fn test_normalize_without_filters_keeps_audio() {
        let settings = NormalizeSettings {
            crf: 20,
            preset: "fast".to_string(),
            resolution: None,
            fps: Some(0),
            mute: false,
        };
        assert_eq!(settings.video_filters(), None);
        let cmd = builder().normalize_clip(Path::new("in.mp4"), Path::new("norm.mp4"), &settings);
        assert!(cmd.args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(!cmd.args.contains(&"-vf".to_string()));
    }

    #[test]
    fn test_concat_command() {
        let clips = vec![PathBuf::from("n1.mp4"), PathBuf::from("n2.mp4")];
        let cmd = builder().concat_clips(&clips, Path::new("out.mp4"), true);
        assert_eq!(
            cmd.args,
            vec![
                "-y", "-i", "n1.mp4", "-i", "n2.mp4",
                "-filter_complex", "[0:v:0][0:a:0][1:v:0][1:a:0]concat=n=2:v=1:a=1[outv][outa]",
                "-map", "[outv]", "-map", "[outa]", "-movflags", "+faststart", "out.mp4"
            ]
        );

        let muted = builder().concat_clips(&clips, Path::new("out.mp4"), false);
        assert_eq!(muted.args.iter().filter(|a| *a == "-map").count(), 1);
        assert_eq!(muted.output_path(), Some(PathBuf::from("out.mp4")));
    }

    #[test]
    fn test_hard_subtitle_escapes_paths() {
        let cmd = builder().hard_subtitle(
            Path::new("v.mp4"),
            Path::new("/tmp/a:b/sub.srt"),
            Some(Path::new("/usr/share/fonts")),
            23,
            "veryfast",
            Path::new("out.mp4"),
        );
        assert!(cmd.args.contains(&"subtitles=/tmp/a\\:b/sub.srt:fontsdir=/usr/share/fonts".to_string()));
        assert!(cmd.args.windows(2).any(|w| w == ["-c:a", "copy"]));
    }

    #[test]
    fn test_soft_subtitle_language_tag() {
        let cmd = builder().soft_subtitle(Path::new("v.mp4"), Path::new("s.srt"), "th", Path::new("o.mp4"));
        assert!(cmd.args.windows(2).any(|w| w == ["-c:s", "mov_text"]));
        assert!(cmd.args.windows(2).any(|w| w == ["-metadata:s:s:0", "language=th"]));
        assert!(cmd.args.windows(2).any(|w| w == ["-c:v", "copy"]));
    }

    #[test]
    fn test_convert_commands() {
        let video = builder().convert_video(
            Path::new("in.mov"),
            Path::new("out.mp4"),
            Quality::High,
            Some(ResolutionSpec::Height(720)),
        );
        assert!(video.args.windows(2).any(|w| w == ["-crf", "18"]));
        assert!(video.args.windows(2).any(|w| w == ["-vf", "scale=-1:720"]));

        let audio = builder().convert_audio(Path::new("in.wav"), Path::new("out.ogg"), "ogg", Quality::Low);
        assert_eq!(audio.args, vec!["-y", "-i", "in.wav", "-q:a", "3", "out.ogg"]);
    }

    #[test]
    fn test_capture_frame() {
        let cmd = builder().capture_frame(Path::new("v.mp4"), 2.5, Path::new("shot.jpg"));
        assert_eq!(
            cmd.args,
            vec!["-y", "-i", "v.mp4", "-ss", "2.5", "-vframes", "1", "-q:v", "2", "shot.jpg"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_external_tool_error() {
        let cmd = MediaCommand::new("/nonexistent/ffmpeg-binary", "Version check").arg("-version");
        assert!(matches!(cmd.execute().await, Err(MediaflowError::ExternalTool { .. })));
    }
}
