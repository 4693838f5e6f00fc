use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, MediaflowError};

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("/tmp/videos")
}

fn default_max_file_size() -> u64 {
    524_288_000
}

fn default_retention_hours() -> u64 {
    2
}

fn default_cleanup_interval_minutes() -> u64 {
    30
}

fn default_encode_preset() -> String {
    "veryfast".to_string()
}

fn default_encode_crf() -> u8 {
    23
}

fn default_subtitle_language() -> String {
    "th".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("mediaflow/{}", env!("CARGO_PKG_VERSION"))
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Scratch directory holding every input, intermediate and output file
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    /// Maximum size of an uploaded or downloaded input in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Outputs older than this are removed by the retention sweep
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    /// Period of the retention sweep
    #[serde(default = "default_cleanup_interval_minutes")]
    pub cleanup_interval_minutes: u64,
    /// Prefix for download URLs; relative `/download/<name>` URLs when unset
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    #[serde(default = "MediaConfig::default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    #[serde(default = "MediaConfig::default_ffprobe_path")]
    pub ffprobe_path: String,
    /// Extensions classified as video without content sniffing
    #[serde(default = "MediaConfig::default_video_extensions")]
    pub video_extensions: Vec<String>,
    /// Extensions classified as audio without content sniffing
    #[serde(default = "MediaConfig::default_audio_extensions")]
    pub audio_extensions: Vec<String>,
    /// Containers a video artifact may be converted to
    #[serde(default = "MediaConfig::default_video_output_formats")]
    pub video_output_formats: Vec<String>,
    /// Containers an audio artifact may be converted to
    #[serde(default = "MediaConfig::default_audio_output_formats")]
    pub audio_output_formats: Vec<String>,
    /// x264 speed preset used when an operation does not name one
    /// (ultrafast, superfast, veryfast, faster, fast, medium, slow, slower, veryslow)
    #[serde(default = "default_encode_preset")]
    pub encode_preset: String,
    /// x264 CRF used when an operation does not name one (0-51, lower = better quality)
    #[serde(default = "default_encode_crf")]
    pub encode_crf: u8,
    /// Language tag written on soft subtitle streams
    #[serde(default = "default_subtitle_language")]
    pub subtitle_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Connect timeout, and the longest wait for each chunk of a remote input
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            max_file_size: default_max_file_size(),
            retention_hours: default_retention_hours(),
            cleanup_interval_minutes: default_cleanup_interval_minutes(),
            base_url: None,
        }
    }
}

impl StorageConfig {
    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_minutes.max(1) * 60)
    }
}

impl MediaConfig {
    fn default_ffmpeg_path() -> String {
        "ffmpeg".to_string()
    }

    fn default_ffprobe_path() -> String {
        "ffprobe".to_string()
    }

    fn default_video_extensions() -> Vec<String> {
        split_list("mp4,avi,mov,mkv,flv,wmv,webm,m4v")
    }

    fn default_audio_extensions() -> Vec<String> {
        split_list("mp3,wav,flac,aac,ogg,m4a,wma,opus")
    }

    fn default_video_output_formats() -> Vec<String> {
        split_list("mp4,avi,mov,mkv,webm")
    }

    fn default_audio_output_formats() -> Vec<String> {
        split_list("mp3,wav,flac,aac,ogg,m4a,opus")
    }

    pub fn is_video_extension(&self, ext: &str) -> bool {
        let ext = normalize_extension(ext);
        self.video_extensions.iter().any(|e| normalize_extension(e) == ext)
    }

    pub fn is_audio_extension(&self, ext: &str) -> bool {
        let ext = normalize_extension(ext);
        self.audio_extensions.iter().any(|e| normalize_extension(e) == ext)
    }

    pub fn supports_video_output(&self, format: &str) -> bool {
        let format = normalize_extension(format);
        self.video_output_formats.iter().any(|f| normalize_extension(f) == format)
    }

    pub fn supports_audio_output(&self, format: &str) -> bool {
        let format = normalize_extension(format);
        self.audio_output_formats.iter().any(|f| normalize_extension(f) == format)
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: Self::default_ffmpeg_path(),
            ffprobe_path: Self::default_ffprobe_path(),
            video_extensions: Self::default_video_extensions(),
            audio_extensions: Self::default_audio_extensions(),
            video_output_formats: Self::default_video_output_formats(),
            audio_output_formats: Self::default_audio_output_formats(),
            encode_preset: default_encode_preset(),
            encode_crf: default_encode_crf(),
            subtitle_language: default_subtitle_language(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MediaflowError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| MediaflowError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MediaflowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| MediaflowError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.max_file_size == 0 {
            return Err(MediaflowError::Config("max_file_size must be positive".to_string()));
        }

        if let Some(ext) = self.media.video_extensions.iter().find(|e| self.media.is_audio_extension(e)) {
            return Err(MediaflowError::Config(format!(
                "Extension '{}' is listed as both video and audio",
                ext
            )));
        }

        if self.media.encode_crf > 51 {
            return Err(MediaflowError::Config(format!(
                "encode_crf must be between 0 and 51, got {}",
                self.media.encode_crf
            )));
        }

        Ok(())
    }
}
