use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::config::MediaConfig;
use crate::error::{Result, MediaflowError};

/// Top-level kind of a media artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Unknown => "unknown",
        }
    }

    /// Classify by top-level MIME category.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next() {
            Some("video") => MediaKind::Video,
            Some("audio") => MediaKind::Audio,
            _ => MediaKind::Unknown,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension first, content sniffing second.
#[derive(Debug, Clone)]
pub struct MediaClassifier {
    config: MediaConfig,
}

impl MediaClassifier {
    pub fn new(config: &MediaConfig) -> Self {
        Self { config: config.clone() }
    }

    pub fn classify(&self, path: &Path) -> MediaKind {
        if let Some(kind) = self.classify_extension(path) {
            return kind;
        }

        match infer::get_from_path(path) {
            Ok(Some(detected)) => {
                debug!("Detected MIME type {} for {}", detected.mime_type(), path.display());
                MediaKind::from_mime(detected.mime_type())
            }
            Ok(None) => MediaKind::Unknown,
            Err(e) => {
                debug!("Content sniffing failed for {}: {}", path.display(), e);
                MediaKind::Unknown
            }
        }
    }

    /// Like [`classify`](Self::classify) but `Unknown` is an error.
    pub fn classify_known(&self, path: &Path) -> Result<MediaKind> {
        match self.classify(path) {
            MediaKind::Unknown => Err(MediaflowError::UnsupportedMediaType(path.display().to_string())),
            kind => Ok(kind),
        }
    }

    pub fn classify_extension(&self, path: &Path) -> Option<MediaKind> {
        let ext = path.extension()?.to_str()?;
        if self.config.is_video_extension(ext) {
            Some(MediaKind::Video)
        } else if self.config.is_audio_extension(ext) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    /// Classify a leading chunk of file content.
    pub fn sniff(buf: &[u8]) -> MediaKind {
        infer::get(buf)
            .map(|detected| MediaKind::from_mime(detected.mime_type()))
            .unwrap_or(MediaKind::Unknown)
    }
}
