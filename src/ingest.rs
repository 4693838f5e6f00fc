//! Bringing inputs into the scratch directory: remote URLs and local files.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::artifact::ArtifactNaming;
use crate::config::Config;
use crate::error::{Result, MediaflowError};
use crate::media::{MediaClassifier, MediaKind};
use crate::scratch::ScratchDir;

/// Where an input comes from. Serialized as `{"url": ...}` or `{"path": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Url(String),
    Path(PathBuf),
}

impl InputSource {
    /// `http(s)://` strings are URLs, anything else a local path
    pub fn parse(value: &str) -> Self {
        let lower = value.trim().to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            InputSource::Url(value.trim().to_string())
        } else {
            InputSource::Path(PathBuf::from(value))
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Url(url) => f.write_str(url),
            InputSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// What an ingested file is expected to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestKind {
    /// Video or audio; local files must pass extension or content checks
    Media,
    /// Subtitle track; no media checks
    Subtitle,
}

pub struct Ingestor {
    client: reqwest::Client,
    scratch: ScratchDir,
    classifier: MediaClassifier,
    max_file_size: u64,
    read_timeout: Duration,
    show_progress: bool,
}

impl Ingestor {
    pub fn new(config: &Config) -> Result<Self> {
        let read_timeout = Duration::from_secs(config.ingest.timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(read_timeout)
            .user_agent(config.ingest.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            scratch: ScratchDir::new(&config.storage),
            classifier: MediaClassifier::new(&config.media),
            max_file_size: config.storage.max_file_size,
            read_timeout,
            show_progress: false,
        })
    }

    /// Draw a progress bar while downloading
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Copy or download `source` into the scratch directory
    pub async fn ingest(&self, source: &InputSource, kind: IngestKind) -> Result<PathBuf> {
        self.scratch.ensure().await?;
        match source {
            InputSource::Url(url) => self.fetch_url(url).await,
            InputSource::Path(path) => self.import_file(path, kind).await,
        }
    }

    /// Download a remote input, enforcing the size ceiling while streaming
    pub async fn fetch_url(&self, url: &str) -> Result<PathBuf> {
        info!("Downloading media from URL: {}", url);

        let parsed = reqwest::Url::parse(url)
            .map_err(|_| MediaflowError::Validation(format!("Invalid URL: {}", url)))?;
        let has_host = parsed.host_str().is_some_and(|host| !host.is_empty());
        if !matches!(parsed.scheme(), "http" | "https") || !has_host {
            return Err(MediaflowError::Validation(format!("Invalid URL: {}", url)));
        }

        let extension = url_extension(&parsed);
        let path = ArtifactNaming::generate(self.scratch.path(), ArtifactNaming::INPUT_PREFIX, extension.as_deref());
        debug!("Created temp file: {}", path.display());

        match self.download_to(parsed, &path).await {
            Ok(downloaded) => {
                info!("Download completed: {} ({} bytes)", path.display(), downloaded);
                Ok(path)
            }
            Err(e) => {
                if fs::remove_file(&path).await.is_ok() {
                    debug!("Cleaned up temp file: {}", path.display());
                }
                Err(e)
            }
        }
    }

    async fn download_to(&self, url: reqwest::Url, path: &Path) -> Result<u64> {
        // Bounded per read, not per transfer: a large file may take longer than the timeout
        let mut response = tokio::time::timeout(self.read_timeout, self.client.get(url.clone()).send())
            .await
            .map_err(|_| self.timed_out(&url))??
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if !["video", "audio", "application/octet-stream"].iter().any(|t| content_type.contains(t)) {
            // Some servers mislabel media; classification happens later anyway
            warn!("Content type '{}' may not be a media file", content_type);
        }

        if let Some(expected) = response.content_length() {
            info!("Expected file size: {} bytes ({:.1} MB)", expected, expected as f64 / 1024.0 / 1024.0);
            if expected > self.max_file_size {
                return Err(MediaflowError::ResourceLimit { limit: self.max_file_size, actual: expected });
            }
        }

        let pb = if self.show_progress {
            let pb = ProgressBar::new(response.content_length().unwrap_or(0));
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut file = fs::File::create(path).await?;
        let mut downloaded: u64 = 0;
        loop {
            let chunk = match tokio::time::timeout(self.read_timeout, response.chunk()).await {
                Ok(chunk) => chunk?,
                Err(_) => {
                    pb.abandon();
                    return Err(self.timed_out(&url));
                }
            };
            let Some(chunk) = chunk else { break };

            downloaded += chunk.len() as u64;
            if downloaded > self.max_file_size {
                pb.abandon();
                return Err(MediaflowError::ResourceLimit { limit: self.max_file_size, actual: downloaded });
            }
            file.write_all(&chunk).await?;
            pb.set_position(downloaded);
        }
        file.flush().await?;
        pb.finish_and_clear();

        Ok(downloaded)
    }

    fn timed_out(&self, url: &reqwest::Url) -> MediaflowError {
        MediaflowError::Timeout(format!("no data from {} for {}s", url, self.read_timeout.as_secs()))
    }

    /// Copy a local file into the scratch directory
    pub async fn import_file(&self, path: &Path, kind: IngestKind) -> Result<PathBuf> {
        info!("Saving uploaded file: {}", path.display());

        let metadata = fs::metadata(path)
            .await
            .map_err(|_| MediaflowError::NotFound(path.display().to_string()))?;
        if !metadata.is_file() {
            return Err(MediaflowError::NotFound(path.display().to_string()));
        }
        if metadata.len() > self.max_file_size {
            return Err(MediaflowError::ResourceLimit { limit: self.max_file_size, actual: metadata.len() });
        }

        if kind == IngestKind::Media && self.classifier.classify_extension(path).is_none() {
            warn!("Unsupported file extension: {}", path.display());
            let mut head = vec![0u8; 1024];
            let mut file = fs::File::open(path).await?;
            let read = file.read(&mut head).await?;
            if MediaClassifier::sniff(&head[..read]) == MediaKind::Unknown {
                return Err(MediaflowError::UnsupportedMediaType(format!(
                    "Not a valid video or audio file: {}",
                    path.display()
                )));
            }
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());
        let dest = ArtifactNaming::generate(self.scratch.path(), ArtifactNaming::UPLOAD_PREFIX, extension.as_deref());
        fs::copy(path, &dest).await?;

        info!("File saved successfully: {}", dest.display());
        Ok(dest)
    }
}

/// Short alphanumeric extension of the URL's last path segment
fn url_extension(url: &reqwest::Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_lowercase())
}
