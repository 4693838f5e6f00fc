//! Files produced or consumed by a pipeline run and their cleanup.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, MediaflowError};
use crate::media::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    Input,
    Intermediate,
    Output,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaArtifact {
    pub path: PathBuf,
    pub role: ArtifactRole,
    pub kind: MediaKind,
    pub created_at: DateTime<Utc>,
}

impl MediaArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Scratch file naming. Every generated name embeds a fresh random token.
pub struct ArtifactNaming;

impl ArtifactNaming {
    /// Inputs fetched from a URL
    pub const INPUT_PREFIX: &'static str = "input";
    /// Inputs imported from a local file
    pub const UPLOAD_PREFIX: &'static str = "upload";
    /// Inputs promoted to the run's output
    pub const RESULT_PREFIX: &'static str = "result";

    pub fn token() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// `<dir>/<prefix>_<token>[.<ext>]`
    pub fn generate(dir: &Path, prefix: &str, extension: Option<&str>) -> PathBuf {
        let mut name = format!("{}_{}", prefix, Self::token());
        if let Some(ext) = extension.filter(|ext| !ext.is_empty()) {
            name.push('.');
            name.push_str(ext);
        }
        dir.join(name)
    }

    /// `<dir>/<prefix>_<token>_<suffix>.<ext>`
    pub fn generate_with_suffix(dir: &Path, prefix: &str, suffix: impl std::fmt::Display, extension: &str) -> PathBuf {
        dir.join(format!("{}_{}_{}.{}", prefix, Self::token(), suffix, extension))
    }

    /// Names removed by their owning request rather than by the retention sweep
    pub fn is_request_scoped(file_name: &str) -> bool {
        [Self::INPUT_PREFIX, Self::UPLOAD_PREFIX]
            .iter()
            .any(|prefix| file_name.starts_with(&format!("{}_", prefix)))
    }
}

/// Bookkeeping of every artifact touched by one pipeline run.
///
/// Operation results are registered as intermediates and only [`promote`]
/// creates outputs, so an artifact replaced as the current one already holds
/// its final role: intermediate, or input if it was never transformed.
///
/// [`promote`]: ArtifactLifecycle::promote
///
/// Dropping an unsettled lifecycle removes everything it tracks.
#[derive(Debug)]
pub struct ArtifactLifecycle {
    run_id: String,
    artifacts: Vec<MediaArtifact>,
    settled: bool,
}

impl ArtifactLifecycle {
    pub fn new<S: Into<String>>(run_id: S) -> Self {
        Self {
            run_id: run_id.into(),
            artifacts: Vec::new(),
            settled: false,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn register(&mut self, path: PathBuf, role: ArtifactRole, kind: MediaKind) -> MediaArtifact {
        let artifact = MediaArtifact {
            path,
            role,
            kind,
            created_at: Utc::now(),
        };
        debug!("[{}] Registered {:?} artifact {}", self.run_id, role, artifact.path.display());
        self.artifacts.push(artifact.clone());
        artifact
    }

    pub fn register_input(&mut self, path: PathBuf, kind: MediaKind) -> MediaArtifact {
        self.register(path, ArtifactRole::Input, kind)
    }

    pub fn register_intermediate(&mut self, path: PathBuf, kind: MediaKind) -> MediaArtifact {
        self.register(path, ArtifactRole::Intermediate, kind)
    }

    pub fn role_of(&self, path: &Path) -> Option<ArtifactRole> {
        self.artifacts.iter().find(|a| a.path == path).map(|a| a.role)
    }

    pub fn artifacts(&self) -> &[MediaArtifact] {
        &self.artifacts
    }

    pub fn with_role(&self, role: ArtifactRole) -> impl Iterator<Item = &MediaArtifact> {
        self.artifacts.iter().filter(move |a| a.role == role)
    }

    /// Re-tag an artifact as output so it survives the run.
    ///
    /// An input carries a request-scoped name; it is renamed first so the
    /// retention sweep can reclaim it later.
    pub async fn promote(&mut self, path: &Path) -> Result<MediaArtifact> {
        let index = self
            .artifacts
            .iter()
            .position(|a| a.path == path)
            .ok_or_else(|| MediaflowError::NotFound(path.display().to_string()))?;

        if self.artifacts[index].role == ArtifactRole::Input {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let extension = path.extension().and_then(|ext| ext.to_str());
            let renamed = ArtifactNaming::generate(dir, ArtifactNaming::RESULT_PREFIX, extension);
            tokio::fs::rename(path, &renamed).await?;
            debug!("[{}] Renamed input {} -> {}", self.run_id, path.display(), renamed.display());
            self.artifacts[index].path = renamed;
        }

        self.artifacts[index].role = ArtifactRole::Output;
        Ok(self.artifacts[index].clone())
    }

    /// Successful run: remove inputs and intermediates, keep outputs.
    pub async fn commit(mut self) -> Vec<MediaArtifact> {
        self.settled = true;
        let artifacts = std::mem::take(&mut self.artifacts);
        let (outputs, disposable): (Vec<_>, Vec<_>) =
            artifacts.into_iter().partition(|a| a.role == ArtifactRole::Output);

        let removed = remove_all(&self.run_id, &disposable).await;
        debug!("[{}] Committed: kept {} outputs, removed {} files", self.run_id, outputs.len(), removed);
        outputs
    }

    /// Failed run: remove everything, outputs included.
    pub async fn abort(mut self) -> usize {
        self.settled = true;
        let artifacts = std::mem::take(&mut self.artifacts);
        let removed = remove_all(&self.run_id, &artifacts).await;
        debug!("[{}] Aborted: removed {} files", self.run_id, removed);
        removed
    }
}

impl Drop for ArtifactLifecycle {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        for artifact in &self.artifacts {
            match std::fs::remove_file(&artifact.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("[{}] Failed to clean up {}: {}", self.run_id, artifact.path.display(), e),
            }
        }
    }
}

async fn remove_all(run_id: &str, artifacts: &[MediaArtifact]) -> usize {
    let mut removed = 0;
    for artifact in artifacts {
        match tokio::fs::remove_file(&artifact.path).await {
            Ok(()) => {
                debug!("[{}] Cleaned up temp file: {}", run_id, artifact.path.display());
                removed += 1;
            }
            // Never written, e.g. the toolkit failed before creating it
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("[{}] Failed to clean up temp file {}: {}", run_id, artifact.path.display(), e),
        }
    }
    removed
}
