//! Periodic removal of expired outputs from the scratch directory.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::artifact::ArtifactNaming;
use crate::config::StorageConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub retention: Duration,
}

impl RetentionPolicy {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.retention_window())
    }

    /// Request-scoped inputs are never touched by the sweep
    pub fn is_exempt(&self, file_name: &str) -> bool {
        ArtifactNaming::is_request_scoped(file_name)
    }

    pub fn is_expired(&self, age: Duration) -> bool {
        age > self.retention
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub removed: usize,
    pub errors: usize,
    pub exempt: usize,
}

/// One pass over `dir` as of `now`
pub fn sweep(dir: &Path, policy: &RetentionPolicy, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    if !dir.exists() {
        debug!("Temp directory does not exist, skipping cleanup");
        return report;
    }

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if policy.is_exempt(&file_name) {
            report.exempt += 1;
            continue;
        }

        let age = entry
            .metadata()
            .ok()
            .and_then(|metadata| metadata.modified().ok())
            .and_then(|modified| now.duration_since(modified).ok());

        if let Some(age) = age.filter(|age| policy.is_expired(*age)) {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    report.removed += 1;
                    info!("Cleaned up old file: {} (age: {:.1}h)", file_name, age.as_secs_f64() / 3600.0);
                }
                Err(e) => {
                    report.errors += 1;
                    error!("Failed to clean up {}: {}", file_name, e);
                }
            }
        }
    }

    if report.removed > 0 || report.errors > 0 {
        info!("Cleanup completed: {} files cleaned, {} errors", report.removed, report.errors);
    }

    report
}

/// Background task running [`sweep`] on a fixed interval until stopped
pub struct RetentionSweeper {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RetentionSweeper {
    /// The first sweep runs immediately.
    pub fn start(dir: PathBuf, policy: RetentionPolicy, interval: Duration) -> Self {
        let (shutdown, mut stop) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            info!(
                "Started cleanup task (interval: {}s, retention: {}s)",
                interval.as_secs(),
                policy.retention.as_secs()
            );
            let mut ticker = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let dir = dir.clone();
                        let result = tokio::task::spawn_blocking(move || sweep(&dir, &policy, SystemTime::now())).await;
                        if let Err(e) = result {
                            error!("Cleanup error: {}", e);
                        }
                    }
                    _ = &mut stop => {
                        info!("Cleanup task stopped");
                        break;
                    }
                }
            }
        });

        Self {
            shutdown: Some(shutdown),
            handle,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::start(
            config.scratch_dir.clone(),
            RetentionPolicy::from_config(config),
            config.cleanup_interval(),
        )
    }

    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            error!("Cleanup task ended abnormally: {}", e);
        }
    }
}
