use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::{Result, MediaflowError};

/// The shared scratch directory and the download surface over it
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
    base_url: Option<String>,
}

impl ScratchDir {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.scratch_dir.clone(),
            base_url: config
                .base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub async fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Download URL for a file in the scratch directory
    pub fn download_url(&self, file_name: &str) -> String {
        let relative = format!("/download/{}", file_name);
        match &self.base_url {
            Some(base) => format!("{}{}", base, relative),
            None => relative,
        }
    }

    /// Resolve a bare file name to an existing scratch file.
    pub fn resolve(&self, file_name: &str) -> Result<PathBuf> {
        let mut components = Path::new(file_name).components();
        let is_plain = matches!((components.next(), components.next()), (Some(Component::Normal(_)), None));
        if !is_plain {
            return Err(MediaflowError::NotFound(file_name.to_string()));
        }

        let path = self.root.join(file_name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(MediaflowError::NotFound(file_name.to_string()))
        }
    }

    /// Copy an output to `dest`, optionally deleting it right away.
    pub async fn download(&self, file_name: &str, dest: &Path, delete: bool) -> Result<u64> {
        let path = self.resolve(file_name)?;
        let bytes = fs::copy(&path, dest).await?;
        info!("Serving file {} ({} bytes) -> {}", file_name, bytes, dest.display());

        if delete {
            fs::remove_file(&path).await?;
            info!("Auto-deleted file after download: {}", file_name);
        }

        Ok(bytes)
    }
}
