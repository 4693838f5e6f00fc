use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, MediaflowError};
use super::{MediaToolkit, MediaCommand, MediaCommandBuilder, ProbeOutput};

/// Concrete toolkit running the ffmpeg and ffprobe binaries
pub struct FfmpegToolkit {
    command_builder: MediaCommandBuilder,
}

impl FfmpegToolkit {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path),
        }
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn execute(&self, command: &MediaCommand) -> Result<()> {
        info!("Running {}", command.description);
        command.execute().await
    }

    async fn probe(&self, path: &Path) -> Result<ProbeOutput> {
        debug!("Probing {}", path.display());

        let stdout = self.command_builder.probe(path).capture().await?;
        serde_json::from_str(&stdout).map_err(|e| MediaflowError::ExternalTool {
            tool: "Probe".to_string(),
            message: format!("Failed to parse metadata for {}: {}", path.display(), e),
        })
    }

    async fn version(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let stdout = self.command_builder.version_check().capture().await?;
        // Extract the first line which typically contains the version
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}
