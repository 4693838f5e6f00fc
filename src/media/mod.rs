// Modular media processing architecture
//
// This module provides a clean abstraction over the external media toolkit:
// - Kind: video/audio classification of artifacts
// - Commands: argument-vector builders for every operation
// - Presets: static quality tables and filter-graph templates
// - Probe: ffprobe output model and metadata extraction
// - Processor: ffmpeg/ffprobe-backed toolkit implementation

pub mod commands;
pub mod kind;
pub mod presets;
pub mod probe;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use commands::*;
pub use kind::*;
pub use probe::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Seam between the pipeline and the external encode/probe binaries
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Run an encode command; non-zero exit is an `ExternalTool` error
    async fn execute(&self, command: &MediaCommand) -> Result<()>;

    /// Probe format and stream metadata of a file
    async fn probe(&self, path: &Path) -> Result<ProbeOutput>;

    /// First line of the encoder's version banner
    async fn version(&self) -> Result<String>;
}

/// Factory for creating media toolkit instances
pub struct MediaToolkitFactory;

impl MediaToolkitFactory {
    /// Create the default toolkit implementation (FFmpeg-based)
    pub fn create_toolkit(config: &MediaConfig) -> Arc<dyn MediaToolkit> {
        Arc::new(processor::FfmpegToolkit::new(config))
    }
}
