use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid resolution format: {0}. Supported formats: '720p', '1080p', '1920x1080', '1280:720', or single dimension")]
    InvalidResolution(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("{0} requires a media artifact (concat or single input first)")]
    MissingArtifact(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("No {0} stream found")]
    NoStreamFound(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Download timed out: {0}")]
    Timeout(String),

    #[error("File too large: {actual} bytes > {limit} bytes")]
    ResourceLimit { limit: u64, actual: u64 },

    #[error("No output produced")]
    NoOutputProduced,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MediaflowError {
    /// Errors caused by the request itself rather than by the toolkit or the host.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MediaflowError::Validation(_)
                | MediaflowError::InvalidResolution(_)
                | MediaflowError::UnsupportedFormat(_)
                | MediaflowError::UnknownOperation(_)
                | MediaflowError::MissingArtifact(_)
                | MediaflowError::NoOutputProduced
        )
    }
}

pub type Result<T> = std::result::Result<T, MediaflowError>;
