//! Resolution expressions to ffmpeg `scale` arguments.

use serde::Serialize;
use std::fmt;

use crate::error::{Result, MediaflowError};

pub const MAX_WIDTH: u32 = 7680;
pub const MAX_HEIGHT: u32 = 4320;

/// Named resolutions, matched case-insensitively before any numeric form.
pub const RESOLUTION_PRESETS: &[(&str, u32, u32)] = &[
    ("240p", 426, 240),
    ("360p", 640, 360),
    ("480p", 854, 480),
    ("720p", 1280, 720),
    ("1080p", 1920, 1080),
    ("1440p", 2560, 1440),
    ("2160p", 3840, 2160),
    ("4k", 3840, 2160),
    ("9:16", 1080, 1920),
    ("9x16", 1080, 1920),
    ("portrait", 1080, 1920),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionSpec {
    /// Both dimensions given
    Exact { width: u32, height: u32 },
    /// Target height, width follows the source aspect ratio (`-1:height`)
    Height(u32),
}

impl ResolutionSpec {
    pub fn scale_filter(&self) -> String {
        format!("scale={}", self)
    }
}

impl fmt::Display for ResolutionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSpec::Exact { width, height } => write!(f, "{}:{}", width, height),
            ResolutionSpec::Height(height) => write!(f, "-1:{}", height),
        }
    }
}

/// Resolve a user supplied resolution expression.
///
/// Forms are tried in order: preset name, `WIDTHxHEIGHT`, `WIDTH:HEIGHT`,
/// and a bare height.
pub fn resolve(expr: &str) -> Result<ResolutionSpec> {
    let normalized = expr.trim().to_lowercase();

    if let Some(&(_, width, height)) = RESOLUTION_PRESETS.iter().find(|(name, _, _)| *name == normalized) {
        return Ok(ResolutionSpec::Exact { width, height });
    }

    for separator in ['x', ':'] {
        if normalized.contains(separator) {
            if let Some(spec) = parse_pair(&normalized, separator) {
                return Ok(spec);
            }
        }
    }

    if let Ok(height) = normalized.parse::<u32>() {
        if height > 0 && height <= MAX_HEIGHT {
            return Ok(ResolutionSpec::Height(height));
        }
    }

    Err(MediaflowError::InvalidResolution(expr.to_string()))
}

fn parse_pair(expr: &str, separator: char) -> Option<ResolutionSpec> {
    let mut parts = expr.split(separator);
    let (width, height) = match (parts.next(), parts.next(), parts.next()) {
        (Some(w), Some(h), None) => (w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?),
        _ => return None,
    };

    if width > 0 && height > 0 && width <= MAX_WIDTH && height <= MAX_HEIGHT {
        Some(ResolutionSpec::Exact { width, height })
    } else {
        None
    }
}
