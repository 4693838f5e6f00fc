//! Static encoder tables and filter-graph templates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MediaflowError;

/// Quality tier requested by a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }

    fn index(&self) -> usize {
        match self {
            Quality::Low => 0,
            Quality::Medium => 1,
            Quality::High => 2,
        }
    }
}

impl FromStr for Quality {
    type Err = MediaflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            other => Err(MediaflowError::Validation(format!("Unknown quality tier '{}'", other))),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const VIDEO_CODEC: &str = "libx264";
pub const AUDIO_CODEC: &str = "aac";

/// x264 CRF per quality tier (low, medium, high); higher compresses more
pub const VIDEO_QUALITY_CRF: [u8; 3] = [28, 23, 18];

pub fn video_crf(quality: Quality) -> u8 {
    VIDEO_QUALITY_CRF[quality.index()]
}

/// Per-container audio flags for (low, medium, high)
pub const AUDIO_QUALITY_TABLE: &[(&str, [(&str, &str); 3])] = &[
    ("mp3", [("-b:a", "128k"), ("-b:a", "192k"), ("-b:a", "320k")]),
    ("aac", [("-b:a", "128k"), ("-b:a", "192k"), ("-b:a", "256k")]),
    ("ogg", [("-q:a", "3"), ("-q:a", "6"), ("-q:a", "9")]),
    ("opus", [("-b:a", "96k"), ("-b:a", "128k"), ("-b:a", "192k")]),
];

/// Used for any container missing from [`AUDIO_QUALITY_TABLE`]
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";

pub fn audio_quality_args(format: &str, quality: Quality) -> (&'static str, &'static str) {
    AUDIO_QUALITY_TABLE
        .iter()
        .find(|(container, _)| *container == format)
        .map(|(_, tiers)| tiers[quality.index()])
        .unwrap_or(("-b:a", DEFAULT_AUDIO_BITRATE))
}

pub const X264_PRESETS: &[&str] = &[
    "ultrafast", "superfast", "veryfast", "faster", "fast", "medium", "slow", "slower", "veryslow", "placebo",
];

pub fn is_x264_preset(name: &str) -> bool {
    X264_PRESETS.contains(&name)
}

pub const MAX_CRF: u8 = 51;

/// How the background track is combined with the main audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BgmMode {
    #[default]
    Mix,
    Ducking,
}

impl BgmMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BgmMode::Mix => "mix",
            BgmMode::Ducking => "ducking",
        }
    }
}

impl FromStr for BgmMode {
    type Err = MediaflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mix" => Ok(BgmMode::Mix),
            "ducking" => Ok(BgmMode::Ducking),
            other => Err(MediaflowError::Validation(format!("Unknown bgm mode '{}' (expected mix or ducking)", other))),
        }
    }
}

pub const DEFAULT_BGM_GAIN: f64 = 0.25;
pub const BGM_AUDIO_BITRATE: &str = "192k";

/// Side-chain compressor envelope used for ducking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorEnvelope {
    pub threshold: f64,
    pub ratio: u32,
    pub attack_ms: u32,
    pub release_ms: u32,
}

pub const DUCKING_ENVELOPE: CompressorEnvelope = CompressorEnvelope {
    threshold: 0.03,
    ratio: 8,
    attack_ms: 5,
    release_ms: 200,
};

/// Filter graph mixing input 1 (background) into input 0; labels the result `[outa]`.
pub fn bgm_filter_graph(mode: BgmMode, gain: f64) -> String {
    match mode {
        BgmMode::Mix => format!(
            "[0:a]volume=1.0[a0];[1:a]volume={}[a1];[a0][a1]amix=inputs=2:dropout_transition=2:normalize=1[outa]",
            gain
        ),
        BgmMode::Ducking => {
            let env = DUCKING_ENVELOPE;
            format!(
                "[1:a]volume={}[b];[0:a][b]sidechaincompress=threshold={}:ratio={}:attack={}:release={}[outa]",
                gain, env.threshold, env.ratio, env.attack_ms, env.release_ms
            )
        }
    }
}

/// Filter graph joining `count` inputs in order into `[outv]` (and `[outa]`).
pub fn concat_filter_graph(count: usize, with_audio: bool) -> String {
    let inputs: String = (0..count)
        .map(|i| if with_audio { format!("[{i}:v:0][{i}:a:0]") } else { format!("[{i}:v:0]") })
        .collect();

    if with_audio {
        format!("{inputs}concat=n={count}:v=1:a=1[outv][outa]")
    } else {
        format!("{inputs}concat=n={count}:v=1:a=0[outv]")
    }
}

/// Positions, as fractions of duration, used when no timestamps or count are given
pub const DEFAULT_SCREENSHOT_FRACTIONS: [f64; 3] = [0.25, 0.5, 0.75];

/// Upper bound on frames captured by one screenshot operation
pub const MAX_SCREENSHOT_COUNT: usize = 100;

/// JPEG quality scale for captured frames (2 = near best)
pub const SCREENSHOT_JPEG_QUALITY: &str = "2";

pub const SOFT_SUBTITLE_CODEC: &str = "mov_text";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_crf() {
        assert_eq!(video_crf(Quality::Low), 28);
        assert_eq!(video_crf(Quality::Medium), 23);
        assert_eq!(video_crf(Quality::High), 18);
    }

    #[test]
    fn test_audio_table_and_default() {
        assert_eq!(audio_quality_args("mp3", Quality::High), ("-b:a", "320k"));
        assert_eq!(audio_quality_args("ogg", Quality::Low), ("-q:a", "3"));
        assert_eq!(audio_quality_args("opus", Quality::Medium), ("-b:a", "128k"));
        assert_eq!(audio_quality_args("flac", Quality::High), ("-b:a", "192k"));
        assert_eq!(audio_quality_args("wav", Quality::Low), ("-b:a", "192k"));
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("HIGH".parse::<Quality>().unwrap(), Quality::High);
        assert!("ultra".parse::<Quality>().is_err());
        assert_eq!("Ducking".parse::<BgmMode>().unwrap(), BgmMode::Ducking);
        assert!("sidechain".parse::<BgmMode>().is_err());
    }

    #[test]
    fn test_concat_graphs() {
        assert_eq!(
            concat_filter_graph(2, true),
            "[0:v:0][0:a:0][1:v:0][1:a:0]concat=n=2:v=1:a=1[outv][outa]"
        );
        assert_eq!(
            concat_filter_graph(3, false),
            "[0:v:0][1:v:0][2:v:0]concat=n=3:v=1:a=0[outv]"
        );
    }

    #[test]
    fn test_bgm_graphs() {
        assert_eq!(
            bgm_filter_graph(BgmMode::Mix, 0.3),
            "[0:a]volume=1.0[a0];[1:a]volume=0.3[a1];[a0][a1]amix=inputs=2:dropout_transition=2:normalize=1[outa]"
        );
        assert_eq!(
            bgm_filter_graph(BgmMode::Ducking, 0.25),
            "[1:a]volume=0.25[b];[0:a][b]sidechaincompress=threshold=0.03:ratio=8:attack=5:release=200[outa]"
        );
    }
}
