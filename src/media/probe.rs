use serde::{Deserialize, Serialize};

use crate::error::{Result, MediaflowError};
use super::kind::MediaKind;

/// `ffprobe -print_format json -show_format -show_streams` output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub format: ProbeFormat,
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeFormat {
    pub duration: Option<String>,
    pub size: Option<String>,
    pub format_name: Option<String>,
    pub bit_rate: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub r_frame_rate: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
}

impl ProbeOutput {
    /// First stream whose `codec_type` matches `kind`
    pub fn first_stream(&self, kind: MediaKind) -> Option<&ProbeStream> {
        self.streams
            .iter()
            .find(|stream| stream.codec_type.as_deref() == Some(kind.as_str()))
    }

    pub fn has_stream(&self, kind: MediaKind) -> bool {
        self.first_stream(kind).is_some()
    }

    pub fn duration(&self) -> f64 {
        parse_or_zero(self.format.duration.as_deref())
    }
}

/// Metadata record for one artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub duration: f64,
    pub size: u64,
    pub format_name: String,
    pub codec_name: String,
    pub bit_rate: u64,
    #[serde(flatten)]
    pub details: StreamDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamDetails {
    Video {
        width: u32,
        height: u32,
        frame_rate: f64,
    },
    Audio {
        sample_rate: u32,
        channels: u32,
        channel_layout: String,
    },
}

impl MediaInfo {
    pub fn from_probe(probe: &ProbeOutput, kind: MediaKind) -> Result<Self> {
        let find_stream = || {
            probe
                .first_stream(kind)
                .ok_or_else(|| MediaflowError::NoStreamFound(kind.to_string()))
        };

        let (stream, details) = match kind {
            MediaKind::Video => {
                let stream = find_stream()?;
                let details = StreamDetails::Video {
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    frame_rate: parse_frame_rate(stream.r_frame_rate.as_deref().unwrap_or("0/1")),
                };
                (stream, details)
            }
            MediaKind::Audio => {
                let stream = find_stream()?;
                let details = StreamDetails::Audio {
                    sample_rate: parse_or_zero(stream.sample_rate.as_deref()),
                    channels: stream.channels.unwrap_or(0),
                    channel_layout: stream.channel_layout.clone().unwrap_or_default(),
                };
                (stream, details)
            }
            MediaKind::Unknown => {
                return Err(MediaflowError::UnsupportedMediaType(
                    "cannot extract metadata from unknown media".to_string(),
                ));
            }
        };

        Ok(Self {
            duration: probe.duration(),
            size: parse_or_zero(probe.format.size.as_deref()),
            format_name: probe.format.format_name.clone().unwrap_or_default(),
            codec_name: stream.codec_name.clone().unwrap_or_default(),
            bit_rate: parse_or_zero(probe.format.bit_rate.as_deref()),
            details,
        })
    }
}

/// Frame rate from an ffprobe rational such as `30000/1001`.
///
/// A zero denominator or an unparsable value yields `0.0`.
pub fn parse_frame_rate(rate: &str) -> f64 {
    match rate.split_once('/') {
        Some((num, den)) => match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(num), Ok(den)) if den != 0.0 => num / den,
            _ => 0.0,
        },
        None => rate.trim().parse::<f64>().unwrap_or(0.0),
    }
}

fn parse_or_zero<T: std::str::FromStr + Default>(value: Option<&str>) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_PROBE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "sample_rate": "48000", "channels": 2, "channel_layout": "stereo"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "10.000000", "size": "1048576", "bit_rate": "838860"}
    }"#;

    #[test]
    fn test_frame_rate_parsing() {
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("30/1"), 30.0);
        assert_eq!(parse_frame_rate("30/0"), 0.0);
        assert_eq!(parse_frame_rate("not-a-fraction"), 0.0);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("a/b"), 0.0);
    }

    #[test]
    fn test_video_info() {
        let probe: ProbeOutput = serde_json::from_str(VIDEO_PROBE).unwrap();
        let info = MediaInfo::from_probe(&probe, MediaKind::Video).unwrap();

        assert_eq!(info.duration, 10.0);
        assert_eq!(info.size, 1_048_576);
        assert_eq!(info.codec_name, "h264");
        assert_eq!(info.bit_rate, 838_860);
        match &info.details {
            StreamDetails::Video { width, height, frame_rate } => {
                assert_eq!((*width, *height), (1920, 1080));
                assert!((frame_rate - 29.97).abs() < 0.01);
            }
            other => panic!("unexpected details {:?}", other),
        }

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["width"], 1920);
        assert!(json.get("sample_rate").is_none());
    }

    #[test]
    fn test_audio_info_picks_audio_stream() {
        let probe: ProbeOutput = serde_json::from_str(VIDEO_PROBE).unwrap();
        let info = MediaInfo::from_probe(&probe, MediaKind::Audio).unwrap();
        assert_eq!(info.codec_name, "aac");
        assert_eq!(
            info.details,
            StreamDetails::Audio { sample_rate: 48000, channels: 2, channel_layout: "stereo".to_string() }
        );
    }

    #[test]
    fn test_missing_stream_is_hard_error() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}], "format": {"duration": "3.5"}}"#,
        )
        .unwrap();
        assert!(matches!(
            MediaInfo::from_probe(&probe, MediaKind::Video),
            Err(MediaflowError::NoStreamFound(kind)) if kind == "video"
        ));
    }

    #[test]
    fn test_sparse_probe_defaults_to_zero() {
        let probe: ProbeOutput = serde_json::from_str(r#"{"streams": [{"codec_type": "video"}]}"#).unwrap();
        let info = MediaInfo::from_probe(&probe, MediaKind::Video).unwrap();
        assert_eq!(info.duration, 0.0);
        assert_eq!(info.size, 0);
        assert_eq!(info.details, StreamDetails::Video { width: 0, height: 0, frame_rate: 0.0 });
    }
}
