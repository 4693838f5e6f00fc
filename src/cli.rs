use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline document ({"inputs": [...], "operations": [...]})
    Run {
        /// Pipeline JSON file
        #[arg(short, long)]
        pipeline: PathBuf,
    },

    /// Probe a media file or URL and print its metadata
    Info {
        /// Input file path or URL
        #[arg(short, long)]
        input: String,
    },

    /// Convert a media file to another format
    Convert {
        /// Input file path or URL
        #[arg(short, long)]
        input: String,

        /// Output format (mp4 for video, mp3 for audio when omitted)
        #[arg(short, long)]
        format: Option<String>,

        /// Quality tier: low, medium, high
        #[arg(short, long, default_value = "medium")]
        quality: String,

        /// Target resolution (720p, 1920x1080, 1280:720, 1080, ...)
        #[arg(short, long)]
        resolution: Option<String>,
    },

    /// Capture frames from a video
    Screenshot {
        /// Input file path or URL
        #[arg(short, long)]
        input: String,

        /// Capture positions in seconds (comma-separated)
        #[arg(short, long)]
        timestamps: Option<String>,

        /// Number of evenly spaced captures
        #[arg(short = 'n', long)]
        count: Option<i64>,
    },

    /// Concatenate 2-10 videos
    Concat {
        /// Input file paths or URLs, in order (repeat the flag)
        #[arg(short, long = "input", required = true)]
        inputs: Vec<String>,

        /// Resolution applied to every clip
        #[arg(short, long)]
        resolution: Option<String>,

        /// Frame rate applied to every clip
        #[arg(long)]
        fps: Option<u32>,

        /// x264 CRF (0-51)
        #[arg(long)]
        crf: Option<u8>,

        /// x264 speed preset
        #[arg(long)]
        preset: Option<String>,

        /// Drop audio and join video only
        #[arg(long)]
        mute: bool,
    },

    /// Burn in or mux a subtitle track
    Subtitle {
        /// Input video path or URL
        #[arg(short, long)]
        input: String,

        /// Subtitle file path or URL
        #[arg(short, long)]
        subtitle: String,

        /// hard (burn in) or soft (separate stream)
        #[arg(short, long, default_value = "hard")]
        mode: String,

        /// Font directory for hard subtitles
        #[arg(long)]
        fonts_dir: Option<PathBuf>,

        /// x264 CRF for hard subtitles (0-51)
        #[arg(long)]
        crf: Option<u8>,

        /// x264 speed preset for hard subtitles
        #[arg(long)]
        preset: Option<String>,
    },

    /// Add background audio to a video
    Bgm {
        /// Input video path or URL
        #[arg(short, long)]
        input: String,

        /// Background audio path or URL
        #[arg(short, long)]
        bgm: String,

        /// mix or ducking
        #[arg(short, long, default_value = "mix")]
        mode: String,

        /// Background gain
        #[arg(short, long, default_value = "0.25")]
        gain: f64,
    },

    /// Copy an output out of the scratch directory
    Download {
        /// File name in the scratch directory
        name: String,

        /// Destination path
        #[arg(short, long)]
        dest: PathBuf,

        /// Delete the scratch file after copying
        #[arg(long)]
        delete: bool,
    },

    /// Remove expired outputs from the scratch directory
    Sweep {
        /// Keep sweeping every cleanup interval until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Check that ffmpeg is available and show the effective settings
    Doctor,

    /// Write a configuration file with default settings
    InitConfig {
        /// Output path
        #[arg(short, long, default_value = "mediaflow.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
