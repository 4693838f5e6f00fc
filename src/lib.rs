//! Mediaflow - Media Transformation Pipelines
//!
//! Chains concatenation, subtitles, background audio, conversion, frame
//! capture and probing over uploaded or downloaded media, delegating every
//! encode to ffmpeg and every probe to ffprobe.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod media;
pub mod ops;
pub mod pipeline;
pub mod resolution;
pub mod retention;
pub mod scratch;
