use serde::Serialize;
use tracing::info;

use crate::artifact::MediaArtifact;
use crate::error::Result;
use crate::media::{MediaInfo, MediaKind};
use super::OpContext;

/// Metadata record of one artifact, tagged with its classified kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaReport {
    pub media_type: MediaKind,
    #[serde(flatten)]
    pub info: MediaInfo,
}

/// Probe `artifact` and extract the fields of its kind's first stream.
pub async fn execute(ctx: &OpContext<'_>, artifact: &MediaArtifact) -> Result<MediaReport> {
    let kind = match artifact.kind {
        MediaKind::Unknown => ctx.classifier.classify_known(&artifact.path)?,
        kind => kind,
    };

    info!("Getting {} info for: {}", kind, artifact.path.display());
    let probe = ctx.toolkit.probe(&artifact.path).await?;
    let info = MediaInfo::from_probe(&probe, kind)?;
    info!("{} info extracted: duration={:.2}s, format={}", kind, info.duration, info.format_name);

    Ok(MediaReport { media_type: kind, info })
}
