//! Textual pipeline descriptions.
//!
//! Video resources get a `playbin` whose video sink is an `appsink` tuned for a
//! consumer that may fall behind:
//! - `drop=true`: discard rather than queue under backpressure
//! - `async=false`: state changes do not wait on the sink
//! - `qos=true` / `sync=true`: shed late frames and follow the play rate
//! - `max-lateness`: cap on how late a frame may be rendered
//!
//! Audio-only resources get a bare `playbin` with no frame sink at all.

use std::fmt;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::PlayerError;
use crate::probe::MediaProbe;

/// Frame sink parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoSinkSpec {
    /// Requested width; 0 leaves it to negotiation.
    pub width: u32,
    /// Requested height; 0 leaves it to negotiation.
    pub height: u32,
    pub pixel_format: String,
    pub max_lateness: Duration,
}

/// A launchable pipeline description.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineDescription {
    pub uri: String,
    /// Present when the resource has video and frames must be delivered.
    pub video: Option<VideoSinkSpec>,
}

impl PipelineDescription {
    pub fn audio_only(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            video: None,
        }
    }

    pub fn with_video(uri: impl Into<String>, spec: VideoSinkSpec) -> Self {
        Self {
            uri: uri.into(),
            video: Some(spec),
        }
    }

    /// Pick the description that fits what discovery found.
    ///
    /// `width`/`height`/`pixel_format` override the probe and config defaults.
    pub fn for_probe(
        probe: &MediaProbe,
        width: Option<u32>,
        height: Option<u32>,
        pixel_format: Option<&str>,
        config: &EngineConfig,
    ) -> Result<Self, PlayerError> {
        if !probe.has_video && !probe.has_audio {
            return Err(PlayerError::NoPlayableStream(probe.uri.clone()));
        }
        if !probe.has_video {
            return Ok(Self::audio_only(probe.uri.clone()));
        }

        Ok(Self::with_video(
            probe.uri.clone(),
            VideoSinkSpec {
                width: width.unwrap_or(probe.width),
                height: height.unwrap_or(probe.height),
                pixel_format: pixel_format
                    .filter(|f| !f.is_empty())
                    .unwrap_or(config.pixel_format.as_str())
                    .to_string(),
                max_lateness: config.max_lateness(),
            },
        ))
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }
}

impl fmt::Display for VideoSinkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "appsink drop=true async=false qos=true sync=true max-lateness={} caps=video/x-raw",
            self.max_lateness.as_nanos()
        )?;
        if self.width > 0 && self.height > 0 {
            write!(f, ",width={},height={}", self.width, self.height)?;
        }
        write!(f, ",format={}", self.pixel_format)
    }
}

impl fmt::Display for PipelineDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "playbin uri=\"{}\"", escape_quoted(&self.uri))?;
        if let Some(video) = &self.video {
            write!(f, " video-sink=\"{video}\"")?;
        }
        Ok(())
    }
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
