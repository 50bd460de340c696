//! The seam between the engine and the streaming pipeline it drives.
//!
//! The engine never constructs codecs or elements itself; it hands a
//! [`PipelineDescription`] to a [`Backend`], then talks to the resulting
//! [`Pipeline`] through state requests, queries, seeks and a polled message bus.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::description::PipelineDescription;
use crate::frame::{FrameSink, VideoFrame};
use crate::probe::MediaProbe;
use crate::state::PlayerState;

/// One message popped from the pipeline bus.
#[derive(Clone, Debug, PartialEq)]
pub enum BusMessage {
    /// Stream error reported by any element; fatal for the session.
    Error {
        message: String,
        debug: Option<String>,
    },
    /// A state transition. Only transitions of the pipeline itself are mirrored.
    StateChanged {
        old: PlayerState,
        current: PlayerState,
        from_pipeline: bool,
    },
    /// An asynchronous operation (state change, seek) completed.
    AsyncDone,
    /// The stream duration should be queried again.
    DurationChanged,
    /// The stream ended.
    EndOfStream,
    /// Anything else; kept only for logging.
    Other(String),
}

/// Segment bounds for a rate-changing seek.
///
/// Negative rates play backwards, so the segment must end at the current
/// position instead of starting there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateSeek {
    pub rate: f64,
    /// Segment start in seconds.
    pub start: f64,
    /// Segment stop in seconds; `None` means end of stream.
    pub stop: Option<f64>,
}

impl RateSeek {
    /// Build the segment for playing at `rate` from `position` seconds.
    pub fn from_position(rate: f64, position: f64) -> Self {
        if rate >= 0.0 {
            Self {
                rate,
                start: position,
                stop: None,
            }
        } else {
            Self {
                rate,
                start: 0.0,
                stop: Some(position),
            }
        }
    }
}

/// Metadata discovery, bounded by a timeout.
pub trait Discover {
    /// Inspect `uri` without entering playback.
    ///
    /// Returning `Err` (or a probe with `success == false`) marks the resource unusable.
    fn discover(&self, uri: &str, timeout: Duration) -> Result<MediaProbe>;
}

/// A launched pipeline. Dropping it releases the pipeline and its bus.
pub trait Pipeline {
    /// Request a state; completion may be asynchronous.
    fn set_state(&self, state: PlayerState) -> Result<()>;

    /// Block until the last requested state change settles or `timeout` elapses.
    ///
    /// Returns the state reached; errors on failure or timeout.
    fn wait_state(&self, timeout: Duration) -> Result<PlayerState>;

    /// State as currently reported by the pipeline.
    fn current_state(&self) -> PlayerState;

    /// Playback position in seconds, when available.
    fn query_position(&self) -> Option<f64>;

    /// Stream duration in seconds, when available.
    fn query_duration(&self) -> Option<f64>;

    /// Flushing, accurate seek to `seconds` that keeps playing at `rate`.
    ///
    /// Returns whether the backend accepted it.
    fn seek(&self, seconds: f64, rate: f64) -> bool;

    /// Send a rate-changing seek event. Returns whether the backend accepted it.
    fn send_seek(&self, seek: &RateSeek) -> bool;

    fn set_volume(&self, volume: f64);

    fn volume(&self) -> f64;

    /// Pop the next pending bus message without blocking.
    fn pop_message(&self) -> Option<BusMessage>;
}

/// Factory for pipelines plus the discovery used to size them.
pub trait Backend: Discover {
    type Frame: VideoFrame;
    type Pipeline: Pipeline;

    /// Initialize the backend; safe to call repeatedly.
    fn init(&self) -> Result<()>;

    /// Build and launch `description`.
    ///
    /// `sink` is present exactly when the description carries a video sink; the
    /// backend must route pre-roll and sample deliveries into it. On failure nothing
    /// built so far may stay alive.
    fn launch(
        &self,
        description: &PipelineDescription,
        sink: Option<FrameSink<Self::Frame>>,
    ) -> Result<Self::Pipeline>;

    /// Register an extra plugin directory with the backend registry.
    fn add_plugin_path(&self, path: &Path) -> bool;
}
