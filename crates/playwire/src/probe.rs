//! Best-effort, bounded metadata discovery.
//!
//! Probing never fails loudly: empty input, missing backends, timeouts, backend
//! errors and even panics inside the backend all collapse into a [`MediaProbe`]
//! with `success == false` and zeroed fields.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use serde::Serialize;

use crate::backend::Discover;
use crate::uri;

/// Result of one discovery call. Never mutated after construction.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MediaProbe {
    /// Resolved URI that was probed (empty when resolution failed).
    pub uri: String,
    /// Whether discovery reported usable metadata.
    pub success: bool,
    pub has_video: bool,
    pub has_audio: bool,
    pub seekable: bool,
    /// Duration in seconds.
    pub duration: f64,
    /// Width of the first video stream.
    pub width: u32,
    /// Height of the first video stream.
    pub height: u32,
    /// Frames per second of the first video stream.
    pub frame_rate: f32,
    /// Sample rate of the first audio stream in Hz.
    pub sample_rate: u32,
    /// Bit rate of the first audio stream in bits per second.
    pub bit_rate: u32,
}

impl MediaProbe {
    /// Failed probe carrying only the URI.
    pub fn failed(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Whether the resource has anything the engine can play.
    pub fn is_playable(&self) -> bool {
        self.success && (self.has_video || self.has_audio)
    }
}

/// Frame rate as a float from a numerator/denominator pair (0 when undefined).
pub fn frame_rate_from_ratio(numer: i32, denom: i32) -> f32 {
    if denom == 0 {
        return 0.0;
    }
    numer as f32 / denom as f32
}

/// Resolve `path` and discover it through `discoverer`.
pub fn probe_with<D: Discover + ?Sized>(discoverer: &D, path: &str, timeout: Duration) -> MediaProbe {
    let Some(uri) = uri::resolve(path) else {
        tracing::debug!("probe skipped: empty path");
        return MediaProbe::default();
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| discoverer.discover(&uri, timeout)));
    match outcome {
        Ok(Ok(mut probe)) if probe.success => {
            probe.uri = uri;
            tracing::debug!(
                uri = %probe.uri,
                has_video = probe.has_video,
                has_audio = probe.has_audio,
                duration = probe.duration,
                "probe succeeded"
            );
            probe
        }
        Ok(Ok(_)) => {
            tracing::debug!(uri = %uri, "probe reported no usable metadata");
            MediaProbe::failed(uri)
        }
        Ok(Err(e)) => {
            tracing::debug!(uri = %uri, "probe failed: {e:#}");
            MediaProbe::failed(uri)
        }
        Err(_) => {
            tracing::warn!(uri = %uri, "discovery backend panicked; treating as failed probe");
            MediaProbe::failed(uri)
        }
    }
}
