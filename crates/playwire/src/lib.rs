//! Media playback engine driving a streaming pipeline backend.
//!
//! [`Player`] opens a resource, pre-rolls it, and exposes transport, seeking, rate
//! and volume control. Decoded video frames reach the caller through a single-slot
//! mailbox drained by [`Player::update`].

pub mod backend;
pub mod config;
pub mod description;
pub mod env;
pub mod error;
pub mod frame;
#[cfg(feature = "gstreamer")]
pub mod gstreamer_backend;
pub mod player;
pub mod probe;
pub mod state;
pub mod symphonia_probe;
pub mod uri;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, BusMessage, Discover, Pipeline, RateSeek};
pub use config::EngineConfig;
pub use error::{PlayerError, Result};
pub use player::{OpenOptions, Player};
pub use probe::{MediaProbe, probe_with};
pub use state::PlayerState;

/// Crate version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
