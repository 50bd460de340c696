use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Pixel format requested from the frame sink when the caller does not pick one.
pub const DEFAULT_PIXEL_FORMAT: &str = "BGRA";

/// Engine tuning parameters shared by the prober, adapter and player.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for each synchronous state change during `open`.
    pub state_timeout_ms: u64,
    /// Upper bound for one discovery call.
    pub discover_timeout_ms: u64,
    /// Frames later than this are dropped by the sink.
    pub max_lateness_ms: u64,
    /// Raw video format requested from the sink (GStreamer format name).
    pub pixel_format: String,
}

impl Default for EngineConfig {
    /// Defaults matching the bounded waits the engine promises.
    fn default() -> Self {
        Self {
            state_timeout_ms: 10_000,
            discover_timeout_ms: 10_000,
            max_lateness_ms: 1_000,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load overrides from a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::from_toml(&raw).with_context(|| format!("parse config {:?}", path))
    }

    /// Parse overrides from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let cfg = toml::from_str::<EngineConfig>(raw)?;
        Ok(cfg)
    }

    pub fn state_timeout(&self) -> Duration {
        Duration::from_millis(self.state_timeout_ms)
    }

    pub fn discover_timeout(&self) -> Duration {
        Duration::from_millis(self.discover_timeout_ms)
    }

    pub fn max_lateness(&self) -> Duration {
        Duration::from_millis(self.max_lateness_ms)
    }
}
