use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use playwire::{EngineConfig, OpenOptions};

use crate::cli::PlayArgs;

/// Engine config from `path`, or defaults when none is given.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = EngineConfig::load(path)?;
            tracing::info!(path = %path.display(), "loaded engine config");
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub path: String,
    pub options: OpenOptions,
    pub looping: bool,
    pub rate: f64,
    pub volume: f64,
    pub mute: bool,
    pub seek: Option<f64>,
    pub tick: Duration,
    pub engine: EngineConfig,
}

impl PlayConfig {
    pub fn from_args(args: &PlayArgs, engine: EngineConfig) -> Self {
        Self {
            path: args.path.clone(),
            options: OpenOptions {
                width: args.width,
                height: args.height,
                pixel_format: args.format.clone(),
            },
            looping: args.looping,
            rate: args.rate,
            volume: args.volume,
            mute: args.mute,
            seek: args.seek,
            tick: Duration::from_millis(args.tick_ms.max(1)),
            engine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, Command};
    use clap::Parser;

    fn play_args(argv: &[&str]) -> PlayArgs {
        match Args::try_parse_from(argv).unwrap().cmd {
            Command::Play(play) => play,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn play_args_map_to_open_options() {
        let args = play_args(&[
            "playwire", "play", "clip.mp4", "--width", "640", "--format", "RGBA", "--tick-ms", "0",
        ]);
        let config = PlayConfig::from_args(&args, EngineConfig::default());
        assert_eq!(config.options.width, Some(640));
        assert_eq!(config.options.height, None);
        assert_eq!(config.options.pixel_format.as_deref(), Some("RGBA"));
        assert_eq!(config.tick, Duration::from_millis(1));
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        assert_eq!(load_engine_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn unreadable_config_is_an_error() {
        assert!(load_engine_config(Some(Path::new("/no/such/engine.toml"))).is_err());
    }
}
