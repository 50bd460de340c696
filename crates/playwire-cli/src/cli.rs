use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "playwire", version = playwire::version())]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Engine config overrides (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Extra backend plugin directory (repeatable)
    #[arg(long, global = true)]
    pub plugin_path: Vec<PathBuf>,

    /// Directory appended to PATH before the backend starts (repeatable)
    #[arg(long, global = true)]
    pub binary_path: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print stream metadata for a file or URI
    Probe {
        /// Local path or URI
        path: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Play a file or URI, counting decoded frames
    Play(PlayArgs),
}

#[derive(clap::Args, Debug)]
pub struct PlayArgs {
    /// Local path or URI
    pub path: String,

    /// Output frame width (defaults to the native width)
    #[arg(long)]
    pub width: Option<u32>,

    /// Output frame height (defaults to the native height)
    #[arg(long)]
    pub height: Option<u32>,

    /// Raw video format for delivered frames, e.g. BGRA or RGBA
    #[arg(long)]
    pub format: Option<String>,

    /// Restart from the beginning at end of stream
    #[arg(long = "loop")]
    pub looping: bool,

    /// Playback rate; negative plays backwards
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub rate: f64,

    /// Volume in [0, 1]
    #[arg(long, default_value_t = 1.0)]
    pub volume: f64,

    /// Start muted
    #[arg(long)]
    pub mute: bool,

    /// Start position in seconds
    #[arg(long)]
    pub seek: Option<f64>,

    /// Interval between engine updates in milliseconds
    #[arg(long, default_value_t = 16)]
    pub tick_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_parses_json_flag() {
        let args = Args::try_parse_from(["playwire", "probe", "clip.mp4", "--json"]).unwrap();
        match args.cmd {
            Command::Probe { path, json } => {
                assert_eq!(path, "clip.mp4");
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn play_defaults() {
        let args = Args::try_parse_from(["playwire", "play", "clip.mp4"]).unwrap();
        let Command::Play(play) = args.cmd else {
            panic!("expected play");
        };
        assert_eq!(play.rate, 1.0);
        assert_eq!(play.volume, 1.0);
        assert_eq!(play.tick_ms, 16);
        assert!(!play.looping && !play.mute);
        assert!(play.width.is_none() && play.seek.is_none());
    }

    #[test]
    fn play_accepts_negative_rate_and_globals_after_subcommand() {
        let args = Args::try_parse_from([
            "playwire",
            "play",
            "clip.mp4",
            "--rate",
            "-2",
            "--loop",
            "--width",
            "320",
            "--height",
            "240",
            "--config",
            "engine.toml",
            "--plugin-path",
            "/opt/a",
            "--plugin-path",
            "/opt/b",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("engine.toml")));
        assert_eq!(args.plugin_path.len(), 2);
        let Command::Play(play) = args.cmd else {
            panic!("expected play");
        };
        assert_eq!(play.rate, -2.0);
        assert!(play.looping);
        assert_eq!((play.width, play.height), (Some(320), Some(240)));
    }

    #[test]
    fn missing_path_is_an_error() {
        assert!(Args::try_parse_from(["playwire", "play"]).is_err());
    }
}
