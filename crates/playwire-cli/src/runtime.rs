//! Command runners for the `playwire` binary.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Result, anyhow, bail};
use playwire::{Backend, EngineConfig, MediaProbe, Player, env};

use crate::cli::{Args, Command};
use crate::config::{PlayConfig, load_engine_config};

/// Run the parsed command line.
pub fn run(args: Args) -> Result<()> {
    for dir in &args.binary_path {
        env::add_binary_path(dir)?;
    }
    let engine = load_engine_config(args.config.as_deref())?;

    match &args.cmd {
        Command::Probe { path, json } => run_probe(path, *json, &engine, &args.plugin_path),
        Command::Play(play) => {
            let config = PlayConfig::from_args(play, engine);
            run_play(config, &args.plugin_path)
        }
    }
}

/// Probe `path` and print the result.
pub fn run_probe(path: &str, json: bool, engine: &EngineConfig, plugin_paths: &[PathBuf]) -> Result<()> {
    let probe = discover(path, engine, plugin_paths);
    if json {
        println!("{}", serde_json::to_string_pretty(&probe)?);
    } else {
        print_probe(&probe);
    }
    if !probe.success {
        bail!("unable to discover {path}");
    }
    Ok(())
}

#[cfg(feature = "gstreamer")]
fn discover(path: &str, engine: &EngineConfig, plugin_paths: &[PathBuf]) -> MediaProbe {
    use playwire::gstreamer_backend::GstBackend;

    for dir in plugin_paths {
        if !GstBackend.add_plugin_path(dir) {
            tracing::warn!(dir = %dir.display(), "plugin path not scanned");
        }
    }
    playwire::probe_with(&GstBackend, path, engine.discover_timeout())
}

#[cfg(not(feature = "gstreamer"))]
fn discover(path: &str, engine: &EngineConfig, plugin_paths: &[PathBuf]) -> MediaProbe {
    if !plugin_paths.is_empty() {
        tracing::warn!("plugin paths are ignored without the gstreamer feature");
    }
    playwire::probe_with(
        &playwire::symphonia_probe::SymphoniaDiscoverer,
        path,
        engine.discover_timeout(),
    )
}

fn print_probe(probe: &MediaProbe) {
    println!("uri:         {}", probe.uri);
    println!("success:     {}", probe.success);
    println!("seekable:    {}", probe.seekable);
    println!("duration:    {:.3}s", probe.duration);
    if probe.has_video {
        println!(
            "video:       {}x{} @ {:.2} fps",
            probe.width, probe.height, probe.frame_rate
        );
    }
    if probe.has_audio {
        println!(
            "audio:       {} Hz, {} bit/s",
            probe.sample_rate, probe.bit_rate
        );
    }
}

/// Play `config.path` with the GStreamer backend until it ends or Ctrl-C.
#[cfg(feature = "gstreamer")]
pub fn run_play(config: PlayConfig, plugin_paths: &[PathBuf]) -> Result<()> {
    use playwire::gstreamer_backend::GstBackend;

    let mut player = Player::with_config(GstBackend, config.engine.clone());
    for dir in plugin_paths {
        player.add_plugin_path(dir);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_signal = stop.clone();
    let _ = ctrlc::set_handler(move || {
        stop_for_signal.store(true, Ordering::SeqCst);
    });

    let summary = drive(&mut player, &config, &stop)?;
    tracing::info!(
        frames = summary.frames,
        dropped = summary.dropped,
        position = summary.position,
        "playback finished"
    );
    Ok(())
}

#[cfg(not(feature = "gstreamer"))]
pub fn run_play(_config: PlayConfig, _plugin_paths: &[PathBuf]) -> Result<()> {
    bail!("playback requires building with the `gstreamer` feature")
}

/// Counters reported when the tick loop exits.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaySummary {
    pub frames: u64,
    pub dropped: u64,
    pub position: f64,
}

/// Open, configure and pump `player` until end of stream, a fatal error or `stop`.
pub fn drive<B: Backend>(player: &mut Player<B>, config: &PlayConfig, stop: &AtomicBool) -> Result<PlaySummary> {
    let frames = Arc::new(AtomicU64::new(0));
    let ended = Arc::new(AtomicBool::new(false));
    let last_error = Arc::new(Mutex::new(None::<String>));

    let frame_count = frames.clone();
    player.on_frame(move |_| {
        frame_count.fetch_add(1, Ordering::Relaxed);
    });
    let end_flag = ended.clone();
    player.on_stream_end(move || end_flag.store(true, Ordering::SeqCst));
    let error_slot = last_error.clone();
    player.on_error(move |msg| {
        if let Ok(mut slot) = error_slot.lock() {
            *slot = Some(msg.to_string());
        }
    });
    player.on_state(|old| tracing::debug!(%old, "left state"));

    player.open_with(&config.path, config.options.clone())?;
    tracing::info!(
        uri = player.uri().unwrap_or_default(),
        duration = player.duration(),
        width = player.width(),
        height = player.height(),
        "opened"
    );

    player.set_loop(config.looping);
    player.set_volume(config.volume);
    if config.mute {
        player.set_mute(true);
    }
    if config.rate != 1.0 {
        player.set_rate(config.rate)?;
    }
    if let Some(seconds) = config.seek {
        player.set_time(seconds)?;
    }
    player.play()?;

    loop {
        if stop.load(Ordering::SeqCst) {
            tracing::info!("interrupted");
            break;
        }
        player.update();
        if !player.is_open() {
            let message = last_error
                .lock()
                .ok()
                .and_then(|slot| slot.clone())
                .unwrap_or_else(|| "session closed".to_string());
            return Err(anyhow!(message));
        }
        if !config.looping && ended.load(Ordering::SeqCst) {
            break;
        }
        thread::sleep(config.tick);
    }

    let summary = PlaySummary {
        frames: frames.load(Ordering::Relaxed),
        dropped: player.dropped_frames(),
        position: player.time(),
    };
    player.close();
    player.clear_callbacks();
    Ok(summary)
}
