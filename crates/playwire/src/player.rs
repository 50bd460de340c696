//! The playback engine.
//!
//! A [`Player`] owns at most one open session: a launched pipeline plus the frame
//! sink feeding it, the cached geometry/duration and the seek bookkeeping. All
//! control happens on the caller's thread; the only cross-thread traffic is the
//! frame mailbox written by the backend's delivery thread.
//!
//! Seeks are serialized: while one is in flight (`seek_lock`), further requests only
//! overwrite `pending_seek`, and the latest one is issued when the pipeline reports
//! the in-flight operation finished.

use std::any::Any;
use std::cell::Cell;
use std::path::Path;

use crate::backend::{Backend, BusMessage, Pipeline, RateSeek};
use crate::config::EngineConfig;
use crate::description::PipelineDescription;
use crate::error::{PlayerError, Result};
use crate::frame::{FrameSink, VideoFrame};
use crate::probe::{MediaProbe, probe_with};
use crate::state::PlayerState;

type FrameCallback = Box<dyn FnMut(&[u8]) + Send>;
type ErrorCallback = Box<dyn FnMut(&str) + Send>;
type StateCallback = Box<dyn FnMut(PlayerState) + Send>;
type StreamEndCallback = Box<dyn FnMut() + Send>;

#[derive(Default)]
struct Callbacks {
    frame: Option<FrameCallback>,
    error: Option<ErrorCallback>,
    state: Option<StateCallback>,
    stream_end: Option<StreamEndCallback>,
}

/// Per-open overrides.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OpenOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub pixel_format: Option<String>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an output frame size instead of the native one.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn pixel_format(mut self, format: impl Into<String>) -> Self {
        self.pixel_format = Some(format.into());
        self
    }
}

struct Session<B: Backend> {
    pipeline: B::Pipeline,
    sink: Option<FrameSink<B::Frame>>,
    uri: String,
    state: PlayerState,
    width: u32,
    height: u32,
    duration: f64,
    position: Cell<f64>,
    rate: f64,
    seekable: bool,
    has_video: bool,
    has_audio: bool,
    seek_lock: bool,
    pending_seek: Option<f64>,
}

impl<B: Backend> Session<B> {
    fn refresh_position(&self) -> f64 {
        if let Some(position) = self.pipeline.query_position() {
            self.position.set(position);
        }
        self.position.get()
    }

    fn refresh_duration(&mut self) {
        if let Some(duration) = self.pipeline.query_duration() {
            self.duration = duration;
        }
    }
}

/// Media playback engine over a [`Backend`].
pub struct Player<B: Backend> {
    backend: B,
    config: EngineConfig,
    session: Option<Session<B>>,
    volume: f64,
    muted: bool,
    saved_volume: f64,
    looping: bool,
    callbacks: Callbacks,
    user_data: Option<Box<dyn Any + Send>>,
}

impl<B: Backend> Player<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: B, config: EngineConfig) -> Self {
        if let Err(e) = backend.init() {
            tracing::warn!("media backend failed to initialize: {e:#}");
        }
        Self {
            backend,
            config,
            session: None,
            volume: 1.0,
            muted: false,
            saved_volume: 1.0,
            looping: false,
            callbacks: Callbacks::default(),
            user_data: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Discover `path` with this player's backend and timeout.
    pub fn probe(&self, path: &str) -> MediaProbe {
        probe_with(&self.backend, path, self.config.discover_timeout())
    }

    pub fn add_plugin_path(&self, path: impl AsRef<Path>) -> bool {
        self.backend.add_plugin_path(path.as_ref())
    }

    // ---- open / close ----

    /// Open `path` at its native size. See [`Player::open_with`].
    pub fn open(&mut self, path: &str) -> Result<()> {
        self.open_with(path, OpenOptions::default())
    }

    /// Close any current session, then discover and launch `path`.
    ///
    /// On success the pipeline has pre-rolled into Paused. On failure the player is
    /// left closed and the error is also sent to the error callback.
    pub fn open_with(&mut self, path: &str, options: OpenOptions) -> Result<()> {
        self.close();
        let result = self.try_open(path, &options);
        if result.is_err() {
            self.close();
        }
        self.report(result)
    }

    fn try_open(&mut self, path: &str, options: &OpenOptions) -> Result<()> {
        self.backend
            .init()
            .map_err(|e| PlayerError::BackendUnavailable(format!("{e:#}")))?;
        if path.trim().is_empty() {
            return Err(PlayerError::EmptyPath);
        }

        let probe = self.probe(path);
        if !probe.success {
            let target = if probe.uri.is_empty() { path } else { &probe.uri };
            return Err(PlayerError::ProbeFailed(target.to_string()));
        }

        let description = PipelineDescription::for_probe(
            &probe,
            options.width,
            options.height,
            options.pixel_format.as_deref(),
            &self.config,
        )?;
        let sink = description.has_video().then(FrameSink::new);
        tracing::info!(
            uri = %probe.uri,
            video = probe.has_video,
            audio = probe.has_audio,
            duration = probe.duration,
            "opening media"
        );
        tracing::debug!(%description, "launching pipeline");

        let pipeline = self
            .backend
            .launch(&description, sink.clone())
            .map_err(|e| PlayerError::Build(format!("{e:#}")))?;
        let (width, height) = description
            .video
            .as_ref()
            .map(|v| (v.width, v.height))
            .unwrap_or((0, 0));

        self.session = Some(Session {
            pipeline,
            sink,
            uri: probe.uri.clone(),
            state: PlayerState::Null,
            width,
            height,
            duration: probe.duration,
            position: Cell::new(0.0),
            rate: 1.0,
            seekable: probe.seekable,
            has_video: probe.has_video,
            has_audio: probe.has_audio,
            seek_lock: false,
            pending_seek: None,
        });

        self.settle(PlayerState::Ready)?;
        self.settle(PlayerState::Paused)?;

        if let Some(session) = self.session.as_mut() {
            if let Some((w, h)) = session.sink.as_ref().and_then(|s| s.negotiated_size()) {
                session.width = w;
                session.height = h;
            }
            tracing::info!(
                uri = %session.uri,
                width = session.width,
                height = session.height,
                "media ready"
            );
        }
        Ok(())
    }

    /// Request `target` and block until the pipeline settles there.
    fn settle(&mut self, target: PlayerState) -> Result<()> {
        let timeout = self.config.state_timeout();
        let session = self.session.as_ref().ok_or(PlayerError::NotOpen)?;
        session
            .pipeline
            .set_state(target)
            .map_err(|e| PlayerError::StateChange {
                target,
                reason: format!("{e:#}"),
            })?;
        match session.pipeline.wait_state(timeout) {
            Ok(reached) if reached == target => Ok(()),
            Ok(reached) => Err(PlayerError::StateChange {
                target,
                reason: format!("pipeline settled in {reached}"),
            }),
            Err(e) => {
                tracing::warn!(%target, "state change did not settle: {e:#}");
                Err(PlayerError::StateTimeout { target, timeout })
            }
        }
    }

    /// Stop and release the current session. Safe to call when nothing is open.
    pub fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Err(e) = session.pipeline.set_state(PlayerState::Null) {
            tracing::warn!(uri = %session.uri, "failed to stop pipeline: {e:#}");
        }
        if let Some(sink) = &session.sink {
            sink.slot().clear();
        }
        tracing::info!(uri = %session.uri, "media closed");
        drop(session);
        self.volume = 1.0;
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    // ---- transport ----

    /// Request a pipeline state. The mirrored state follows bus messages.
    pub fn set_state(&mut self, state: PlayerState) -> Result<()> {
        let result = self.request_state(state);
        self.report(result)
    }

    fn request_state(&self, state: PlayerState) -> Result<()> {
        let session = self.session.as_ref().ok_or(PlayerError::NotOpen)?;
        tracing::debug!(%state, "requesting state");
        session
            .pipeline
            .set_state(state)
            .map_err(|e| PlayerError::StateChange {
                target: state,
                reason: format!("{e:#}"),
            })
    }

    /// Start playback; a muted player stays muted on the new pipeline.
    pub fn play(&mut self) -> Result<()> {
        self.set_state(PlayerState::Playing)?;
        if self.muted
            && let Some(session) = &self.session
            && session.pipeline.volume() != 0.0
        {
            session.pipeline.set_volume(0.0);
            self.volume = 0.0;
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.set_state(PlayerState::Paused)
    }

    /// Tear the pipeline down to Null and bring it back to Ready.
    pub fn stop(&mut self) -> Result<()> {
        self.set_state(PlayerState::Null)?;
        self.set_state(PlayerState::Ready)
    }

    /// Stop, then play from the start.
    pub fn replay(&mut self) -> Result<()> {
        self.stop()?;
        self.play()
    }

    /// Seek to `seconds`, clamped to `[0, duration]`.
    ///
    /// While a seek is in flight the request is parked and only the latest parked
    /// target is issued once the pipeline finishes.
    pub fn set_time(&mut self, seconds: f64) -> Result<()> {
        let result = self.seek_to(seconds);
        self.report(result)
    }

    fn seek_to(&mut self, seconds: f64) -> Result<()> {
        let session = self.session.as_mut().ok_or(PlayerError::NotOpen)?;
        let target = clamp_time(seconds, session.duration);
        if session.seek_lock {
            tracing::debug!(target, "seek in flight; parking request");
            session.pending_seek = Some(target);
            return Ok(());
        }
        if !session.pipeline.seek(target, session.rate) {
            return Err(PlayerError::SeekRejected(target));
        }
        tracing::debug!(target, rate = session.rate, "seek issued");
        session.seek_lock = true;
        session.pending_seek = None;
        session.position.set(target);
        Ok(())
    }

    /// Change the playback rate, keeping the current position.
    ///
    /// Negative rates play backwards. A zero or non-finite rate is rejected.
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        let result = self.change_rate(rate);
        self.report(result)
    }

    fn change_rate(&mut self, rate: f64) -> Result<()> {
        let session = self.session.as_mut().ok_or(PlayerError::NotOpen)?;
        if rate == 0.0 || !rate.is_finite() {
            return Err(PlayerError::RateRejected(rate));
        }
        let seek = RateSeek::from_position(rate, session.refresh_position());
        if !session.pipeline.send_seek(&seek) {
            return Err(PlayerError::RateRejected(rate));
        }
        tracing::debug!(rate, start = seek.start, stop = ?seek.stop, "rate changed");
        session.rate = rate;
        Ok(())
    }

    // ---- audio ----

    /// Set the volume, clamped to `[0, 1]`. Clears the mute flag.
    pub fn set_volume(&mut self, volume: f64) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.volume = volume;
        self.muted = false;
        if let Some(session) = &self.session {
            session.pipeline.set_volume(volume);
        }
    }

    pub fn volume(&self) -> f64 {
        match &self.session {
            Some(session) => session.pipeline.volume(),
            None => self.volume,
        }
    }

    /// Mute remembers the current volume; unmute restores it.
    pub fn set_mute(&mut self, mute: bool) {
        if mute == self.muted {
            return;
        }
        if mute {
            self.saved_volume = self.volume();
            self.set_volume(0.0);
            self.muted = true;
        } else {
            let restore = self.saved_volume;
            self.saved_volume = 1.0;
            self.set_volume(restore);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    // ---- queries ----

    /// Duration in seconds; 0 when closed or unknown.
    pub fn duration(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.duration)
    }

    /// Playback position in seconds. Falls back to the last known position.
    pub fn time(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.refresh_position())
    }

    pub fn width(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.width)
    }

    pub fn height(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.height)
    }

    pub fn rate(&self) -> f64 {
        self.session.as_ref().map_or(1.0, |s| s.rate)
    }

    /// Last pipeline state seen on the bus.
    pub fn state(&self) -> PlayerState {
        self.session.as_ref().map_or(PlayerState::Null, |s| s.state)
    }

    pub fn uri(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.uri.as_str())
    }

    pub fn is_seekable(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.seekable)
    }

    pub fn has_video(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.has_video)
    }

    pub fn has_audio(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.has_audio)
    }

    /// Frames discarded because `update` was not called often enough.
    pub fn dropped_frames(&self) -> u64 {
        self.session
            .as_ref()
            .and_then(|s| s.sink.as_ref())
            .map_or(0, |sink| sink.slot().dropped_frames())
    }

    // ---- callbacks ----

    /// Called from [`Player::update`] with the bytes of each delivered frame.
    pub fn on_frame<F>(&mut self, callback: F)
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.callbacks.frame = Some(Box::new(callback));
    }

    pub fn on_error<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.callbacks.error = Some(Box::new(callback));
    }

    /// Called with the previous state whenever the pipeline changes state.
    pub fn on_state<F>(&mut self, callback: F)
    where
        F: FnMut(PlayerState) + Send + 'static,
    {
        self.callbacks.state = Some(Box::new(callback));
    }

    pub fn on_stream_end<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.callbacks.stream_end = Some(Box::new(callback));
    }

    pub fn clear_callbacks(&mut self) {
        self.callbacks = Callbacks::default();
    }

    // ---- user data ----

    pub fn set_user_data<T: Any + Send>(&mut self, data: T) {
        self.user_data = Some(Box::new(data));
    }

    pub fn user_data<T: Any>(&self) -> Option<&T> {
        self.user_data.as_deref()?.downcast_ref()
    }

    pub fn user_data_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.user_data.as_deref_mut()?.downcast_mut()
    }

    pub fn take_user_data(&mut self) -> Option<Box<dyn Any + Send>> {
        self.user_data.take()
    }

    // ---- pump ----

    /// Drain the pipeline bus, then hand the pending frame (if any) to the frame callback.
    ///
    /// Call this regularly from the control thread; callbacks run inside it.
    pub fn update(&mut self) {
        while let Some(message) = self.session.as_ref().and_then(|s| s.pipeline.pop_message()) {
            self.dispatch(message);
        }
        self.deliver_frame();
    }

    fn dispatch(&mut self, message: BusMessage) {
        match message {
            BusMessage::Error { message, debug } => {
                let detail = debug.as_deref().unwrap_or_default();
                tracing::error!(detail, "pipeline error: {message}");
                self.notify_error(&PlayerError::Stream(message));
                self.close();
            }
            BusMessage::StateChanged {
                old,
                current,
                from_pipeline: true,
            } => {
                if let Some(session) = self.session.as_mut() {
                    session.state = current;
                }
                if old != current {
                    tracing::debug!(%old, %current, "state changed");
                    if let Some(callback) = self.callbacks.state.as_mut() {
                        callback(old);
                    }
                }
            }
            BusMessage::StateChanged { .. } => {}
            BusMessage::AsyncDone => {
                let pending = self.session.as_mut().and_then(|session| {
                    session.refresh_duration();
                    session.seek_lock = false;
                    session.pending_seek.take()
                });
                if let Some(target) = pending {
                    tracing::debug!(target, "issuing parked seek");
                    let _ = self.set_time(target);
                }
            }
            BusMessage::DurationChanged => {
                if let Some(session) = self.session.as_mut() {
                    session.refresh_duration();
                }
            }
            BusMessage::EndOfStream => {
                tracing::info!(looping = self.looping, "end of stream");
                if let Some(callback) = self.callbacks.stream_end.as_mut() {
                    callback();
                }
                let _ = if self.looping {
                    self.replay()
                } else {
                    self.pause()
                };
            }
            BusMessage::Other(kind) => tracing::trace!(kind = %kind, "unhandled bus message"),
        }
    }

    fn deliver_frame(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(sink) = session.sink.as_ref() else {
            return;
        };
        let negotiated = sink.negotiated_size();
        let frame = sink.slot().take();
        if let Some((width, height)) = negotiated {
            session.width = width;
            session.height = height;
        }
        let Some(frame) = frame else {
            return;
        };
        if let Some(callback) = self.callbacks.frame.as_mut() {
            callback(frame.data());
        }
    }

    // ---- errors ----

    fn report<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.notify_error(e);
        }
        result
    }

    fn notify_error(&mut self, err: &PlayerError) {
        if !err.is_reportable() {
            tracing::debug!("{err}");
            return;
        }
        tracing::warn!("{err}");
        if let Some(callback) = self.callbacks.error.as_mut() {
            callback(&err.to_string());
        }
    }
}

impl<B: Backend> Drop for Player<B> {
    fn drop(&mut self) {
        self.close();
    }
}

fn clamp_time(seconds: f64, duration: f64) -> f64 {
    if seconds.is_nan() {
        return 0.0;
    }
    seconds.clamp(0.0, duration.max(0.0))
}
