//! In-process backend used by the engine tests.
//!
//! The fake pipeline mirrors the parts of a real one the engine depends on:
//! state requests post state-changed messages, the first transition into Paused
//! delivers a pre-roll frame, seeks are recorded, and the bus is a channel the
//! test can post into.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender};

use crate::backend::{Backend, BusMessage, Discover, Pipeline, RateSeek};
use crate::description::PipelineDescription;
use crate::frame::{FrameSink, VideoFrame};
use crate::probe::MediaProbe;
use crate::state::PlayerState;

pub(crate) struct FakeFrame {
    pub bytes: Vec<u8>,
    pub size: Option<(u32, u32)>,
}

impl FakeFrame {
    pub fn filled(len: usize, size: Option<(u32, u32)>) -> Self {
        Self {
            bytes: vec![0xAB; len],
            size,
        }
    }
}

impl VideoFrame for FakeFrame {
    fn data(&self) -> &[u8] {
        &self.bytes
    }

    fn negotiated_size(&self) -> Option<(u32, u32)> {
        self.size
    }
}

#[derive(Default)]
pub(crate) struct FakeState {
    pub probes: HashMap<String, MediaProbe>,
    pub init_error: Option<String>,
    pub launch_error: Option<String>,
    pub stall_at: Option<PlayerState>,
    pub reject_seeks: bool,
    pub reject_rate: bool,
    pub preroll_size: Option<(u32, u32)>,
    pub launched: Vec<String>,
    pub requested_states: Vec<PlayerState>,
    pub seeks: Vec<f64>,
    pub seek_rates: Vec<f64>,
    pub rate_seeks: Vec<RateSeek>,
    pub current: PlayerState,
    pub last_requested: Option<PlayerState>,
    pub position: f64,
    pub duration: Option<f64>,
    pub volume: f64,
    pub sink: Option<FrameSink<FakeFrame>>,
    pub bus: Option<Sender<BusMessage>>,
    pub live_pipelines: usize,
    pub plugin_paths: Vec<String>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    shared: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register discovery metadata for `uri`.
    pub fn with_probe(self, uri: &str, probe: MediaProbe) -> Self {
        self.state().probes.insert(uri.to_string(), probe);
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.shared.lock().unwrap()
    }

    /// Post a message on the live pipeline's bus.
    pub fn post(&self, message: BusMessage) {
        let bus = self.state().bus.clone();
        bus.expect("no pipeline launched").send(message).unwrap();
    }

    /// Producer handle of the live pipeline.
    pub fn sink(&self) -> FrameSink<FakeFrame> {
        self.state().sink.clone().expect("no video sink installed")
    }
}

/// Probe for a seekable video resource with audio.
pub(crate) fn video_probe(duration: f64, width: u32, height: u32) -> MediaProbe {
    MediaProbe {
        success: true,
        has_video: true,
        has_audio: true,
        seekable: true,
        duration,
        width,
        height,
        frame_rate: 25.0,
        sample_rate: 48_000,
        bit_rate: 128_000,
        ..MediaProbe::default()
    }
}

/// Probe for an audio-only resource.
pub(crate) fn audio_probe(duration: f64) -> MediaProbe {
    MediaProbe {
        success: true,
        has_audio: true,
        seekable: true,
        duration,
        sample_rate: 44_100,
        ..MediaProbe::default()
    }
}

impl Discover for FakeBackend {
    fn discover(&self, uri: &str, _timeout: Duration) -> Result<MediaProbe> {
        self.state()
            .probes
            .get(uri)
            .cloned()
            .ok_or_else(|| anyhow!("resource not found: {uri}"))
    }
}

impl Backend for FakeBackend {
    type Frame = FakeFrame;
    type Pipeline = FakePipeline;

    fn init(&self) -> Result<()> {
        match &self.state().init_error {
            Some(e) => Err(anyhow!("{e}")),
            None => Ok(()),
        }
    }

    fn launch(
        &self,
        description: &PipelineDescription,
        sink: Option<FrameSink<FakeFrame>>,
    ) -> Result<FakePipeline> {
        let mut st = self.state();
        if let Some(e) = &st.launch_error {
            return Err(anyhow!("{e}"));
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        st.launched.push(description.to_string());
        st.sink = sink;
        st.bus = Some(tx);
        st.current = PlayerState::Null;
        st.last_requested = None;
        st.position = 0.0;
        st.volume = 1.0;
        st.live_pipelines += 1;
        Ok(FakePipeline {
            shared: self.shared.clone(),
            bus: rx,
        })
    }

    fn add_plugin_path(&self, path: &Path) -> bool {
        self.state().plugin_paths.push(path.display().to_string());
        true
    }
}

pub(crate) struct FakePipeline {
    shared: Arc<Mutex<FakeState>>,
    bus: Receiver<BusMessage>,
}

impl FakePipeline {
    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.shared.lock().unwrap()
    }
}

impl Pipeline for FakePipeline {
    fn set_state(&self, target: PlayerState) -> Result<()> {
        let mut st = self.state();
        st.requested_states.push(target);
        st.last_requested = Some(target);
        if st.stall_at == Some(target) {
            return Ok(());
        }

        let old = st.current;
        st.current = target;
        if target <= PlayerState::Ready {
            st.position = 0.0;
        }
        if let Some(bus) = &st.bus {
            let _ = bus.send(BusMessage::StateChanged {
                old,
                current: target,
                from_pipeline: true,
            });
        }
        if target == PlayerState::Paused && old < PlayerState::Paused {
            let preroll = st.sink.clone().map(|sink| (sink, st.preroll_size));
            drop(st);
            if let Some((sink, size)) = preroll {
                sink.deliver_preroll(FakeFrame::filled(64, size));
            }
        }
        Ok(())
    }

    fn wait_state(&self, _timeout: Duration) -> Result<PlayerState> {
        let st = self.state();
        if st.stall_at.is_some() && st.stall_at == st.last_requested {
            return Err(anyhow!("state change did not complete"));
        }
        Ok(st.current)
    }

    fn current_state(&self) -> PlayerState {
        self.state().current
    }

    fn query_position(&self) -> Option<f64> {
        Some(self.state().position)
    }

    fn query_duration(&self) -> Option<f64> {
        self.state().duration
    }

    fn seek(&self, seconds: f64, rate: f64) -> bool {
        let mut st = self.state();
        st.seeks.push(seconds);
        st.seek_rates.push(rate);
        if st.reject_seeks {
            return false;
        }
        st.position = seconds;
        true
    }

    fn send_seek(&self, seek: &RateSeek) -> bool {
        let mut st = self.state();
        st.rate_seeks.push(*seek);
        !st.reject_rate
    }

    fn set_volume(&self, volume: f64) {
        self.state().volume = volume;
    }

    fn volume(&self) -> f64 {
        self.state().volume
    }

    fn pop_message(&self) -> Option<BusMessage> {
        self.bus.try_recv().ok()
    }
}

impl Drop for FakePipeline {
    fn drop(&mut self) {
        let mut st = self.state();
        st.live_pipelines -= 1;
        st.sink = None;
        st.bus = None;
    }
}
