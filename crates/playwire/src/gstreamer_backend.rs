//! GStreamer-backed pipelines.
//!
//! Descriptions are handed to `gst::parse::launch`, which yields a `playbin`. When a
//! frame sink is requested, the appsink behind playbin's `video-sink` gets pre-roll
//! and sample callbacks that map each buffer and publish it into the engine's
//! mailbox. Discovery goes through `gst_pbutils::Discoverer`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_pbutils as gst_pbutils;

use crate::backend::{Backend, BusMessage, Discover, Pipeline, RateSeek};
use crate::config::EngineConfig;
use crate::description::PipelineDescription;
use crate::frame::{FrameSink, VideoFrame};
use crate::probe::{MediaProbe, frame_rate_from_ratio, probe_with};
use crate::state::PlayerState;

/// Probe `path` with GStreamer and the default discovery timeout.
pub fn probe(path: &str) -> MediaProbe {
    probe_with(&GstBackend, path, EngineConfig::default().discover_timeout())
}

fn clock_time(seconds: f64) -> gst::ClockTime {
    gst::ClockTime::from_nseconds((seconds.max(0.0) * 1e9) as u64)
}

fn seconds(time: gst::ClockTime) -> f64 {
    time.nseconds() as f64 / 1e9
}

impl From<gst::State> for PlayerState {
    fn from(state: gst::State) -> Self {
        match state {
            gst::State::Ready => PlayerState::Ready,
            gst::State::Paused => PlayerState::Paused,
            gst::State::Playing => PlayerState::Playing,
            _ => PlayerState::Null,
        }
    }
}

impl From<PlayerState> for gst::State {
    fn from(state: PlayerState) -> Self {
        match state {
            PlayerState::Null => gst::State::Null,
            PlayerState::Ready => gst::State::Ready,
            PlayerState::Paused => gst::State::Paused,
            PlayerState::Playing => gst::State::Playing,
        }
    }
}

/// A mapped video buffer; unmapped when dropped.
pub struct GstFrame {
    buffer: gst::MappedBuffer<gst::buffer::Readable>,
    size: Option<(u32, u32)>,
}

impl GstFrame {
    fn from_sample(sample: &gst::Sample) -> Option<Self> {
        let size = sample
            .caps()
            .filter(|caps| caps.is_fixed())
            .and_then(|caps| {
                let s = caps.structure(0)?;
                let width = s.get::<i32>("width").ok()?;
                let height = s.get::<i32>("height").ok()?;
                Some((width.max(0) as u32, height.max(0) as u32))
            });
        let buffer = sample.buffer_owned()?;
        match buffer.into_mapped_buffer_readable() {
            Ok(buffer) => Some(Self { buffer, size }),
            Err(_) => {
                tracing::warn!("failed to map video buffer");
                None
            }
        }
    }
}

impl VideoFrame for GstFrame {
    fn data(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn negotiated_size(&self) -> Option<(u32, u32)> {
        self.size
    }
}

/// Factory for GStreamer pipelines.
#[derive(Clone, Copy, Debug, Default)]
pub struct GstBackend;

impl Discover for GstBackend {
    fn discover(&self, uri: &str, timeout: Duration) -> Result<MediaProbe> {
        self.init()?;
        let discoverer = gst_pbutils::Discoverer::new(gst::ClockTime::from_nseconds(
            timeout.as_nanos() as u64,
        ))
        .context("create discoverer")?;
        let info = discoverer
            .discover_uri(uri)
            .with_context(|| format!("discover {uri}"))?;
        probe_from_info(uri, &info)
    }
}

/// Reject anything but a complete discovery. Timeouts and missing plugins still
/// yield an `info`, just with a non-OK result.
fn ensure_discovered(uri: &str, result: gst_pbutils::DiscovererResult) -> Result<()> {
    if result != gst_pbutils::DiscovererResult::Ok {
        bail!("discovery of {uri} ended with {result:?}");
    }
    Ok(())
}

fn probe_from_info(uri: &str, info: &gst_pbutils::DiscovererInfo) -> Result<MediaProbe> {
    ensure_discovered(uri, info.result())?;

    let mut probe = MediaProbe {
        uri: uri.to_string(),
        success: true,
        seekable: info.is_seekable(),
        duration: info.duration().map(seconds).unwrap_or(0.0),
        ..MediaProbe::default()
    };
    if let Some(video) = info.video_streams().into_iter().next() {
        let fps = video.framerate();
        probe.has_video = true;
        probe.width = video.width();
        probe.height = video.height();
        probe.frame_rate = frame_rate_from_ratio(fps.numer(), fps.denom());
    }
    if let Some(audio) = info.audio_streams().into_iter().next() {
        probe.has_audio = true;
        probe.sample_rate = audio.sample_rate();
        probe.bit_rate = audio.bitrate();
    }
    Ok(probe)
}

impl Backend for GstBackend {
    type Frame = GstFrame;
    type Pipeline = GstPipeline;

    fn init(&self) -> Result<()> {
        gst::init().context("gst::init() failed")
    }

    fn launch(
        &self,
        description: &PipelineDescription,
        sink: Option<FrameSink<GstFrame>>,
    ) -> Result<GstPipeline> {
        let element = gst::parse::launch(&description.to_string())
            .with_context(|| format!("parse `{description}`"))?;
        let pipeline = element
            .downcast::<gst::Pipeline>()
            .map_err(|_| anyhow!("description did not produce a pipeline"))?;

        if let Some(sink) = sink {
            let video_sink = pipeline
                .property::<Option<gst::Element>>("video-sink")
                .ok_or_else(|| anyhow!("pipeline has no video sink"))?;
            install_frame_callbacks(&find_appsink(video_sink)?, sink);
        }

        let bus = pipeline.bus().ok_or_else(|| anyhow!("pipeline has no bus"))?;
        Ok(GstPipeline { pipeline, bus })
    }

    fn add_plugin_path(&self, path: &Path) -> bool {
        if let Err(e) = self.init() {
            tracing::warn!("{e:#}");
            return false;
        }
        gst::Registry::get().scan_path(path)
    }
}

fn find_appsink(element: gst::Element) -> Result<gst_app::AppSink> {
    match element.downcast::<gst_app::AppSink>() {
        Ok(appsink) => Ok(appsink),
        Err(element) => element
            .downcast_ref::<gst::Bin>()
            .and_then(|bin| {
                bin.iterate_sinks()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .find_map(|e| e.downcast::<gst_app::AppSink>().ok())
            })
            .ok_or_else(|| anyhow!("video sink is not an appsink")),
    }
}

fn install_frame_callbacks(appsink: &gst_app::AppSink, sink: FrameSink<GstFrame>) {
    let preroll_sink = sink.clone();
    appsink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_preroll(move |appsink| {
                let sample = appsink.pull_preroll().map_err(|_| gst::FlowError::Eos)?;
                if let Some(frame) = GstFrame::from_sample(&sample) {
                    preroll_sink.deliver_preroll(frame);
                }
                Ok(gst::FlowSuccess::Ok)
            })
            .new_sample(move |appsink| {
                let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                if !sink.wants_frame() {
                    return Ok(gst::FlowSuccess::Ok);
                }
                if let Some(frame) = GstFrame::from_sample(&sample) {
                    sink.deliver_sample(frame);
                }
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
}

/// A launched `playbin`. Dropping it forces the Null state.
pub struct GstPipeline {
    pipeline: gst::Pipeline,
    bus: gst::Bus,
}

impl GstPipeline {
    fn translate(&self, message: &gst::Message) -> BusMessage {
        use gst::MessageView;

        match message.view() {
            MessageView::Error(err) => BusMessage::Error {
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            },
            MessageView::StateChanged(change) => BusMessage::StateChanged {
                old: change.old().into(),
                current: change.current().into(),
                from_pipeline: message
                    .src()
                    .is_some_and(|src| src == self.pipeline.upcast_ref::<gst::Object>()),
            },
            MessageView::AsyncDone(_) => BusMessage::AsyncDone,
            MessageView::DurationChanged(_) => BusMessage::DurationChanged,
            MessageView::Eos(_) => BusMessage::EndOfStream,
            _ => BusMessage::Other(format!("{:?}", message.type_())),
        }
    }
}

impl Pipeline for GstPipeline {
    fn set_state(&self, state: PlayerState) -> Result<()> {
        self.pipeline
            .set_state(state.into())
            .map(|_| ())
            .map_err(|e| anyhow!("{e}"))
    }

    fn wait_state(&self, timeout: Duration) -> Result<PlayerState> {
        let (result, current, _pending) = self
            .pipeline
            .state(gst::ClockTime::from_nseconds(timeout.as_nanos() as u64));
        match result {
            Ok(gst::StateChangeSuccess::Async) => Err(anyhow!("timed out after {timeout:?}")),
            Ok(_) => Ok(current.into()),
            Err(e) => Err(anyhow!("{e}")),
        }
    }

    fn current_state(&self) -> PlayerState {
        self.pipeline.current_state().into()
    }

    fn query_position(&self) -> Option<f64> {
        self.pipeline.query_position::<gst::ClockTime>().map(seconds)
    }

    fn query_duration(&self) -> Option<f64> {
        self.pipeline.query_duration::<gst::ClockTime>().map(seconds)
    }

    fn seek(&self, seconds: f64, rate: f64) -> bool {
        self.send_seek(&RateSeek::from_position(rate, seconds))
    }

    fn send_seek(&self, seek: &RateSeek) -> bool {
        let (stop_type, stop) = match seek.stop {
            Some(stop) => (gst::SeekType::Set, Some(clock_time(stop))),
            None => (gst::SeekType::None, gst::ClockTime::NONE),
        };
        self.pipeline
            .seek(
                seek.rate,
                gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE,
                gst::SeekType::Set,
                Some(clock_time(seek.start)),
                stop_type,
                stop,
            )
            .is_ok()
    }

    fn set_volume(&self, volume: f64) {
        self.pipeline.set_property("volume", volume);
    }

    fn volume(&self) -> f64 {
        self.pipeline.property::<f64>("volume")
    }

    fn pop_message(&self) -> Option<BusMessage> {
        self.bus.pop().map(|message| self.translate(&message))
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_map_both_ways() {
        for state in [
            PlayerState::Null,
            PlayerState::Ready,
            PlayerState::Paused,
            PlayerState::Playing,
        ] {
            assert_eq!(PlayerState::from(gst::State::from(state)), state);
        }
        assert_eq!(PlayerState::from(gst::State::VoidPending), PlayerState::Null);
    }

    #[test]
    fn incomplete_discovery_is_an_error() {
        use gst_pbutils::DiscovererResult;

        assert!(ensure_discovered("file:///a.mp4", DiscovererResult::Ok).is_ok());
        for result in [
            DiscovererResult::Timeout,
            DiscovererResult::MissingPlugins,
            DiscovererResult::UriInvalid,
            DiscovererResult::Error,
        ] {
            let err = ensure_discovered("file:///a.mp4", result).unwrap_err();
            assert!(err.to_string().contains("file:///a.mp4"));
        }
    }

    #[test]
    fn clock_time_clamps_negative_seconds() {
        assert_eq!(clock_time(-1.0), gst::ClockTime::ZERO);
        assert_eq!(seconds(clock_time(2.5)), 2.5);
    }
}
