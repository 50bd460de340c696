//! Pure-Rust discovery for local audio files.
//!
//! Uses Symphonia to probe the container and read the default track's codec
//! parameters. The probe runs on a worker thread so the caller can bound the wait;
//! a worker that outlives the timeout simply finishes into a dropped channel.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::RecvTimeoutError;
use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecParameters};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::backend::Discover;
use crate::probe::MediaProbe;
use crate::uri;

/// Discoverer backed by Symphonia. Handles local audio files only.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaDiscoverer;

impl Discover for SymphoniaDiscoverer {
    fn discover(&self, uri: &str, timeout: Duration) -> Result<MediaProbe> {
        let path = uri::to_local_path(uri).ok_or_else(|| anyhow!("not a local file: {uri}"))?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name("playwire-probe".to_string())
            .spawn(move || {
                let _ = tx.send(probe_file(&path));
            })
            .context("spawn probe worker")?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(anyhow!("discovery timed out after {timeout:?}")),
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("probe worker exited without a result"))
            }
        }
    }
}

fn probe_file(path: &Path) -> Result<MediaProbe> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe {:?}", path))?;

    let format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no decodable track in {:?}", display_name(path)))?;
    let params = &track.codec_params;

    Ok(MediaProbe {
        success: true,
        has_audio: true,
        seekable: true,
        duration: duration_secs_from_codec_params(params).unwrap_or(0.0),
        sample_rate: params.sample_rate.unwrap_or(0),
        bit_rate: pcm_bit_rate_from_codec_params(params).unwrap_or(0),
        ..MediaProbe::default()
    })
}

/// Best-effort duration from frame count and sample rate.
fn duration_secs_from_codec_params(params: &CodecParameters) -> Option<f64> {
    let frames = params.n_frames?;
    let rate = params.sample_rate?;
    if rate == 0 {
        return None;
    }
    Some(frames as f64 / rate as f64)
}

/// Bit rate derivable from the codec parameters alone (uncompressed streams).
fn pcm_bit_rate_from_codec_params(params: &CodecParameters) -> Option<u32> {
    let bits = params.bits_per_coded_sample.or(params.bits_per_sample)?;
    let channels = params.channels?.count() as u32;
    let rate = params.sample_rate?;
    rate.checked_mul(channels)?.checked_mul(bits)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia::core::audio::Channels;

    fn write_wav(name: &str, rate: u32, seconds: u32) -> PathBuf {
        let channels: u16 = 1;
        let bits: u16 = 16;
        let data_len = rate * seconds * (bits as u32 / 8) * channels as u32;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * channels as u32 * bits as u32 / 8).to_le_bytes());
        bytes.extend_from_slice(&(channels * bits / 8).to_le_bytes());
        bytes.extend_from_slice(&bits.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + data_len as usize, 0);

        let path = std::env::temp_dir().join(format!("playwire-{}-{name}", std::process::id()));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn probes_generated_wav() {
        let path = write_wav("tone.wav", 8_000, 2);
        let uri = uri::resolve(path.to_str().unwrap()).unwrap();
        let probe = SymphoniaDiscoverer
            .discover(&uri, Duration::from_secs(10))
            .unwrap();
        assert!(probe.success);
        assert!(probe.has_audio);
        assert!(!probe.has_video);
        assert!(probe.seekable);
        assert_eq!(probe.sample_rate, 8_000);
        assert_eq!(probe.bit_rate, 128_000);
        assert!((probe.duration - 2.0).abs() < 1e-6);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn garbage_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("playwire-{}-junk.bin", std::process::id()));
        std::fs::write(&path, b"definitely not media").unwrap();
        let uri = uri::resolve(path.to_str().unwrap()).unwrap();
        assert!(SymphoniaDiscoverer.discover(&uri, Duration::from_secs(10)).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn remote_uri_is_rejected() {
        let err = SymphoniaDiscoverer
            .discover("http://example.com/a.flac", Duration::from_secs(1))
            .unwrap_err();
        assert!(err.to_string().contains("not a local file"));
    }

    #[test]
    fn duration_secs_handles_zero_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(0);
        params.n_frames = Some(100);
        assert!(duration_secs_from_codec_params(&params).is_none());
    }

    #[test]
    fn pcm_bit_rate_needs_bits_and_channels() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(44_100);
        assert!(pcm_bit_rate_from_codec_params(&params).is_none());
        params.bits_per_sample = Some(16);
        params.channels = Some(Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        assert_eq!(pcm_bit_rate_from_codec_params(&params), Some(1_411_200));
    }
}
