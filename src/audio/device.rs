//! Audio playback to the default output device

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::AudioSink;
use crate::{Error, Result};

/// Decoded audio ready for the output stream
#[derive(Debug, Default)]
struct Pcm {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Plays MP3 audio through the default `cpal` output device
///
/// The device is opened per call and the stream is dropped before returning.
#[derive(Debug, Default)]
pub struct DevicePlayback;

impl DevicePlayback {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AudioSink for DevicePlayback {
    fn play_mp3(&self, data: &[u8]) -> Result<()> {
        let pcm = decode_mp3(data)?;
        play_pcm(pcm)
    }
}

/// Find an output config at `rate`, preferring mono
fn output_config(device: &cpal::Device, rate: u32) -> Result<StreamConfig> {
    let fits = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels
            && c.min_sample_rate() <= SampleRate(rate)
            && c.max_sample_rate() >= SampleRate(rate)
    };

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| fits(c, 1))
        .or_else(|| {
            device
                .supported_output_configs()
                .ok()?
                .find(|c| fits(c, 2))
        })
        .ok_or_else(|| Error::Audio(format!("no output config for {rate} Hz")))?;

    Ok(supported.with_sample_rate(SampleRate(rate)).config())
}

fn play_pcm(pcm: Pcm) -> Result<()> {
    if pcm.samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let config = output_config(&device, pcm.sample_rate)?;
    let channels = usize::from(config.channels);

    let sample_count = pcm.samples.len();
    let samples = Arc::new(pcm.samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let pos = position.load(Ordering::Relaxed);
                        let sample = if let Some(s) = samples.get(pos) {
                            position.store(pos + 1, Ordering::Relaxed);
                            *s
                        } else {
                            finished.store(true, Ordering::Relaxed);
                            0.0
                        };
                        frame.fill(sample);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(pcm.sample_rate);
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = Instant::now();

    while !finished.load(Ordering::Relaxed) && start.elapsed() <= timeout {
        std::thread::sleep(Duration::from_millis(50));
    }

    // Let the device drain its last buffer
    std::thread::sleep(Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = sample_count, "playback complete");

    Ok(())
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Pcm> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut pcm = Pcm::default();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if pcm.sample_rate == 0 {
                    pcm.sample_rate = u32::try_from(frame.sample_rate)
                        .map_err(|_| Error::Audio("invalid MP3 sample rate".to_string()))?;
                }

                if frame.channels == 2 {
                    pcm.samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    pcm.samples
                        .extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if pcm.samples.is_empty() {
        return Err(Error::Audio("no audio frames in MP3 data".to_string()));
    }

    Ok(pcm)
}
