//! The hardware output stream.
//!
//! Opens the default stereo output in signed 16-bit at the requested rate
//! and hands each callback buffer to the [`MixerCore`]. The buffer DAC
//! time is derived from cpal's callback timestamps and the engine's own
//! stream clock.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

use super::mixer::{EngineShared, MixerCore};
use crate::error::{Error, Result};
use std::sync::Arc;

pub fn open_stream(
    rate: u32,
    stream_unit: usize,
    mut mixer: MixerCore,
    shared: Arc<EngineShared>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Device("no default output device".into()))?;
    let name = device.name().unwrap_or_else(|_| "unknown".into());

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate: cpal::SampleRate(rate),
        buffer_size: cpal::BufferSize::Fixed(stream_unit as cpal::FrameCount),
    };

    let data_fn = {
        let shared = shared.clone();
        move |out: &mut [i16], info: &cpal::OutputCallbackInfo| {
            let ts = info.timestamp();
            let latency = ts
                .playback
                .duration_since(&ts.callback)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            let now = shared.now();
            mixer.process(out, now + latency, now);
        }
    };
    let err_fn = |err| warn!("audio stream error: {err}");

    let stream = device
        .build_output_stream(&config, data_fn, err_fn, None)
        .map_err(|e| Error::Device(format!("cannot open {name} at {rate} Hz: {e}")))?;
    stream
        .play()
        .map_err(|e| Error::Device(format!("cannot start stream on {name}: {e}")))?;
    info!("audio output open: {name} at {rate} Hz, {stream_unit}-frame buffers");
    Ok(stream)
}
