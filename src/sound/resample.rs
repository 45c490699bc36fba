//! Sample-rate conversion on top of rubato's windowed-sinc resampler.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::warn;

use crate::error::{Error, Result};
use crate::sound::Sound;

const CHUNK_FRAMES: usize = 1024;

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Resample `sound` to `target_rate`, preserving channel count and
/// envelope. Downsampling discards the band above the new Nyquist and says
/// so.
pub fn resample(sound: &Sound, target_rate: u32) -> Result<Sound> {
    if target_rate == 0 {
        return Err(Error::OutOfRange("target rate must be positive".into()));
    }
    if target_rate == sound.rate() {
        return Ok(sound.clone());
    }
    if target_rate < sound.rate() {
        warn!(
            "resampling {} Hz -> {} Hz discards content above {} Hz",
            sound.rate(),
            target_rate,
            target_rate / 2
        );
    }

    let channels = sound.channels() as usize;
    let in_frames = sound.frames();
    let ratio = target_rate as f64 / sound.rate() as f64;
    let out_frames = (in_frames as f64 * ratio).round() as usize;
    if in_frames == 0 {
        return Sound::from_frames(Vec::new(), sound.channels(), target_rate);
    }

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, sinc_params(), CHUNK_FRAMES, channels)
        .map_err(|e| Error::OutOfRange(format!("cannot resample by ratio {ratio}: {e}")))?;
    let delay = resampler.output_delay();

    // Planar input, padded to whole chunks; extra zero chunks flush the
    // sinc tail.
    let mut planar: Vec<Vec<f32>> = vec![Vec::with_capacity(in_frames); channels];
    for frame in 0..in_frames {
        for (ch, lane) in planar.iter_mut().enumerate() {
            lane.push(sound.sample(frame, ch as u16));
        }
    }

    let mut out_planar: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let zero_chunk: Vec<Vec<f32>> = vec![vec![0.0f32; CHUNK_FRAMES]; channels];
    let mut fed = 0usize;
    while out_planar[0].len() < delay + out_frames {
        let chunk: Vec<Vec<f32>> = if fed < in_frames {
            let end = (fed + CHUNK_FRAMES).min(in_frames);
            (0..channels)
                .map(|ch| {
                    let mut c = planar[ch][fed..end].to_vec();
                    c.resize(CHUNK_FRAMES, 0.0);
                    c
                })
                .collect()
        } else {
            zero_chunk.clone()
        };
        fed += CHUNK_FRAMES;
        let produced = resampler
            .process(&chunk, None)
            .map_err(|e| Error::OutOfRange(format!("resampler failed: {e}")))?;
        for (ch, lane) in produced.into_iter().enumerate() {
            out_planar[ch].extend(lane);
        }
    }

    let mut samples = Vec::with_capacity(out_frames * channels);
    for frame in delay..delay + out_frames {
        for lane in &out_planar {
            samples.push(lane[frame]);
        }
    }
    Sound::from_frames(samples, sound.channels(), target_rate)
}
