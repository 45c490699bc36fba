//! Synthesis primitives.
//!
//! Pure functions from parameters to [`Sound`] values, all taking the
//! target sample rate explicitly. Durations resolve to `⌊len·R⌋` frames.

mod filter;

pub use filter::{bandpass, bandstop, highpass, lowpass};

use std::f64::consts::TAU;

use rand::Rng;

use crate::error::{Error, Result};
use crate::sound::Sound;
use crate::units::{IntoFreq, IntoTime};

/// Convert dB of attenuation to an amplitude ratio (20*log10 semantics).
fn db_to_amp_ratio(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// A mono buffer of zeros.
pub fn silence(len: impl IntoTime, rate: u32) -> Sound {
    let frames = len.into_time().to_frames(rate);
    Sound::from_frames(vec![0.0; frames], 1, rate).expect("silence is well formed")
}

/// A stereo buffer of zeros.
pub fn silence_stereo(len: impl IntoTime, rate: u32) -> Sound {
    let frames = len.into_time().to_frames(rate);
    Sound::from_frames(vec![0.0; frames * 2], 2, rate).expect("silence is well formed")
}

/// Uniform white noise in (-1, +1).
pub fn noise(len: impl IntoTime, rate: u32, rng: &mut impl Rng) -> Sound {
    let frames = len.into_time().to_frames(rate);
    let samples = (0..frames).map(|_| rng.random_range(-1.0..1.0)).collect();
    Sound::from_frames(samples, 1, rate).expect("noise is well formed")
}

/// Stereo white noise; each channel is an independent draw from `rng`.
pub fn noise_stereo(len: impl IntoTime, rate: u32, rng: &mut impl Rng) -> Sound {
    let frames = len.into_time().to_frames(rate);
    let samples = (0..frames * 2)
        .map(|_| rng.random_range(-1.0..1.0))
        .collect();
    Sound::from_frames(samples, 2, rate).expect("noise is well formed")
}

/// Pure tone `sin(2π·f·t + phase)`.
pub fn tone_phase(f: impl IntoFreq, len: impl IntoTime, rate: u32, phase: f64) -> Sound {
    let hz = f.into_freq().as_hz();
    let frames = len.into_time().to_frames(rate);
    let samples = (0..frames)
        .map(|k| (TAU * hz * k as f64 / rate as f64 + phase).sin() as f32)
        .collect();
    Sound::from_frames(samples, 1, rate).expect("tone is well formed")
}

/// Pure tone with zero phase.
pub fn tone(f: impl IntoFreq, len: impl IntoTime, rate: u32) -> Sound {
    tone_phase(f, len, rate, 0.0)
}

/// Sum of harmonics of `f0`, built from a single computed cycle and tiled
/// with cycle-aligned wrap. Summing long per-sample sinusoids instead would
/// accumulate floating-point beating between the partials.
pub fn harmonic_complex(
    f0: impl IntoFreq,
    harmonics: &[u32],
    amps: &[f32],
    phases: &[f64],
    len: impl IntoTime,
    rate: u32,
) -> Result<Sound> {
    let f0 = f0.into_freq().as_hz();
    if harmonics.len() != amps.len() || harmonics.len() != phases.len() {
        return Err(Error::Shape(format!(
            "harmonics/amps/phases lengths differ: {}/{}/{}",
            harmonics.len(),
            amps.len(),
            phases.len()
        )));
    }
    if harmonics.iter().any(|&h| h == 0) {
        return Err(Error::OutOfRange(
            "harmonic numbers start at 1 (the fundamental)".into(),
        ));
    }
    if f0 <= 0.0 || f0 >= rate as f64 / 2.0 {
        return Err(Error::OutOfRange(format!(
            "fundamental {f0} Hz must lie in (0, {}) Hz",
            rate as f64 / 2.0
        )));
    }

    let cycle_frames = ((rate as f64 / f0).round() as usize).max(1);
    let mut cycle = vec![0.0f32; cycle_frames];
    for ((&h, &amp), &phase) in harmonics.iter().zip(amps).zip(phases) {
        for (k, value) in cycle.iter_mut().enumerate() {
            *value +=
                amp * (TAU * f0 * h as f64 * k as f64 / rate as f64 + phase).sin() as f32;
        }
    }

    let frames = len.into_time().to_frames(rate);
    let samples = (0..frames).map(|k| cycle[k % cycle_frames]).collect();
    Sound::from_frames(samples, 1, rate)
}

fn ramp_window(k: usize, ramp_frames: usize) -> f32 {
    (0.5 - 0.5 * (std::f64::consts::PI * k as f64 / ramp_frames as f64).cos()) as f32
}

fn apply_envelope(s: &Sound, envelope: impl Fn(usize) -> f32) -> Sound {
    let channels = s.channels() as usize;
    let samples = s
        .samples()
        .iter()
        .enumerate()
        .map(|(i, &x)| x * envelope(i / channels))
        .collect();
    Sound::from_frames(samples, s.channels(), s.rate()).expect("envelope preserves shape")
}

/// Raised-cosine onset and offset of `len` each; the sustain region is
/// untouched. Fails when the sound cannot hold both ramps.
pub fn ramp(s: &Sound, len: impl IntoTime) -> Result<Sound> {
    let ramp_frames = len.into_time().to_frames(s.rate());
    let frames = s.frames();
    if frames <= 2 * ramp_frames {
        return Err(Error::DurationTooShort {
            frames,
            ramp_frames,
        });
    }
    Ok(apply_envelope(s, |k| {
        if k < ramp_frames {
            ramp_window(k, ramp_frames)
        } else if k >= frames - ramp_frames {
            ramp_window(frames - 1 - k, ramp_frames)
        } else {
            1.0
        }
    }))
}

/// Raised-cosine onset only.
pub fn rampon(s: &Sound, len: impl IntoTime) -> Result<Sound> {
    let ramp_frames = len.into_time().to_frames(s.rate());
    let frames = s.frames();
    if frames <= ramp_frames {
        return Err(Error::DurationTooShort {
            frames,
            ramp_frames,
        });
    }
    Ok(apply_envelope(s, |k| {
        if k < ramp_frames {
            ramp_window(k, ramp_frames)
        } else {
            1.0
        }
    }))
}

/// Raised-cosine offset only.
pub fn rampoff(s: &Sound, len: impl IntoTime) -> Result<Sound> {
    let ramp_frames = len.into_time().to_frames(s.rate());
    let frames = s.frames();
    if frames <= ramp_frames {
        return Err(Error::DurationTooShort {
            frames,
            ramp_frames,
        });
    }
    Ok(apply_envelope(s, |k| {
        if k >= frames - ramp_frames {
            ramp_window(frames - 1 - k, ramp_frames)
        } else {
            1.0
        }
    }))
}

/// Normalize to unit RMS, then attenuate by `db`.
pub fn attenuate(s: &Sound, db: f64) -> Sound {
    let n = s.samples().len();
    if n == 0 {
        return s.clone();
    }
    let mean_sq =
        s.samples().iter().map(|&x| x as f64 * x as f64).sum::<f64>() / n as f64;
    let rms = mean_sq.sqrt();
    if rms <= f64::EPSILON {
        return s.clone();
    }
    let scale = (db_to_amp_ratio(-db) / rms) as f32;
    let samples = s.samples().iter().map(|&x| x * scale).collect();
    Sound::from_frames(samples, s.channels(), s.rate()).expect("scaling preserves shape")
}

fn check_likeness(inputs: &[&Sound]) -> Result<(u16, u32)> {
    let first = inputs
        .first()
        .ok_or_else(|| Error::Shape("expected at least one sound".into()))?;
    for s in &inputs[1..] {
        if s.rate() != first.rate() {
            return Err(Error::RateMismatch {
                sound: s.rate(),
                engine: first.rate(),
            });
        }
        if s.channels() != first.channels() {
            return Err(Error::Shape(format!(
                "cannot combine {}-channel and {}-channel sounds",
                first.channels(),
                s.channels()
            )));
        }
    }
    Ok((first.channels(), first.rate()))
}

fn reduce(inputs: &[&Sound], pad: f32, op: impl Fn(f32, f32) -> f32) -> Result<Sound> {
    let (channels, rate) = check_likeness(inputs)?;
    let len = inputs.iter().map(|s| s.samples().len()).max().unwrap_or(0);
    // pad is the identity of op, so starting every slot there is exact
    let mut out = vec![pad; len];
    for s in inputs {
        for (i, slot) in out.iter_mut().enumerate() {
            let x = s.samples().get(i).copied().unwrap_or(pad);
            *slot = op(*slot, x);
        }
    }
    Sound::from_frames(out, channels, rate)
}

/// Element-wise sum; shorter inputs are zero-padded to the longest.
pub fn mix(inputs: &[&Sound]) -> Result<Sound> {
    reduce(inputs, 0.0, |a, b| a + b)
}

/// Element-wise product; shorter inputs are one-padded to the longest.
pub fn mult(inputs: &[&Sound]) -> Result<Sound> {
    reduce(inputs, 1.0, |a, b| a * b)
}

/// Stereo sound from two mono sounds of equal rate and length.
pub fn leftright(left: &Sound, right: &Sound) -> Result<Sound> {
    if left.channels() != 1 || right.channels() != 1 {
        return Err(Error::Shape(
            "leftright expects two mono sounds".into(),
        ));
    }
    if left.rate() != right.rate() {
        return Err(Error::RateMismatch {
            sound: right.rate(),
            engine: left.rate(),
        });
    }
    if left.frames() != right.frames() {
        return Err(Error::Shape(format!(
            "leftright expects equal lengths, got {} and {} frames",
            left.frames(),
            right.frames()
        )));
    }
    let mut samples = Vec::with_capacity(left.frames() * 2);
    for (l, r) in left.samples().iter().zip(right.samples()) {
        samples.push(*l);
        samples.push(*r);
    }
    Sound::from_frames(samples, 2, left.rate())
}

/// Crossfade from `a` into `b` over `overlap`: `a` ramps off while `b`,
/// delayed to start `overlap` before `a` ends, ramps on. Total duration is
/// `dur(a) + dur(b) − overlap`.
pub fn fadeto(a: &Sound, b: &Sound, overlap: impl IntoTime) -> Result<Sound> {
    let overlap = overlap.into_time();
    let overlap_frames = overlap.to_frames(a.rate());
    if a.frames() < overlap_frames || b.frames() < overlap_frames {
        return Err(Error::DurationTooShort {
            frames: a.frames().min(b.frames()),
            ramp_frames: overlap_frames,
        });
    }
    let a_out = rampoff(a, overlap)?;
    let b_in = rampon(b, overlap)?;
    let delay_frames = a.frames() - overlap_frames;
    let channels = a.channels() as usize;
    let mut delayed = vec![0.0f32; delay_frames * channels];
    delayed.extend_from_slice(b_in.samples());
    let delayed = Sound::from_frames(delayed, a.channels(), a.rate())?;
    mix(&[&a_out, &delayed])
}

/// Concatenate `b` after `a`.
pub fn concat(a: &Sound, b: &Sound) -> Result<Sound> {
    let (channels, rate) = check_likeness(&[a, b])?;
    let mut samples = a.samples().to_vec();
    samples.extend_from_slice(b.samples());
    Sound::from_frames(samples, channels, rate)
}
