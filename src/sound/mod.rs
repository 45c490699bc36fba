//! The sound value model.
//!
//! A [`Sound`] is an immutable buffer of interleaved float frames tagged
//! with its sample rate and channel count. Everything the synthesis layer
//! produces is a `Sound`; the engine consumes only [`CanonicalSound`]s,
//! the clipped, stereo, 16-bit form produced by [`Sound::canonicalize`].

mod cache;
mod resample;

pub use cache::{CacheKey, SoundCache, DEFAULT_CACHE_CAPACITY};
pub use resample::resample;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::units::{Span, Time};

/// Side of a stereo pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// An immutable PCM buffer: interleaved f32 frames, a fixed sample rate,
/// one or two channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Sound {
    samples: Vec<f32>,
    rate: u32,
    channels: u16,
}

impl Sound {
    /// Build a sound from interleaved frames.
    ///
    /// Fails with `Shape` when the channel count is not 1 or 2, when the
    /// buffer is not a whole number of frames, or when the rate is zero.
    pub fn from_frames(samples: Vec<f32>, channels: u16, rate: u32) -> Result<Self> {
        if !(1..=2).contains(&channels) {
            return Err(Error::Shape(format!(
                "channel count must be 1 or 2, got {channels}"
            )));
        }
        if samples.len() % channels as usize != 0 {
            return Err(Error::Shape(format!(
                "{} samples is not a whole number of {channels}-channel frames",
                samples.len()
            )));
        }
        if rate == 0 {
            return Err(Error::Shape("sample rate must be positive".into()));
        }
        Ok(Sound {
            samples,
            rate,
            channels,
        })
    }

    pub fn from_f64(samples: &[f64], channels: u16, rate: u32) -> Result<Self> {
        Self::from_frames(samples.iter().map(|&x| x as f32).collect(), channels, rate)
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Time {
        Time::secs(self.frames() as f64 / self.rate as f64)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample of `frame` on `channel` (a mono sound answers for both).
    pub fn sample(&self, frame: usize, channel: u16) -> f32 {
        let ch = channel.min(self.channels - 1) as usize;
        self.samples[frame * self.channels as usize + ch]
    }

    /// Extract the half-open time interval `span` as a new sound.
    pub fn slice(&self, span: Span) -> Result<Sound> {
        let range = span.resolve(self.rate, self.frames())?;
        let ch = self.channels as usize;
        let samples = self.samples[range.start * ch..range.end * ch].to_vec();
        Ok(Sound {
            samples,
            rate: self.rate,
            channels: self.channels,
        })
    }

    /// Select one side of the sound. The result is always stereo: a mono
    /// input is broadcast into the requested side, and the opposite side is
    /// silenced either way.
    pub fn side(&self, side: Side) -> Sound {
        let frames = self.frames();
        let mut samples = vec![0.0f32; frames * 2];
        let keep = match side {
            Side::Left => 0,
            Side::Right => 1,
        };
        for frame in 0..frames {
            samples[frame * 2 + keep] = self.sample(frame, keep as u16);
        }
        Sound {
            samples,
            rate: self.rate,
            channels: 2,
        }
    }

    /// Extract one channel as a mono sound (a mono input is returned
    /// as-is for either side).
    pub fn channel(&self, side: Side) -> Sound {
        let ch = match side {
            Side::Left => 0,
            Side::Right => 1,
        };
        let samples = (0..self.frames()).map(|f| self.sample(f, ch)).collect();
        Sound {
            samples,
            rate: self.rate,
            channels: 1,
        }
    }

    pub fn left(&self) -> Sound {
        self.side(Side::Left)
    }

    pub fn right(&self) -> Sound {
        self.side(Side::Right)
    }

    /// Resample to `rate`. Downsampling logs a warning naming the lost band.
    pub fn resample(&self, rate: u32) -> Result<Sound> {
        resample(self, rate)
    }

    /// Convert to the engine's native format: clip to [-1, +1), broadcast
    /// mono to stereo, resample to `rate_out` if needed, quantize to i16.
    pub fn canonicalize(&self, rate_out: u32) -> Result<CanonicalSound> {
        let resampled;
        let source = if self.rate != rate_out {
            resampled = self.resample(rate_out)?;
            &resampled
        } else {
            self
        };
        let frames = source.frames();
        let mut data = Vec::with_capacity(frames * 2);
        for frame in 0..frames {
            data.push(quantize(source.sample(frame, 0)));
            data.push(quantize(source.sample(frame, 1)));
        }
        Ok(CanonicalSound {
            data: data.into(),
            rate: rate_out,
        })
    }
}

fn quantize(x: f32) -> i16 {
    (x.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Engine-native PCM: interleaved stereo i16 behind an `Arc`.
///
/// The `Arc` is what lets a sound cross the realtime boundary: the caller
/// (and the cache) keep clones, the callback holds its own, and whichever
/// side drops last frees the buffer. By construction that is never mid-mix.
#[derive(Clone, Debug)]
pub struct CanonicalSound {
    data: Arc<[i16]>,
    rate: u32,
}

impl CanonicalSound {
    /// Wrap an already-interleaved stereo buffer.
    pub fn from_interleaved(data: Vec<i16>, rate: u32) -> Result<Self> {
        if data.len() % 2 != 0 {
            return Err(Error::Shape(format!(
                "{} samples is not a whole number of stereo frames",
                data.len()
            )));
        }
        if rate == 0 {
            return Err(Error::Shape("sample rate must be positive".into()));
        }
        Ok(CanonicalSound {
            data: data.into(),
            rate,
        })
    }

    pub fn data(&self) -> &[i16] {
        &self.data
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn frames(&self) -> usize {
        self.data.len() / 2
    }

    pub fn duration(&self) -> Time {
        Time::secs(self.frames() as f64 / self.rate as f64)
    }
}
