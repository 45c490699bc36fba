//! Butterworth filtering as cascaded biquad sections.
//!
//! Coefficients come from the RBJ cookbook, one section per Butterworth
//! pole pair (plus a first-order tail for odd orders). State is f64 in
//! Direct Form II Transposed for numerical stability; each channel gets its
//! own cascade.

use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::sound::Sound;
use crate::units::{Freq, IntoFreq};

const DENORM_THRESH: f64 = 1.0e-20;

fn flush_denorm(x: f64) -> f64 {
    if !x.is_finite() || x.abs() < DENORM_THRESH {
        0.0
    } else {
        x
    }
}

#[derive(Clone, Copy, Debug)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    fn from_unnormalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Biquad {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn lowpass(fs: f64, f0: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * f0 / fs;
        let (sin_w0, cos_w0) = (w0.sin(), w0.cos());
        let alpha = sin_w0 / (2.0 * q);
        Self::from_unnormalized(
            (1.0 - cos_w0) / 2.0,
            1.0 - cos_w0,
            (1.0 - cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    fn highpass(fs: f64, f0: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * f0 / fs;
        let (sin_w0, cos_w0) = (w0.sin(), w0.cos());
        let alpha = sin_w0 / (2.0 * q);
        Self::from_unnormalized(
            (1.0 + cos_w0) / 2.0,
            -(1.0 + cos_w0),
            (1.0 + cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    /// One-pole sections realized in the same structure (b2 = a2 = 0).
    fn first_order_lowpass(fs: f64, f0: f64) -> Self {
        let k = (PI * f0 / fs).tan();
        Self::from_unnormalized(k, k, 0.0, k + 1.0, k - 1.0, 0.0)
    }

    fn first_order_highpass(fs: f64, f0: f64) -> Self {
        let k = (PI * f0 / fs).tan();
        Self::from_unnormalized(1.0, -1.0, 0.0, k + 1.0, k - 1.0, 0.0)
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = flush_denorm(self.b1 * x - self.a1 * y + self.z2);
        self.z2 = flush_denorm(self.b2 * x - self.a2 * y);
        y
    }
}

/// Q of each pole-pair section for an order-`n` Butterworth, plus whether a
/// first-order section is needed (odd orders).
fn butterworth_qs(order: usize) -> (Vec<f64>, bool) {
    let odd = order % 2 == 1;
    let pairs = order / 2;
    let qs = (0..pairs)
        .map(|k| {
            let angle = if odd {
                (k + 1) as f64 * PI / order as f64
            } else {
                (2 * k + 1) as f64 * PI / (2.0 * order as f64)
            };
            1.0 / (2.0 * angle.cos())
        })
        .collect();
    (qs, odd)
}

#[derive(Clone, Copy)]
enum Kind {
    Low,
    High,
}

fn cascade(kind: Kind, fs: f64, f0: f64, order: usize) -> Vec<Biquad> {
    let (qs, odd) = butterworth_qs(order);
    let mut sections = Vec::with_capacity(qs.len() + odd as usize);
    if odd {
        sections.push(match kind {
            Kind::Low => Biquad::first_order_lowpass(fs, f0),
            Kind::High => Biquad::first_order_highpass(fs, f0),
        });
    }
    for q in qs {
        sections.push(match kind {
            Kind::Low => Biquad::lowpass(fs, f0, q),
            Kind::High => Biquad::highpass(fs, f0, q),
        });
    }
    sections
}

fn check_corner(f: Freq, rate: u32) -> Result<f64> {
    let hz = f.as_hz();
    if hz <= 0.0 || hz >= rate as f64 / 2.0 {
        return Err(Error::OutOfRange(format!(
            "corner frequency {hz} Hz must lie in (0, {}) Hz",
            rate as f64 / 2.0
        )));
    }
    Ok(hz)
}

fn check_order(order: usize) -> Result<()> {
    if order == 0 {
        return Err(Error::OutOfRange("filter order must be at least 1".into()));
    }
    Ok(())
}

/// Run a fresh cascade forward over each channel.
fn apply(s: &Sound, make_sections: impl Fn() -> Vec<Biquad>) -> Sound {
    let channels = s.channels() as usize;
    let frames = s.frames();
    let mut out = vec![0.0f32; frames * channels];
    for ch in 0..channels {
        let mut sections = make_sections();
        for frame in 0..frames {
            let mut x = s.samples()[frame * channels + ch] as f64;
            for section in sections.iter_mut() {
                x = section.process(x);
            }
            out[frame * channels + ch] = x as f32;
        }
    }
    Sound::from_frames(out, s.channels(), s.rate()).expect("filter preserves shape")
}

/// Order-`order` Butterworth lowpass at `cutoff`.
pub fn lowpass(s: &Sound, cutoff: impl IntoFreq, order: usize) -> Result<Sound> {
    check_order(order)?;
    let f0 = check_corner(cutoff.into_freq(), s.rate())?;
    let fs = s.rate() as f64;
    Ok(apply(s, || cascade(Kind::Low, fs, f0, order)))
}

/// Order-`order` Butterworth highpass at `cutoff`.
pub fn highpass(s: &Sound, cutoff: impl IntoFreq, order: usize) -> Result<Sound> {
    check_order(order)?;
    let f0 = check_corner(cutoff.into_freq(), s.rate())?;
    let fs = s.rate() as f64;
    Ok(apply(s, || cascade(Kind::High, fs, f0, order)))
}

/// Butterworth bandpass: highpass at `lo` cascaded with lowpass at `hi`.
pub fn bandpass(s: &Sound, lo: impl IntoFreq, hi: impl IntoFreq, order: usize) -> Result<Sound> {
    check_order(order)?;
    let lo = check_corner(lo.into_freq(), s.rate())?;
    let hi = check_corner(hi.into_freq(), s.rate())?;
    if lo >= hi {
        return Err(Error::OutOfRange(format!(
            "band edges are inverted: {lo} Hz >= {hi} Hz"
        )));
    }
    let fs = s.rate() as f64;
    Ok(apply(s, || {
        let mut sections = cascade(Kind::High, fs, lo, order);
        sections.extend(cascade(Kind::Low, fs, hi, order));
        sections
    }))
}

/// Butterworth bandstop: the sum of a lowpass at `lo` and a highpass at
/// `hi` (cascading the two would produce a bandpass instead).
pub fn bandstop(s: &Sound, lo: impl IntoFreq, hi: impl IntoFreq, order: usize) -> Result<Sound> {
    check_order(order)?;
    let lo_hz = check_corner(lo.into_freq(), s.rate())?;
    let hi_hz = check_corner(hi.into_freq(), s.rate())?;
    if lo_hz >= hi_hz {
        return Err(Error::OutOfRange(format!(
            "band edges are inverted: {lo_hz} Hz >= {hi_hz} Hz"
        )));
    }
    let fs = s.rate() as f64;
    let low = apply(s, || cascade(Kind::Low, fs, lo_hz, order));
    let high = apply(s, || cascade(Kind::High, fs, hi_hz, order));
    let samples = low
        .samples()
        .iter()
        .zip(high.samples())
        .map(|(a, b)| a + b)
        .collect();
    Sound::from_frames(samples, s.channels(), s.rate())
}
