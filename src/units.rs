//! Dimensional time and frequency values.
//!
//! `Time` and `Freq` are tagged seconds/Hertz. Arithmetic stays inside one
//! dimension except for `Time * Freq`, which collapses to a dimensionless
//! count (samples for a rate, cycles for a tone frequency). Bare floats are
//! accepted wherever a quantity is expected, with a warning, and default to
//! seconds or Hz.

use std::ops::{Add, Div, Mul, Range, Sub};

use tracing::warn;

use crate::error::{Error, Result};

/// A duration or point on a clock, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Time(f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn secs(s: f64) -> Self {
        Time(s)
    }

    pub fn ms(ms: f64) -> Self {
        Time(ms * 1e-3)
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }

    /// Frame index/count for this time at `rate`, `⌊t·R⌋`, clamped at zero.
    pub fn to_frames(self, rate: u32) -> usize {
        let frames = (self.0 * rate as f64).floor();
        if frames <= 0.0 { 0 } else { frames as usize }
    }
}

/// A frequency in Hertz.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Freq(f64);

impl Freq {
    pub fn hz(hz: f64) -> Self {
        Freq(hz)
    }

    pub fn khz(khz: f64) -> Self {
        Freq(khz * 1e3)
    }

    pub fn as_hz(self) -> f64 {
        self.0
    }
}

impl Add for Time {
    type Output = Time;
    fn add(self, rhs: Time) -> Time {
        Time(self.0 + rhs.0)
    }
}

impl Sub for Time {
    type Output = Time;
    fn sub(self, rhs: Time) -> Time {
        Time(self.0 - rhs.0)
    }
}

impl Mul<f64> for Time {
    type Output = Time;
    fn mul(self, rhs: f64) -> Time {
        Time(self.0 * rhs)
    }
}

impl Add for Freq {
    type Output = Freq;
    fn add(self, rhs: Freq) -> Freq {
        Freq(self.0 + rhs.0)
    }
}

impl Sub for Freq {
    type Output = Freq;
    fn sub(self, rhs: Freq) -> Freq {
        Freq(self.0 - rhs.0)
    }
}

impl Mul<f64> for Freq {
    type Output = Freq;
    fn mul(self, rhs: f64) -> Freq {
        Freq(self.0 * rhs)
    }
}

/// The one permitted cross-dimension operation: time times frequency is a
/// dimensionless count.
impl Mul<Freq> for Time {
    type Output = f64;
    fn mul(self, rhs: Freq) -> f64 {
        self.0 * rhs.0
    }
}

impl Mul<Time> for Freq {
    type Output = f64;
    fn mul(self, rhs: Time) -> f64 {
        self.0 * rhs.0
    }
}

/// `1 / time` is a frequency and vice versa.
impl Div<Time> for f64 {
    type Output = Freq;
    fn div(self, rhs: Time) -> Freq {
        Freq(self / rhs.0)
    }
}

impl Div<Freq> for f64 {
    type Output = Time;
    fn div(self, rhs: Freq) -> Time {
        Time(self / rhs.0)
    }
}

/// Accepts `Time` or a bare float (warned, read as seconds).
pub trait IntoTime {
    fn into_time(self) -> Time;
}

impl IntoTime for Time {
    fn into_time(self) -> Time {
        self
    }
}

impl IntoTime for f64 {
    fn into_time(self) -> Time {
        warn!("unitless value {self} passed where a time was expected; assuming seconds");
        Time(self)
    }
}

/// Accepts `Freq` or a bare float (warned, read as Hz).
pub trait IntoFreq {
    fn into_freq(self) -> Freq;
}

impl IntoFreq for Freq {
    fn into_freq(self) -> Freq {
        self
    }
}

impl IntoFreq for f64 {
    fn into_freq(self) -> Freq {
        warn!("unitless value {self} passed where a frequency was expected; assuming Hz");
        Freq(self)
    }
}

/// Literal helpers so call sites read `0.5.secs()`, `1.0.khz()`.
pub trait UnitExt {
    fn secs(self) -> Time;
    fn ms(self) -> Time;
    fn hz(self) -> Freq;
    fn khz(self) -> Freq;
}

impl UnitExt for f64 {
    fn secs(self) -> Time {
        Time::secs(self)
    }
    fn ms(self) -> Time {
        Time::ms(self)
    }
    fn hz(self) -> Freq {
        Freq::hz(self)
    }
    fn khz(self) -> Freq {
        Freq::khz(self)
    }
}

/// Upper bound of a [`Span`]: a fixed time or the end of the sound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpanEnd {
    Until(Time),
    End,
}

/// Half-open interval `[from, to)` in time units, used for slicing sounds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Span {
    pub from: Time,
    pub to: SpanEnd,
}

impl Span {
    pub fn new(from: impl IntoTime, to: impl IntoTime) -> Self {
        Span {
            from: from.into_time(),
            to: SpanEnd::Until(to.into_time()),
        }
    }

    /// `[from, end of sound]`.
    pub fn from(from: impl IntoTime) -> Self {
        Span {
            from: from.into_time(),
            to: SpanEnd::End,
        }
    }

    /// Resolve to frame indices against a sound of `frames` frames at `rate`.
    pub fn resolve(&self, rate: u32, frames: usize) -> Result<Range<usize>> {
        if self.from.as_secs() < 0.0 {
            return Err(Error::OutOfRange(format!(
                "slice start {} s is negative",
                self.from.as_secs()
            )));
        }
        let lo = self.from.to_frames(rate);
        let hi = match self.to {
            SpanEnd::Until(t) => t.to_frames(rate),
            SpanEnd::End => frames,
        };
        if lo > hi {
            return Err(Error::OutOfRange(format!(
                "slice start frame {lo} is past its end frame {hi}"
            )));
        }
        if hi > frames {
            return Err(Error::OutOfRange(format!(
                "slice end frame {hi} exceeds the sound's {frames} frames"
            )));
        }
        Ok(lo..hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_times_freq_is_a_count() {
        let samples = Time::secs(2.0) * Freq::hz(44_100.0);
        assert_eq!(samples, 88_200.0);
        assert_eq!(Freq::khz(1.0) * Time::ms(500.0), 500.0);
    }

    #[test]
    fn to_frames_floors() {
        assert_eq!(Time::ms(5.0).to_frames(44_100), 220);
        assert_eq!(Time::secs(1.0).to_frames(44_100), 44_100);
        assert_eq!(Time::secs(-1.0).to_frames(44_100), 0);
    }

    #[test]
    fn reciprocal_crosses_dimension() {
        let period = 1.0 / Freq::hz(100.0);
        assert!((period.as_secs() - 0.01).abs() < 1e-12);
        let f = 1.0 / Time::ms(10.0);
        assert!((f.as_hz() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn span_resolves_half_open() {
        let span = Span::new(Time::secs(0.5), Time::secs(1.0));
        assert_eq!(span.resolve(1000, 2000).unwrap(), 500..1000);
        let tail = Span::from(Time::secs(1.5));
        assert_eq!(tail.resolve(1000, 2000).unwrap(), 1500..2000);
    }

    #[test]
    fn span_rejects_bad_bounds() {
        assert!(Span::new(Time::secs(-0.1), Time::secs(1.0))
            .resolve(1000, 2000)
            .is_err());
        assert!(Span::new(Time::secs(0.0), Time::secs(3.0))
            .resolve(1000, 2000)
            .is_err());
        assert!(Span::new(Time::secs(1.0), Time::secs(0.5))
            .resolve(1000, 2000)
            .is_err());
    }
}
