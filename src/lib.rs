//! Experiment control for psychoacoustic and behavioral research.
//!
//! The crate is built around three layers:
//!
//! - [`dsp`] synthesizes stimuli as [`sound::Sound`] values (tones, noise,
//!   harmonic complexes, filters, ramps) at an explicit sample rate;
//! - [`engine::AudioEngine`] mixes canonicalized sounds onto the default
//!   stereo output in a realtime callback, with per-channel queues,
//!   scheduled starts and sub-10 ms latency reporting;
//! - [`sched::Experiment`] sequences trials as queues of moments (timed
//!   callbacks, response waits, conditional blocks) against an input
//!   source, recording events through [`record::Recorder`].
//!
//! A minimal session:
//!
//! ```no_run
//! use psych::config::AppConfig;
//! use psych::engine::AudioEngine;
//! use psych::sound::CacheKey;
//! use psych::units::UnitExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = AppConfig::load_or_default("psych.toml");
//! let mut engine = AudioEngine::new();
//! engine.setup(&config.engine)?;
//!
//! let beep = psych::dsp::ramp(
//!     &psych::dsp::tone(1.0.khz(), 0.5.secs(), config.engine.sample_rate),
//!     5.0.ms(),
//! )?;
//! let beep = engine.canonical(CacheKey::Id(1), &beep)?;
//! engine.play(&beep, 0.0, None)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod io;
pub mod record;
pub mod sched;
pub mod sound;
pub mod units;

pub use error::{Error, Result};
