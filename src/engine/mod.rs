//! The realtime audio engine.
//!
//! Owns the hardware stream, 2N playback channels (the second half
//! reserved for streaming), and the canonicalization cache. Lifecycle is
//! `setup → play/pause/resume/stop → close`; every operation on an engine
//! that is not set up returns [`Error::NotReady`]. Re-running `setup`
//! closes and reopens the device and flushes the cache, since a new rate
//! invalidates every cached conversion.

pub mod mixer;
pub mod output;
pub mod queue;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::sound::{CacheKey, CanonicalSound, Sound, SoundCache, DEFAULT_CACHE_CAPACITY};
use mixer::{EngineShared, MixerCore};
use queue::{build_lanes, LaneProducer, TimedSound};

struct EngineInner {
    producers: Vec<LaneProducer>,
    shared: Arc<EngineShared>,
    rate: u32,
    num_channels: usize,
    stream_unit: usize,
    pending_warning: Option<String>,
    // keeps the callback alive; dropping it stops the device
    _stream: cpal::Stream,
}

pub struct AudioEngine {
    inner: Option<EngineInner>,
    cache: SoundCache,
}

impl AudioEngine {
    /// A closed engine; call [`setup`](Self::setup) before playing.
    pub fn new() -> Self {
        AudioEngine {
            inner: None,
            cache: SoundCache::new(DEFAULT_CACHE_CAPACITY),
        }
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        AudioEngine {
            inner: None,
            cache: SoundCache::new(capacity),
        }
    }

    /// Open the default stereo output and start mixing. A second call
    /// closes the previous stream first.
    pub fn setup(&mut self, config: &EngineConfig) -> Result<()> {
        if self.inner.is_some() {
            info!("engine re-setup: closing previous stream");
            self.close();
        }
        self.cache.flush();

        let (producers, lanes) = build_lanes(config.num_channels, config.queue_size);
        let shared = Arc::new(EngineShared::new());
        let core = MixerCore::new(lanes, shared.clone(), config.sample_rate);
        let stream = output::open_stream(
            config.sample_rate,
            config.stream_unit,
            core,
            shared.clone(),
        )?;
        self.inner = Some(EngineInner {
            producers,
            shared,
            rate: config.sample_rate,
            num_channels: config.num_channels,
            stream_unit: config.stream_unit,
            pending_warning: None,
            _stream: stream,
        });
        Ok(())
    }

    fn inner(&self) -> Result<&EngineInner> {
        self.inner.as_ref().ok_or(Error::NotReady)
    }

    fn inner_mut(&mut self) -> Result<&mut EngineInner> {
        self.inner.as_mut().ok_or(Error::NotReady)
    }

    pub fn samplerate(&self) -> Result<u32> {
        Ok(self.inner()?.rate)
    }

    /// Seconds on the engine's monotonic stream clock.
    pub fn now(&self) -> Result<f64> {
        Ok(self.inner()?.shared.now())
    }

    /// `last_buffer_size / rate` plus the driver's latency estimate.
    pub fn current_latency(&self) -> Result<f64> {
        let inner = self.inner()?;
        Ok(inner.shared.last_buffer_frames() as f64 / inner.rate as f64
            + inner.shared.last_latency())
    }

    pub fn stream_unit(&self) -> Result<usize> {
        Ok(self.inner()?.stream_unit)
    }

    /// Canonicalize `source` through the engine's cache.
    pub fn canonical(&mut self, key: CacheKey, source: &Sound) -> Result<CanonicalSound> {
        let rate = self.inner()?.rate;
        self.cache
            .get_or_insert_with(key, || source.canonicalize(rate))
    }

    /// Enqueue a sound. `when = 0` plays as soon as possible; `when > 0`
    /// is absolute on the stream clock. `channel = None` auto-assigns the
    /// free channel that frees up soonest. Returns the channel used.
    pub fn play(
        &mut self,
        sound: &CanonicalSound,
        when: f64,
        channel: Option<usize>,
    ) -> Result<usize> {
        let inner = self.inner_mut()?;
        if sound.rate() != inner.rate {
            return Err(Error::RateMismatch {
                sound: sound.rate(),
                engine: inner.rate,
            });
        }

        let mut start = if when > 0.0 { when } else { -1.0 };
        if when > 0.0 {
            let horizon = inner.shared.now()
                + inner.shared.last_buffer_frames() as f64 / inner.rate as f64
                + inner.shared.last_latency();
            if when < horizon {
                let msg = format!(
                    "requested playback at {when:.4} s is inside the {:.1} ms output horizon; playing as soon as possible",
                    (horizon - inner.shared.now()) * 1e3
                );
                warn!("{msg}");
                inner.pending_warning = Some(msg);
                start = -1.0;
            }
        }

        let n = inner.num_channels;
        let channel = match channel {
            Some(c) => {
                if c >= n {
                    return Err(Error::OutOfRange(format!(
                        "channel {c} out of 0..{n}"
                    )));
                }
                c
            }
            None => pick_channel(&inner.producers[..n]).ok_or(Error::NoChannels)?,
        };

        inner.producers[channel]
            .push(TimedSound::new(sound.clone(), start))
            .map_err(|_| Error::NoChannels)?;
        Ok(channel)
    }

    /// Enqueue onto the streaming half of the channel set. Returns the
    /// projected finish time, or `None` when the slot is still full (the
    /// caller retries after the next stream unit). A paused stream channel
    /// is spliced (its head dropped) and resumed.
    pub fn play_next(&mut self, sound: &CanonicalSound, channel: usize) -> Result<Option<f64>> {
        let inner = self.inner_mut()?;
        if sound.rate() != inner.rate {
            return Err(Error::RateMismatch {
                sound: sound.rate(),
                engine: inner.rate,
            });
        }
        let n = inner.num_channels;
        if channel >= n {
            return Err(Error::OutOfRange(format!("channel {channel} out of 0..{n}")));
        }
        let lane = &mut inner.producers[n + channel];
        if lane.shared().is_paused() {
            lane.shared().request_drop_head();
            lane.shared().set_paused(false);
        }
        let done_at = lane.shared().done_at() + sound.duration().as_secs();
        match lane.push(TimedSound::new(sound.clone(), -1.0)) {
            Ok(()) => Ok(Some(done_at)),
            Err(_) => Ok(None),
        }
    }

    /// Pause one queue, or all of them when `channel` is `None`.
    pub fn pause(&mut self, channel: Option<usize>, is_stream: bool) -> Result<()> {
        self.set_paused(channel, is_stream, true)
    }

    pub fn resume(&mut self, channel: Option<usize>, is_stream: bool) -> Result<()> {
        self.set_paused(channel, is_stream, false)
    }

    fn set_paused(&mut self, channel: Option<usize>, is_stream: bool, paused: bool) -> Result<()> {
        let inner = self.inner_mut()?;
        let n = inner.num_channels;
        match channel {
            None => {
                for lane in &inner.producers {
                    lane.shared().set_paused(paused);
                }
            }
            Some(c) => {
                if c >= n {
                    return Err(Error::OutOfRange(format!("channel {c} out of 0..{n}")));
                }
                let idx = if is_stream { n + c } else { c };
                inner.producers[idx].shared().set_paused(paused);
            }
        }
        Ok(())
    }

    /// Drop everything queued on a channel (or on all channels). Audio
    /// already inside the current callback buffer still plays, bounded by
    /// one stream unit.
    pub fn stop(&mut self, channel: Option<usize>) -> Result<()> {
        let inner = self.inner_mut()?;
        let n = inner.num_channels;
        match channel {
            None => {
                for lane in &inner.producers {
                    lane.shared().request_clear();
                }
            }
            Some(c) => {
                if c >= n {
                    return Err(Error::OutOfRange(format!("channel {c} out of 0..{n}")));
                }
                inner.producers[c].shared().request_clear();
            }
        }
        Ok(())
    }

    /// One-shot playback warning, cleared on read. Reports scheduling
    /// faults the callback observed since the last inspection.
    pub fn take_warning(&mut self) -> Option<String> {
        let inner = self.inner.as_mut()?;
        if let Some(msg) = inner.pending_warning.take() {
            return Some(msg);
        }
        let error = inner.shared.take_playback_error();
        if error < 0 {
            let late_ms = -error as f64 / inner.rate as f64 * 1e3;
            return Some(format!(
                "a previously played sound occurred {late_ms:.2} ms after it should have"
            ));
        }
        None
    }

    /// Stop the stream and release every queued sound.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            info!("audio engine closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Auto-assignment: among unpaused discrete channels with a vacant
/// producer slot, the one whose queued tail finishes soonest.
fn pick_channel(producers: &[LaneProducer]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, lane) in producers.iter().enumerate() {
        if lane.shared().is_paused() || !lane.has_vacancy() {
            continue;
        }
        let done_at = lane.shared().done_at();
        match best {
            Some((_, t)) if t <= done_at => {}
            _ => best = Some((i, done_at)),
        }
    }
    best.map(|(i, _)| i)
}
