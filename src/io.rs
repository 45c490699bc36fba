//! External collaborators: audio files, the window layer's event feed,
//! and the visual display hook.

use std::path::Path;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::warn;

use crate::error::{Error, Result};
use crate::sched::event::{Event, EventSource};
use crate::sound::Sound;

/// Load a WAV file as a [`Sound`]. 16-bit integer and 32-bit float PCM
/// are accepted; other encodings would need an arbitrary normalization
/// choice, so they fail instead.
pub fn load_wav(path: impl AsRef<Path>) -> Result<Sound> {
    let mut reader = hound::WavReader::open(&path)
        .map_err(|e| Error::Type(format!("cannot read {}: {e}", path.as_ref().display())))?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.channels > 2 {
        return Err(Error::Shape(format!(
            "{} has {} channels; only mono and stereo are supported",
            path.as_ref().display(),
            spec.channels
        )));
    }
    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Type(e.to_string()))?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Type(e.to_string()))?,
        (format, bits) => {
            return Err(Error::Type(format!(
                "unsupported WAV encoding {format:?}/{bits}-bit in {}",
                path.as_ref().display()
            )))
        }
    };
    Sound::from_frames(samples, spec.channels, spec.sample_rate)
}

/// Write a sound as 16-bit PCM.
pub fn save_wav(path: impl AsRef<Path>, sound: &Sound) -> Result<()> {
    let spec = WavSpec {
        channels: sound.channels(),
        sample_rate: sound.rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&path, spec)
        .map_err(|e| Error::Device(format!("cannot create {}: {e}", path.as_ref().display())))?;
    for &s in sound.samples() {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(v)
            .map_err(|e| Error::Device(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Device(e.to_string()))?;
    Ok(())
}

/// Fire-and-forget visual display. The scheduler never waits on it;
/// moments wrap a call to obtain scheduled presentation.
pub trait Presenter<T> {
    fn display(&mut self, item: T);
}

impl<T, F: FnMut(T)> Presenter<T> for F {
    fn display(&mut self, item: T) {
        self(item)
    }
}

/// Handle the window layer pushes events through.
#[derive(Clone)]
pub struct EventPusher {
    tx: Sender<Event>,
    epoch: Instant,
}

impl EventPusher {
    /// Current time on the event clock, for stamping events at their
    /// arrival site.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn push(&self, event: Event) {
        if let Err(TrySendError::Disconnected(_)) = self.tx.try_send(event) {
            warn!("event dropped: experiment loop has gone away");
        }
    }
}

/// A channel-backed [`EventSource`] for real input devices.
pub struct ChannelEvents {
    rx: Receiver<Event>,
    epoch: Instant,
}

/// Create the pusher/source pair sharing one clock epoch.
pub fn channel_events() -> (EventPusher, ChannelEvents) {
    let (tx, rx) = unbounded();
    let epoch = Instant::now();
    (
        EventPusher { tx, epoch },
        ChannelEvents { rx, epoch },
    )
}

impl EventSource for ChannelEvents {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn poll(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}
