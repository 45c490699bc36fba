//! Crate-wide error type.
//!
//! Engine operations distinguish errors (returned as `Err`) from warnings:
//! playback lateness never aborts an operation and is surfaced through
//! [`crate::engine::AudioEngine::take_warning`] instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Buffer layout is not a mono or stereo frame matrix.
    #[error("bad sound shape: {0}")]
    Shape(String),

    /// Sample encoding the sound model does not accept.
    #[error("bad sample type: {0}")]
    Type(String),

    /// A time, frequency or index outside the valid range.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Sound too short for the requested ramp.
    #[error("sound of {frames} frames is too short for a {ramp_frames}-frame ramp")]
    DurationTooShort { frames: usize, ramp_frames: usize },

    /// Sound was not canonicalized to the engine rate before playback.
    #[error("sample rate mismatch: sound is {sound} Hz but the engine runs at {engine} Hz")]
    RateMismatch { sound: u32, engine: u32 },

    /// Every unpaused channel has a full queue.
    #[error("all unpaused channels have full buffers")]
    NoChannels,

    /// The audio driver refused a request.
    #[error("audio device error: {0}")]
    Device(String),

    /// Operation on an engine that is not set up.
    #[error("audio engine is not set up")]
    NotReady,

    /// A recorder column name collides with a fixed column.
    #[error("column name is reserved: {0}")]
    ReservedColumn(String),

    /// A recorded value names a column the recorder was not created with.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
