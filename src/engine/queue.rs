//! Per-channel playback queues.
//!
//! Each channel is a single-producer/single-consumer ring of
//! [`TimedSound`]s: the control thread pushes, the audio callback pops.
//! Control-plane state the callback must also see (pause, done-at, splice
//! and clear requests) lives in a [`ChannelShared`] block of atomics next
//! to the ring.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::*;
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::sound::CanonicalSound;

/// A sound bound to a start time on the stream clock. `start < 0` means
/// "as soon as possible"; `offset` counts frames already mixed. The record
/// lives from enqueue until `offset == frames()`, at which point the
/// consumer drops it (and with it the callback's reference to the buffer).
pub struct TimedSound {
    pub sound: CanonicalSound,
    pub start: f64,
    pub offset: usize,
}

impl TimedSound {
    pub fn new(sound: CanonicalSound, start: f64) -> Self {
        TimedSound {
            sound,
            start,
            offset: 0,
        }
    }

    pub fn frames(&self) -> usize {
        self.sound.frames()
    }
}

/// Atomics shared between a channel's producer and consumer halves. The
/// f64 `done_at` is stored as bits in an `AtomicU64`.
pub struct ChannelShared {
    paused: AtomicBool,
    done_at_bits: AtomicU64,
    drop_head: AtomicBool,
    clear: AtomicBool,
}

impl ChannelShared {
    fn new() -> Self {
        ChannelShared {
            paused: AtomicBool::new(false),
            done_at_bits: AtomicU64::new(0f64.to_bits()),
            drop_head: AtomicBool::new(false),
            clear: AtomicBool::new(false),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    /// Stream-clock time at which everything queued on this channel will
    /// have finished. Written only by the callback.
    pub fn done_at(&self) -> f64 {
        f64::from_bits(self.done_at_bits.load(Ordering::Relaxed))
    }

    pub fn set_done_at(&self, t: f64) {
        self.done_at_bits.store(t.to_bits(), Ordering::Relaxed);
    }

    /// Ask the callback to discard the channel's current head (used when a
    /// paused stream sound is replaced). The producer must not touch the
    /// head itself.
    pub fn request_drop_head(&self) {
        self.drop_head.store(true, Ordering::Release);
    }

    pub fn take_drop_head(&self) -> bool {
        self.drop_head.swap(false, Ordering::AcqRel)
    }

    /// Ask the callback to drain the whole queue.
    pub fn request_clear(&self) {
        self.clear.store(true, Ordering::Release);
    }

    pub fn take_clear(&self) -> bool {
        self.clear.swap(false, Ordering::AcqRel)
    }
}

/// Control-thread half of a channel.
pub struct LaneProducer {
    prod: HeapProd<TimedSound>,
    shared: Arc<ChannelShared>,
}

impl LaneProducer {
    pub fn shared(&self) -> &ChannelShared {
        &self.shared
    }

    /// Whether the next producer slot is free.
    pub fn has_vacancy(&self) -> bool {
        !self.prod.is_full()
    }

    /// Enqueue; hands the sound back when the ring is full.
    pub fn push(&mut self, sound: TimedSound) -> Result<(), TimedSound> {
        self.prod.try_push(sound)
    }
}

/// Callback half of a channel. `active` is the head currently being mixed,
/// held out of the ring so it can span callback buffers.
pub struct Lane {
    pub(crate) cons: HeapCons<TimedSound>,
    pub(crate) shared: Arc<ChannelShared>,
    pub(crate) active: Option<TimedSound>,
}

impl Lane {
    pub(crate) fn next_head(&mut self) -> bool {
        if self.active.is_none() {
            self.active = self.cons.try_pop();
        }
        self.active.is_some()
    }

    pub(crate) fn drain(&mut self) {
        self.active = None;
        while self.cons.try_pop().is_some() {}
    }
}

/// One SPSC channel of the given capacity (rounded up to a power of two).
pub fn lane_pair(capacity: usize) -> (LaneProducer, Lane) {
    let rb = HeapRb::<TimedSound>::new(capacity.max(2).next_power_of_two());
    let (prod, cons) = rb.split();
    let shared = Arc::new(ChannelShared::new());
    (
        LaneProducer {
            prod,
            shared: shared.clone(),
        },
        Lane {
            cons,
            shared,
            active: None,
        },
    )
}

/// The full channel set: `num_channels` discrete lanes of `queue_size`
/// followed by `num_channels` streaming lanes of capacity 2.
pub fn build_lanes(num_channels: usize, queue_size: usize) -> (Vec<LaneProducer>, Vec<Lane>) {
    let mut producers = Vec::with_capacity(2 * num_channels);
    let mut lanes = Vec::with_capacity(2 * num_channels);
    for _ in 0..num_channels {
        let (p, l) = lane_pair(queue_size);
        producers.push(p);
        lanes.push(l);
    }
    for _ in 0..num_channels {
        let (p, l) = lane_pair(2);
        producers.push(p);
        lanes.push(l);
    }
    (producers, lanes)
}
