//! The realtime mixing core.
//!
//! [`MixerCore::process`] is the body of the audio callback, kept free of
//! any device type so tests can drive it with synthetic buffer times. It
//! must not allocate, block or lock: every queue it reads is an SPSC ring
//! it exclusively consumes, and every value it publishes is an atomic.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ringbuf::traits::Consumer;

use super::queue::Lane;

/// Engine-wide state written by the callback and read by the control
/// thread: observed lateness, the driver's latency estimate, and the last
/// buffer size. Floats are stored as bits.
pub struct EngineShared {
    epoch: Instant,
    playback_error: AtomicI64,
    latency_bits: AtomicU64,
    buffer_frames: AtomicU64,
}

impl EngineShared {
    pub fn new() -> Self {
        EngineShared {
            epoch: Instant::now(),
            playback_error: AtomicI64::new(0),
            latency_bits: AtomicU64::new(0f64.to_bits()),
            buffer_frames: AtomicU64::new(0),
        }
    }

    /// Seconds on the stream clock.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn last_latency(&self) -> f64 {
        f64::from_bits(self.latency_bits.load(Ordering::Relaxed))
    }

    pub fn last_buffer_frames(&self) -> usize {
        self.buffer_frames.load(Ordering::Relaxed) as usize
    }

    /// Frames of lateness observed for a scheduled sound. Accumulates
    /// negatively until the next warning inspection.
    pub fn add_lateness(&self, frames: u64) {
        self.playback_error
            .fetch_sub(frames as i64, Ordering::Relaxed);
    }

    /// Read-and-clear of the lateness counter (negative = frames late).
    pub fn take_playback_error(&self) -> i64 {
        self.playback_error.swap(0, Ordering::Relaxed)
    }

    fn record_callback(&self, latency: f64, frames: usize) {
        self.latency_bits.store(latency.to_bits(), Ordering::Relaxed);
        self.buffer_frames.store(frames as u64, Ordering::Relaxed);
    }
}

impl Default for EngineShared {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MixerCore {
    lanes: Vec<Lane>,
    shared: Arc<EngineShared>,
    rate: u32,
    // redundant with rate, but spares the callback a division per frame
    frame_dur: f64,
}

impl MixerCore {
    pub fn new(lanes: Vec<Lane>, shared: Arc<EngineShared>, rate: u32) -> Self {
        MixerCore {
            lanes,
            shared,
            rate,
            frame_dur: 1.0 / rate as f64,
        }
    }

    /// Fill `out` (interleaved stereo i16) for a buffer whose first frame
    /// hits the DAC at `t_out`, observed at stream time `t_now`.
    pub fn process(&mut self, out: &mut [i16], t_out: f64, t_now: f64) {
        out.fill(0);
        let frames = out.len() / 2;
        self.shared.record_callback(t_out - t_now, frames);
        for lane in &mut self.lanes {
            mix_lane(
                lane,
                out,
                frames,
                t_out,
                self.rate,
                self.frame_dur,
                &self.shared,
            );
        }
    }
}

fn mix_lane(
    lane: &mut Lane,
    out: &mut [i16],
    frames: usize,
    t_out: f64,
    rate: u32,
    frame_dur: f64,
    engine: &EngineShared,
) {
    if lane.shared.take_clear() {
        lane.drain();
    }
    if lane.shared.take_drop_head() {
        if lane.active.take().is_none() {
            let _ = lane.cons.try_pop();
        }
    }
    if lane.shared.is_paused() {
        return;
    }

    let buf_end = t_out + frames as f64 * frame_dur;
    if !lane.next_head() {
        // nothing to consume: the channel is free from the end of this
        // buffer onward
        lane.shared.set_done_at(buf_end);
        return;
    }

    let mut write = 0usize;
    while write < frames {
        if !lane.next_head() {
            break;
        }
        let head = lane.active.as_mut().expect("next_head just succeeded");
        let mut zero_padding = write;
        if head.offset == 0 {
            if head.start > 0.0 {
                if head.start >= buf_end {
                    // belongs to a future buffer
                    break;
                }
                let padding = ((head.start - t_out) * rate as f64).floor() as i64;
                if padding < write as i64 {
                    // scheduled start already passed: log the shortfall and
                    // pull the sound forward to the write position
                    engine.add_lateness((write as i64 - padding) as u64);
                    zero_padding = write;
                    lane.shared.set_done_at(
                        t_out + (zero_padding + head.frames()) as f64 * frame_dur,
                    );
                } else {
                    zero_padding = padding as usize;
                    lane.shared
                        .set_done_at(head.start + head.frames() as f64 * frame_dur);
                }
            } else {
                // ASAP: start at the current write position
                zero_padding = write;
                lane.shared
                    .set_done_at(t_out + (zero_padding + head.frames()) as f64 * frame_dur);
            }
        }

        let n = (frames - zero_padding).min(head.frames() - head.offset);
        let data = head.sound.data();
        for k in 0..n {
            let src = (head.offset + k) * 2;
            let dst = (zero_padding + k) * 2;
            out[dst] = out[dst].saturating_add(data[src]);
            out[dst + 1] = out[dst + 1].saturating_add(data[src + 1]);
        }
        head.offset += n;
        write = zero_padding + n;

        if head.offset >= head.frames() {
            // finished: dropping the TimedSound here is the free; the ring
            // guarantees we are its only owner at this point
            lane.active = None;
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::queue::{build_lanes, lane_pair, TimedSound};
    use crate::sound::CanonicalSound;

    fn level_sound(frames: usize, level: i16, rate: u32) -> CanonicalSound {
        CanonicalSound::from_interleaved(vec![level; frames * 2], rate).unwrap()
    }

    #[test]
    fn asap_sound_starts_at_buffer_head() {
        let (mut prod, lane) = lane_pair(4);
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared.clone(), 100);
        prod.push(TimedSound::new(level_sound(3, 10, 100), -1.0))
            .ok()
            .unwrap();

        let mut out = vec![0i16; 16]; // 8 frames
        mixer.process(&mut out, 1.0, 0.99);
        assert_eq!(&out[..8], &[10, 10, 10, 10, 10, 10, 0, 0]);
        assert_eq!(shared.take_playback_error(), 0);
        assert_eq!(shared.last_buffer_frames(), 8);
        assert!((shared.last_latency() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn scheduled_sound_is_zero_padded() {
        let (mut prod, lane) = lane_pair(4);
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared, 100);
        // buffer covers [1.0, 1.08); start at 1.04 -> 4 frames of padding
        prod.push(TimedSound::new(level_sound(2, 7, 100), 1.04))
            .ok()
            .unwrap();

        let mut out = vec![0i16; 16];
        mixer.process(&mut out, 1.0, 1.0);
        assert_eq!(&out[..12], &[0, 0, 0, 0, 0, 0, 0, 0, 7, 7, 7, 7]);
    }

    #[test]
    fn late_sound_pulls_forward_and_counts_error() {
        let (mut prod, lane) = lane_pair(4);
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared.clone(), 100);
        // start 0.05 s before the buffer: 5 frames late
        prod.push(TimedSound::new(level_sound(2, 9, 100), 0.95))
            .ok()
            .unwrap();

        let mut out = vec![0i16; 16];
        mixer.process(&mut out, 1.0, 1.0);
        assert_eq!(&out[..4], &[9, 9, 9, 9]);
        assert_eq!(shared.take_playback_error(), -5);
        // cleared on read
        assert_eq!(shared.take_playback_error(), 0);
    }

    #[test]
    fn future_sound_waits_for_its_buffer() {
        let (mut prod, lane) = lane_pair(4);
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared, 100);
        prod.push(TimedSound::new(level_sound(2, 5, 100), 2.0))
            .ok()
            .unwrap();

        let mut out = vec![0i16; 16];
        mixer.process(&mut out, 1.0, 1.0);
        assert!(out.iter().all(|&x| x == 0));
        // second buffer, one second later, contains it at its start
        mixer.process(&mut out, 2.0, 2.0);
        assert_eq!(&out[..4], &[5, 5, 5, 5]);
    }

    #[test]
    fn queue_plays_in_enqueue_order() {
        let (mut prod, lane) = lane_pair(8);
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared, 100);
        prod.push(TimedSound::new(level_sound(3, 1, 100), -1.0))
            .ok()
            .unwrap();
        prod.push(TimedSound::new(level_sound(3, 2, 100), -1.0))
            .ok()
            .unwrap();
        prod.push(TimedSound::new(level_sound(2, 3, 100), -1.0))
            .ok()
            .unwrap();

        let mut out = vec![0i16; 16];
        mixer.process(&mut out, 1.0, 1.0);
        let left: Vec<i16> = (0..8).map(|f| out[f * 2]).collect();
        assert_eq!(left, vec![1, 1, 1, 2, 2, 2, 3, 3]);
    }

    #[test]
    fn sound_spans_buffers() {
        let (mut prod, lane) = lane_pair(4);
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared, 100);
        prod.push(TimedSound::new(level_sound(12, 4, 100), -1.0))
            .ok()
            .unwrap();

        let mut out = vec![0i16; 16];
        mixer.process(&mut out, 1.0, 1.0);
        assert!(out.iter().all(|&x| x == 4));
        mixer.process(&mut out, 1.08, 1.08);
        let left: Vec<i16> = (0..8).map(|f| out[f * 2]).collect();
        assert_eq!(left, vec![4, 4, 4, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn overlapping_channels_sum() {
        let (producers, lanes) = build_lanes(2, 4);
        let mut producers = producers;
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(lanes, shared, 100);
        producers[0]
            .push(TimedSound::new(level_sound(4, 100, 100), -1.0))
            .ok()
            .unwrap();
        producers[1]
            .push(TimedSound::new(level_sound(4, 23, 100), -1.0))
            .ok()
            .unwrap();

        let mut out = vec![0i16; 16];
        mixer.process(&mut out, 1.0, 1.0);
        assert_eq!(out[0], 123);
        assert_eq!(out[1], 123);
    }

    #[test]
    fn summation_saturates() {
        let (mut prod, lane) = lane_pair(4);
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared, 100);
        prod.push(TimedSound::new(level_sound(2, i16::MAX, 100), -1.0))
            .ok()
            .unwrap();
        let (mut prod2, lane2) = lane_pair(4);
        // second lane summed on top of the first
        prod2
            .push(TimedSound::new(level_sound(2, i16::MAX, 100), -1.0))
            .ok()
            .unwrap();
        mixer.lanes.push(lane2);

        let mut out = vec![0i16; 8];
        mixer.process(&mut out, 1.0, 1.0);
        assert_eq!(out[0], i16::MAX);
    }

    #[test]
    fn pause_skips_resume_replays() {
        let (mut prod, lane) = lane_pair(4);
        let paused = lane.shared.clone();
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared, 100);
        prod.push(TimedSound::new(level_sound(2, 6, 100), -1.0))
            .ok()
            .unwrap();

        paused.set_paused(true);
        let mut out = vec![0i16; 8];
        mixer.process(&mut out, 1.0, 1.0);
        assert!(out.iter().all(|&x| x == 0));

        paused.set_paused(false);
        mixer.process(&mut out, 1.04, 1.04);
        assert_eq!(&out[..4], &[6, 6, 6, 6]);
    }

    #[test]
    fn clear_drains_queue() {
        let (mut prod, lane) = lane_pair(4);
        let ctl = lane.shared.clone();
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared, 100);
        prod.push(TimedSound::new(level_sound(2, 6, 100), -1.0))
            .ok()
            .unwrap();
        prod.push(TimedSound::new(level_sound(2, 7, 100), -1.0))
            .ok()
            .unwrap();

        ctl.request_clear();
        let mut out = vec![0i16; 8];
        mixer.process(&mut out, 1.0, 1.0);
        assert!(out.iter().all(|&x| x == 0));
        mixer.process(&mut out, 1.04, 1.04);
        assert!(out.iter().all(|&x| x == 0));
    }

    #[test]
    fn empty_lane_advances_done_at() {
        let (_prod, lane) = lane_pair(4);
        let ctl = lane.shared.clone();
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared, 100);
        let mut out = vec![0i16; 16];
        mixer.process(&mut out, 1.0, 1.0);
        assert!((ctl.done_at() - 1.08).abs() < 1e-9);
    }

    #[test]
    fn done_at_covers_queued_tail() {
        let (mut prod, lane) = lane_pair(4);
        let ctl = lane.shared.clone();
        let shared = Arc::new(EngineShared::new());
        let mut mixer = MixerCore::new(vec![lane], shared, 100);
        prod.push(TimedSound::new(level_sound(4, 1, 100), -1.0))
            .ok()
            .unwrap();
        let mut out = vec![0i16; 16];
        mixer.process(&mut out, 1.0, 1.0);
        assert!((ctl.done_at() - 1.04).abs() < 1e-9);
    }
}
