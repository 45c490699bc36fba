//! Invariants of the synthesis primitives.

use psych::dsp::{attenuate, fadeto, leftright, mix, mult, ramp, silence, tone};
use psych::sound::{Side, Sound};
use psych::units::UnitExt;

const RATE: u32 = 44_100;

fn assert_close(a: f32, b: f32, tol: f32, what: &str) {
    assert!((a - b).abs() <= tol, "{what}: {a} vs {b}");
}

#[test]
fn tone_duration_and_canonical_shape() {
    let s = tone(1.0.khz(), 1.0.secs(), RATE);
    assert_eq!(s.frames(), 44_100);
    assert!((s.duration().as_secs() - 1.0).abs() < 1e-9);
    let c = s.canonicalize(RATE).unwrap();
    assert_eq!(c.frames(), 44_100);
    assert_eq!(c.data().len(), 2 * 44_100);
    assert!((c.duration().as_secs() - 1.0).abs() < 1e-9);
}

#[test]
fn silence_sample_count() {
    assert_eq!(silence(0.5.secs(), RATE).frames(), 22_050);
    assert_eq!(silence(1.0.ms(), RATE).frames(), 44);
}

#[test]
fn mixing_with_silence_is_identity() {
    let s = tone(440.0.hz(), 0.25.secs(), RATE);
    let z = silence(s.duration(), RATE);
    let m = mix(&[&s, &z]).unwrap();
    assert_eq!(m.frames(), s.frames());
    assert_eq!(m.samples(), s.samples());
}

#[test]
fn mix_and_mult_commute() {
    let a = tone(440.0.hz(), 0.1.secs(), RATE);
    let b = tone(550.0.hz(), 0.2.secs(), RATE);
    assert_eq!(mix(&[&a, &b]).unwrap(), mix(&[&b, &a]).unwrap());
    assert_eq!(mult(&[&a, &b]).unwrap(), mult(&[&b, &a]).unwrap());
}

#[test]
fn mix_zero_pads_to_longest() {
    let t = tone(440.0.hz(), 0.1.secs(), RATE);
    let z = silence(0.2.secs(), RATE);
    let m = mix(&[&t, &z]).unwrap();
    assert!((m.duration().as_secs() - 0.2).abs() < 1e-9);
    assert_eq!(&m.samples()[..t.samples().len()], t.samples());
    assert!(m.samples()[t.samples().len()..].iter().all(|&x| x == 0.0));
}

#[test]
fn ramp_edges_and_sustain() {
    let raw = tone(500.0.hz(), 0.1.secs(), RATE);
    let ramped = ramp(&raw, 5.0.ms()).unwrap();
    let ramp_frames = 220; // ⌊5 ms · 44100⌋

    assert!(ramped.samples()[0].abs() <= 1e-3, "onset not silenced");
    assert!(
        ramped.samples().last().unwrap().abs() <= 1e-3,
        "offset not silenced"
    );
    // at the end of the rise the envelope is exactly 1
    assert_close(
        ramped.samples()[ramp_frames],
        raw.samples()[ramp_frames],
        1e-6,
        "rise end",
    );
    // the sustain region is untouched
    for k in ramp_frames..raw.frames() - ramp_frames {
        assert_eq!(ramped.samples()[k], raw.samples()[k], "sustain frame {k}");
    }
    // the rise follows the half-cosine window
    for k in 0..ramp_frames {
        let w = 0.5 - 0.5 * (std::f64::consts::PI * k as f64 / ramp_frames as f64).cos();
        assert_close(
            ramped.samples()[k],
            raw.samples()[k] * w as f32,
            1e-6,
            "rise window",
        );
    }
}

#[test]
fn attenuation_scales_by_db() {
    let s = tone(440.0.hz(), 0.2.secs(), RATE);
    let reference = attenuate(&s, 0.0);
    let quieter = attenuate(&s, 20.0);
    let expect = 10.0f32.powf(-1.0);
    for (q, r) in quieter.samples().iter().zip(reference.samples()) {
        assert_close(*q, r * expect, 1e-4, "attenuated sample");
    }
}

#[test]
fn side_selection_reconstructs_stereo() {
    let l = tone(440.0.hz(), 0.1.secs(), RATE);
    let r = tone(660.0.hz(), 0.1.secs(), RATE);
    let s = leftright(&l, &r).unwrap();
    // the two silenced-side projections sum back to the original
    let rebuilt = mix(&[&s.left(), &s.right()]).unwrap();
    assert_eq!(rebuilt, s);
    // and extracting each side returns the original mono signals
    assert_eq!(
        leftright(&s.channel(Side::Left), &s.channel(Side::Right)).unwrap(),
        s
    );
}

#[test]
fn mono_left_silences_right() {
    let m = tone(440.0.hz(), 0.05.secs(), RATE);
    let l = m.left();
    assert_eq!(l.channels(), 2);
    for frame in 0..l.frames() {
        assert_eq!(l.sample(frame, 0), m.samples()[frame]);
        assert_eq!(l.sample(frame, 1), 0.0);
    }
}

#[test]
fn fadeto_duration_subtracts_overlap() {
    let ones = |secs: f64| {
        Sound::from_frames(vec![1.0; (secs * RATE as f64) as usize], 1, RATE).unwrap()
    };
    let a = ones(1.0);
    let b = ones(1.0);
    let faded = fadeto(&a, &b, 50.0.ms()).unwrap();
    assert!((faded.duration().as_secs() - 1.95).abs() < 1e-6);

    let overlap_frames = 2205;
    let fade_start = a.frames() - overlap_frames;
    // before the crossfade: pure a
    assert_eq!(faded.samples()[fade_start - 1], 1.0);
    // inside it: the equal-gain sum of the two raised cosines stays near 1
    for k in fade_start..a.frames() {
        let x = faded.samples()[k];
        assert!((x - 1.0).abs() < 0.03, "crossfade dip {x} at frame {k}");
    }
    // after it: pure b
    assert_eq!(faded.samples()[a.frames() + 100], 1.0);
}

#[test]
fn scheduled_tone_scenario() {
    // ramp(tone(500 Hz, 0.1 s), 5 ms): silent edges, full-scale interior
    let s = ramp(&tone(500.0.hz(), 0.1.secs(), RATE), 5.0.ms()).unwrap();
    assert!(s.samples()[0].abs() <= 1e-3);
    let at_5ms = s.samples()[(0.005 * RATE as f64) as usize];
    let raw_5ms = tone(500.0.hz(), 0.1.secs(), RATE).samples()[(0.005 * RATE as f64) as usize];
    assert_close(at_5ms, raw_5ms, 1e-6, "sample at 5 ms");
    assert!(s.samples().last().unwrap().abs() <= 1e-3);
}
