//! Per-sample schedules: parameters are read at the input position each
//! output frame maps back to, so a schedule section governs exactly the
//! audio it covers.

mod common;

use common::{assert_all_finite, dominant_freq_zcr, gen_ramp, gen_sine};
use pitchstretch::{time_stretch_channel, TimeStretchOptions};

#[test]
fn test_pitch_ramp_rises_through_the_buffer() {
    let sr = 22050;
    let n = 2 * sr as usize;
    let input = gen_sine(220.0, sr, n);
    let ramp = gen_ramp(0.0, 12.0, n);

    let out = time_stretch_channel(
        &input,
        sr,
        &TimeStretchOptions::default().with_pitch_shift(ramp),
    )
    .unwrap();
    assert_eq!(out.len(), n);
    assert_all_finite(&out, "pitch ramp");

    let quarter = n / 4;
    let first = dominant_freq_zcr(&out[2048..quarter], sr);
    let last = dominant_freq_zcr(&out[n - quarter..n - 2048], sr);
    assert!(
        last > first * 1.5,
        "pitch did not rise: first quarter {first:.1} Hz, last quarter {last:.1} Hz"
    );
}

#[test]
fn test_stretch_schedule_redistributes_time() {
    // First half at 220 Hz compressed 2x, second half at 880 Hz stretched
    // 2x: the output should spend one fifth of its samples at 220 Hz and
    // the rest at 880 Hz.
    let sr = 22050;
    let n = sr as usize;
    let half = n / 2;
    let mut input = gen_sine(220.0, sr, half);
    input.extend(gen_sine(880.0, sr, n - half));

    let mut schedule = vec![2.0; half];
    schedule.extend(vec![0.5; n - half]);

    let out = time_stretch_channel(
        &input,
        sr,
        &TimeStretchOptions::default().with_stretch_factor(schedule),
    )
    .unwrap();
    // half/2 + (n-half)*2 output samples
    assert_eq!(out.len(), half / 2 + (n - half) * 2);
    assert_all_finite(&out, "two-rate schedule");

    let low = dominant_freq_zcr(&out[1000..4000], sr);
    let high = dominant_freq_zcr(&out[9000..25000], sr);
    assert!(
        (low - 220.0).abs() < 22.0,
        "compressed half should stay at 220 Hz, measured {low:.1}"
    );
    assert!(
        (high - 880.0).abs() < 88.0,
        "stretched half should stay at 880 Hz, measured {high:.1}"
    );
}

#[test]
fn test_v_shaped_stretch_schedule() {
    let sr = 22050;
    let n = sr as usize;
    let half = n / 2;
    let mut schedule = gen_ramp(1.0, 3.0, half);
    schedule.extend(gen_ramp(3.0, 1.0, n - half));
    let expected = schedule.iter().map(|s| 1.0 / s).sum::<f64>().floor() as usize;

    let out = time_stretch_channel(
        &gen_sine(440.0, sr, n),
        sr,
        &TimeStretchOptions::default().with_stretch_factor(schedule),
    )
    .unwrap();
    assert_eq!(out.len(), expected);
    assert_all_finite(&out, "v-shaped schedule");
}

#[test]
fn test_combined_stretch_and_pitch_ramps() {
    let sr = 22050;
    let n = sr as usize;
    let stretch = gen_ramp(0.8, 1.6, n);
    let pitch = gen_ramp(-4.0, 4.0, n);
    let expected = stretch.iter().map(|s| 1.0 / s).sum::<f64>().floor() as usize;

    let out = time_stretch_channel(
        &gen_sine(330.0, sr, n),
        sr,
        &TimeStretchOptions::default()
            .with_stretch_factor(stretch)
            .with_pitch_shift(pitch),
    )
    .unwrap();
    assert_eq!(out.len(), expected);
    assert_all_finite(&out, "combined ramps");
}

#[test]
fn test_steep_schedule_switches_to_short_windows() {
    // Past one octave of local stretch the adaptive planner drops to short
    // analysis windows mid-buffer. The switch must not glitch the output
    // into non-finite samples or change the resolved length.
    let sr = 22050;
    let n = sr as usize;
    let schedule = gen_ramp(1.0, 4.0, n);
    let expected = schedule.iter().map(|s| 1.0 / s).sum::<f64>().floor() as usize;

    let out = time_stretch_channel(
        &gen_sine(440.0, sr, n),
        sr,
        &TimeStretchOptions::default().with_stretch_factor(schedule),
    )
    .unwrap();
    assert_eq!(out.len(), expected);
    assert_all_finite(&out, "steep ramp");
}
