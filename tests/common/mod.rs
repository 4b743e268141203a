// Shared signal generators and measurements. Each integration test binary
// compiles this module separately and uses a different subset.
#![allow(dead_code)]

use std::f32::consts::PI;

/// Mono sine wave at unit amplitude.
pub fn gen_sine(freq: f32, sample_rate: u32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Deterministic noise in [-0.5, 0.5] from an xorshift64* generator.
pub fn gen_noise(seed: u64, num_samples: usize) -> Vec<f32> {
    let mut state = seed.max(1);
    (0..num_samples)
        .map(|_| {
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            let bits = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
            (bits >> 40) as f32 / (1u64 << 24) as f32 - 0.5
        })
        .collect()
}

/// Quiet 220 Hz pad with sharp two-sample clicks at the given positions.
pub fn gen_click_pad(sample_rate: u32, num_samples: usize, click_positions: &[usize]) -> Vec<f32> {
    let mut out: Vec<f32> = gen_sine(220.0, sample_rate, num_samples)
        .iter()
        .map(|x| 0.16 * x)
        .collect();
    for &p in click_positions {
        if p < num_samples {
            out[p] += 1.0;
        }
        if p + 1 < num_samples {
            out[p + 1] -= 0.7;
        }
    }
    out
}

/// Evenly spaced schedule values from `from` to `to` inclusive.
pub fn gen_ramp(from: f64, to: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![from];
    }
    (0..n)
        .map(|i| from + (to - from) * i as f64 / (n - 1) as f64)
        .collect()
}

pub fn rms(signal: &[f32]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = signal.iter().map(|&x| x as f64 * x as f64).sum();
    (sum_sq / signal.len() as f64).sqrt()
}

pub fn windowed_rms(signal: &[f32], start: usize, len: usize) -> f64 {
    let start = start.min(signal.len());
    let end = (start + len).min(signal.len());
    if end <= start {
        return 0.0;
    }
    rms(&signal[start..end])
}

/// Dominant frequency estimated from the zero-crossing rate.
pub fn dominant_freq_zcr(signal: &[f32], sample_rate: u32) -> f64 {
    if signal.len() < 4 {
        return 0.0;
    }
    let mut crossings = 0usize;
    for i in 1..signal.len() {
        if (signal[i] >= 0.0) != (signal[i - 1] >= 0.0) {
            crossings += 1;
        }
    }
    let duration = (signal.len() - 1) as f64 / sample_rate as f64;
    crossings as f64 / (2.0 * duration)
}

pub fn assert_all_finite(signal: &[f32], label: &str) {
    for (i, &x) in signal.iter().enumerate() {
        assert!(x.is_finite(), "{label}: non-finite sample {x} at index {i}");
    }
}
