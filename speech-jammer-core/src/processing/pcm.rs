//! Conversions between 16-bit PCM and normalized float samples, plus level
//! metering. Scale factor is `i16::MAX` (32767) in both directions.

const SCALE: f32 = i16::MAX as f32;

/// 16-bit sample to float in `[-1.0, 1.0]` (`i16::MIN` maps slightly below -1.0).
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / SCALE
}

/// Float to 16-bit sample. Clamps to `[-1.0, 1.0]` and rounds to nearest,
/// so `f32_to_i16(i16_to_f32(s)) == s` for every `s > i16::MIN`.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * SCALE).round() as i16
}

/// Convert a batch of 16-bit samples into `output` (min of both lengths).
pub fn decode_i16(input: &[i16], output: &mut [f32]) {
    for (out, &s) in output.iter_mut().zip(input) {
        *out = i16_to_f32(s);
    }
}

/// Convert a batch of float samples into `output` (min of both lengths).
pub fn encode_i16(input: &[f32], output: &mut [i16]) {
    for (out, &s) in output.iter_mut().zip(input) {
        *out = f32_to_i16(s);
    }
}

/// Append the little-endian byte form of `samples` to `out`.
///
/// Output grows by `samples.len() * 2` bytes.
pub fn extend_le_bytes(samples: &[i16], out: &mut Vec<u8>) {
    out.reserve(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

/// Compute RMS level of samples (0.0–1.0 range for normalized audio).
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Compute peak absolute level of samples.
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}
