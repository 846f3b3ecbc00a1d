//! Float to signed 16-bit little-endian PCM.

pub const PCM_FULL_SCALE: f32 = 32_767.0;

/// Clamp to [-1, 1] first so out-of-range input saturates instead of wrapping.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    if !sample.is_finite() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * PCM_FULL_SCALE).round() as i16
}

/// Append the PCM encoding of `samples` to `out`.
pub fn encode_pcm16(samples: &[f32], out: &mut Vec<u8>) {
    out.reserve(samples.len() * 2);
    for &sample in samples {
        out.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }
}

/// Inverse of [`encode_pcm16`]; a trailing odd byte is ignored.
pub fn decode_pcm16(frame: &[u8]) -> Vec<f32> {
    frame
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM_FULL_SCALE)
        .collect()
}
