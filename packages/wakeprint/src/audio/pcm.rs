//! Sample-format helpers.

use wakeprint_vad::I16_SCALE;

/// int16 PCM → float in `[-1, 1)`.
pub fn pcm_to_f32(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| s as f32 / I16_SCALE).collect()
}

/// float → int16, clipped to the representable range.
#[inline]
pub fn f32_to_i16(s: f32) -> i16 {
    (s * I16_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Root-mean-square level of int16 PCM on a full-scale-1.0 axis.
///
/// `0.0` for an empty slice.
pub fn rms(pcm: &[i16]) -> f32 {
    if pcm.is_empty() {
        return 0.0;
    }
    let sum: f64 = pcm
        .iter()
        .map(|&s| {
            let x = s as f64 / I16_SCALE as f64;
            x * x
        })
        .sum();
    (sum / pcm.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rms_of_square_wave_is_its_amplitude() {
        let pcm: Vec<i16> = (0..1_000)
            .map(|i| if i % 2 == 0 { 16_384 } else { -16_384 })
            .collect();
        assert_abs_diff_eq!(rms(&pcm), 0.5, epsilon = 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn conversion_clips() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), i16::MIN);
        assert_eq!(pcm_to_f32(&[-32_768])[0], -1.0);
    }
}
