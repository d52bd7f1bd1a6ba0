//! Synthetic speech-like audio shared by the integration tests.
#![allow(dead_code)]

use std::f32::consts::PI;

pub const SR: u32 = 16_000;
pub const FRAME: usize = 512;

/// Per-syllable pitch and two formant centers (Hz).
const SYLLABLES: [(f32, f32, f32); 4] = [
    (140.0, 700.0, 1_200.0),
    (180.0, 400.0, 2_300.0),
    (120.0, 550.0, 900.0),
    (220.0, 300.0, 2_800.0),
];

/// Four vowel-like syllables: harmonic series up to 7.8 kHz shaped by two
/// formants, under an envelope that never drops to silence.
pub fn phrase(secs: f32, gain: f32) -> Vec<i16> {
    let n = (SR as f32 * secs) as usize;
    let syl_len = n.div_ceil(SYLLABLES.len()).max(1);
    (0..n)
        .map(|i| {
            let (f0, f1, f2) = SYLLABLES[(i / syl_len).min(SYLLABLES.len() - 1)];
            let local = (i % syl_len) as f32 / syl_len as f32;
            let env = 0.3 + 0.7 * (PI * local).sin();
            let t = i as f32 / SR as f32;

            let (mut acc, mut norm) = (0.0f32, 0.0f32);
            let mut k = 1.0f32;
            while k * f0 < 7_800.0 {
                let f = k * f0;
                let w = 0.05
                    + (-((f - f1) / 150.0).powi(2)).exp()
                    + 0.6 * (-((f - f2) / 250.0).powi(2)).exp();
                acc += w * (2.0 * PI * f * t).sin();
                norm += w;
                k += 1.0;
            }
            (gain * env * acc / norm * 32_767.0 * 3.0).clamp(-32_768.0, 32_767.0) as i16
        })
        .collect()
}

pub fn silence(secs: f32) -> Vec<i16> {
    vec![0; (SR as f32 * secs) as usize]
}

/// `lead` seconds of silence, `body`, then `tail` seconds of silence.
pub fn padded(lead: f32, body: &[i16], tail: f32) -> Vec<i16> {
    let mut out = silence(lead);
    out.extend_from_slice(body);
    out.extend(silence(tail));
    out
}
