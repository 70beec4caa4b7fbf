//! Audio resampling and channel mixing utilities.
//!
//! The Whisper STT engine requires **16 kHz mono `f32`** audio.  This module
//! provides the two conversion steps the capture forwarder applies to every
//! chunk before it reaches the controller:
//!
//! 1. [`stereo_to_mono`] — downmix any number of interleaved channels to mono.
//! 2. [`resample_to_16k`] — resample from any source rate to 16 000 Hz using
//!    linear interpolation (plenty for speech; the VAD and Whisper are both
//!    tolerant of the interpolation error).

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec` with no
///   averaging (fast path — avoids an extra allocation when already mono).
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use push_to_type::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.0).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_to_16k
// ---------------------------------------------------------------------------

/// Resample `samples` from `source_rate` Hz to 16 000 Hz using linear
/// interpolation.
///
/// * If `source_rate` is already `16_000` the input is cloned and returned
///   unchanged (no-op fast path — no interpolation performed).
/// * If `samples` is empty an empty vector is returned.
///
/// The output length is approximately
/// `samples.len() * 16_000 / source_rate`.
///
/// # Example
///
/// ```rust
/// use push_to_type::audio::resample_to_16k;
///
/// // Downsample from 48 kHz to 16 kHz (ratio = 1/3)
/// let hi = vec![0.5_f32; 480];
/// let lo = resample_to_16k(&hi, 48_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    const TARGET_RATE: u32 = 16_000;

    if source_rate == TARGET_RATE {
        return samples.to_vec();
    }

    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = TARGET_RATE as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            // Linear interpolation between adjacent samples
            samples[idx] * (1.0 - frac as f32) + samples[idx + 1] * frac as f32
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
