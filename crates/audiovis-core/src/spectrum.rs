//! Hearing-range extraction and spectrogram assembly.

use tracing::trace;

use crate::fft::FrequencyTransform;
use crate::normalize::normalize_in_place;
use crate::types::{MAX_FREQUENCY_HZ, MIN_FREQUENCY_HZ};

/// Resample the [20 Hz, 20 kHz] part of a magnitude spectrum to `height` rows.
///
/// `magnitudes` holds `fft_size / 2` bins. Row 0 is the lowest frequency. When
/// no bin falls inside the range the result is all zeros.
pub fn extract_hearing_range(
    magnitudes: &[f32],
    sample_rate: f32,
    fft_size: usize,
    height: usize,
) -> Vec<f32> {
    let mut out = vec![0.0f32; height];
    if magnitudes.is_empty() || height == 0 || fft_size == 0 || sample_rate <= 0.0 {
        return out;
    }

    let bin_width = sample_rate / fft_size as f32;
    let last_bin = magnitudes.len() as i64 - 1;
    let min_bin = ((MIN_FREQUENCY_HZ / bin_width).round() as i64).max(0);
    let max_bin = ((MAX_FREQUENCY_HZ / bin_width).round() as i64).min(last_bin);
    let range_bins = max_bin - min_bin + 1;

    if range_bins <= 0 {
        trace!(sample_rate, fft_size, "no bins inside the hearing range");
        return out;
    }

    let span = (range_bins - 1) as f32;
    for (i, slot) in out.iter_mut().enumerate() {
        let fraction = if height > 1 {
            i as f32 / (height - 1) as f32
        } else {
            0.0
        };
        let pos = min_bin as f32 + fraction * span;
        let lo = (pos.floor() as i64).clamp(min_bin, max_bin);
        let hi = (lo + 1).min(max_bin);
        let t = pos - lo as f32;
        *slot = magnitudes[lo as usize] * (1.0 - t) + magnitudes[hi as usize] * t;
    }

    out
}

/// Compute a `width` × `height` spectrogram, one normalized column per slice.
///
/// Column `x` analyses the transform-sized slice starting at `x * hop`, where
/// `hop = len / width`. Trailing slices may be short or empty.
pub fn spectrogram(
    samples: &[f32],
    sample_rate: f32,
    width: usize,
    height: usize,
    transform: &FrequencyTransform,
) -> Vec<Vec<f32>> {
    let len = samples.len();
    let hop = if width == 0 { 0 } else { len / width };

    (0..width)
        .map(|x| {
            let start = (x * hop).min(len);
            let end = (start + transform.fft_size()).min(len);
            let magnitudes = transform.magnitudes(&samples[start..end]);
            let mut column =
                extract_hearing_range(&magnitudes, sample_rate, transform.fft_size(), height);
            normalize_in_place(&mut column);
            column
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn argmax(values: &[f32]) -> usize {
        values
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_linear_interpolation_between_bins() {
        // bin width 1 Hz: the range spans bins 20..=99 of a 100-bin spectrum
        let magnitudes: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let out = extract_hearing_range(&magnitudes, 200.0, 200, 3);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 20.0).abs() < 1e-4);
        assert!((out[1] - 59.5).abs() < 1e-4);
        assert!((out[2] - 99.0).abs() < 1e-4);
    }

    #[test]
    fn test_pathological_rate_yields_zeros() {
        let magnitudes = vec![1.0; 8];
        let out = extract_hearing_range(&magnitudes, 10.0, 16, 12);
        assert_eq!(out, vec![0.0; 12]);
    }

    #[test]
    fn test_single_row() {
        let magnitudes: Vec<f32> = (0..1024).map(|i| i as f32).collect();
        let out = extract_hearing_range(&magnitudes, 44100.0, 2048, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn test_matrix_shape_and_range() {
        let transform = FrequencyTransform::new(512);
        let samples = sine(440.0, 8000.0, 8000);
        let matrix = spectrogram(&samples, 8000.0, 37, 23, &transform);
        assert_eq!(matrix.len(), 37);
        for column in &matrix {
            assert_eq!(column.len(), 23);
            assert!(column.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_peak_row_rises_with_frequency() {
        let transform = FrequencyTransform::new(2048);
        let rows: Vec<usize> = [200.0, 1000.0, 5000.0, 15000.0]
            .iter()
            .map(|&f| {
                let samples = sine(f, 44100.0, 4096);
                let matrix = spectrogram(&samples, 44100.0, 1, 200, &transform);
                argmax(&matrix[0])
            })
            .collect();
        assert!(rows.windows(2).all(|w| w[0] < w[1]), "rows: {:?}", rows);
    }

    #[test]
    fn test_short_buffer_gives_zero_columns_not_panics() {
        let transform = FrequencyTransform::new(256);
        let matrix = spectrogram(&[0.5; 3], 44100.0, 10, 8, &transform);
        assert_eq!(matrix.len(), 10);
        assert!(matrix.iter().all(|c| c.len() == 8));
    }
}
