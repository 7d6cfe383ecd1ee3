//! Windowed frequency transform over a single block of samples.
//!
//! Each call transforms one slice: a Hann window spanning the slice is applied,
//! the slice is zero-padded to the transform size, and the positive half of the
//! spectrum is returned as magnitudes scaled by the slice length.

use std::sync::Arc;
use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Default transform size (samples per analysis slice).
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Magnitude-spectrum transform of fixed size.
#[derive(Clone)]
pub struct FrequencyTransform {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl FrequencyTransform {
    /// Plan a forward transform of `fft_size` points.
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self { fft_size, fft }
    }

    /// Transform size `F`.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins produced per slice (`F / 2`).
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Width of one bin in Hz for the given sample rate.
    pub fn bin_width(&self, sample_rate: f32) -> f32 {
        sample_rate / self.fft_size as f32
    }

    /// Magnitude spectrum of `slice`.
    ///
    /// Slices longer than the transform size are truncated; an empty slice
    /// yields all zeros.
    pub fn magnitudes(&self, slice: &[f32]) -> Vec<f32> {
        let n = slice.len().min(self.fft_size);
        if n == 0 {
            return vec![0.0; self.bin_count()];
        }

        let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.fft_size];
        for (j, (&s, slot)) in slice[..n].iter().zip(buffer.iter_mut()).enumerate() {
            *slot = Complex::new(s * hann(j, n), 0.0);
        }

        self.fft.process(&mut buffer);

        buffer[..self.bin_count()]
            .iter()
            .map(|c| (c.re * c.re + c.im * c.im).sqrt() / n as f32)
            .collect()
    }
}

impl Default for FrequencyTransform {
    fn default() -> Self {
        Self::new(DEFAULT_FFT_SIZE)
    }
}

impl std::fmt::Debug for FrequencyTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyTransform")
            .field("fft_size", &self.fft_size)
            .finish()
    }
}

/// Hann coefficient for sample `j` of a slice of length `len`.
fn hann(j: usize, len: usize) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * j as f32 / len as f32).cos())
}
