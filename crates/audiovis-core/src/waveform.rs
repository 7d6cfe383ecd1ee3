//! Blockwise RMS reduction of a sample buffer to a fixed-width envelope.

use crate::normalize::normalize_in_place;

/// Reduce `samples` to `width` RMS values and peak-normalize them.
///
/// The buffer is split into `width` blocks of `len / width` samples; any
/// remainder past the last block is dropped. Buffers shorter than `width` use
/// one-sample blocks, and positions past the end of the buffer read as zero.
pub fn waveform(samples: &[f32], width: usize) -> Vec<f32> {
    let mut envelope = rms_blocks(samples, width);
    normalize_in_place(&mut envelope);
    envelope
}

/// Raw (unnormalized) RMS per block.
pub fn rms_blocks(samples: &[f32], width: usize) -> Vec<f32> {
    if width == 0 {
        return Vec::new();
    }

    let block_size = (samples.len() / width).max(1);
    let mut blocks: Vec<f32> = samples
        .chunks_exact(block_size)
        .take(width)
        .map(|block| {
            let sum_sq: f32 = block.iter().map(|&s| s * s).sum();
            (sum_sq / block_size as f32).sqrt()
        })
        .collect();

    blocks.resize(width, 0.0);
    blocks
}
