//! Peak normalization shared by waveform arrays and spectrogram columns.

/// Scale `values` in place so the largest element becomes 1.0.
///
/// Silence (a maximum of zero) leaves the array at all zeros. Non-finite
/// elements are zeroed first so the result never contains NaN.
pub fn normalize_in_place(values: &mut [f32]) {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }

    let max = values.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        values.iter_mut().for_each(|v| *v = 0.0);
        return;
    }

    for v in values.iter_mut() {
        *v = (*v / max).clamp(0.0, 1.0);
    }
}

/// Owned variant of [`normalize_in_place`].
pub fn normalize(mut values: Vec<f32>) -> Vec<f32> {
    normalize_in_place(&mut values);
    values
}
