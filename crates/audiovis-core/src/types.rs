//! Core types shared by the transform engine and the image cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lower edge of the displayed frequency range in Hz.
pub const MIN_FREQUENCY_HZ: f32 = 20.0;

/// Upper edge of the displayed frequency range in Hz.
pub const MAX_FREQUENCY_HZ: f32 = 20_000.0;

/// Decoded mono audio.
#[derive(Debug, Clone)]
pub struct AudioData {
    /// PCM samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration_secs: f64,
}

impl AudioData {
    /// Create new audio data from samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_secs = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };
        Self {
            samples,
            sample_rate,
            duration_secs,
        }
    }

    /// Get number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if audio data is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The two persisted visualization kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualKind {
    /// Amplitude envelope over time
    Waveform,
    /// Energy across frequency (rows) and time (columns)
    Spectrogram,
}

impl VisualKind {
    /// All kinds, in a stable order.
    pub const ALL: [VisualKind; 2] = [VisualKind::Waveform, VisualKind::Spectrogram];

    /// Lowercase name used on the wire and in file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualKind::Waveform => "waveform",
            VisualKind::Spectrogram => "spectrogram",
        }
    }

    /// Cache subdirectory holding entries of this kind.
    pub fn cache_dir(&self) -> &'static str {
        match self {
            VisualKind::Waveform => "waveforms",
            VisualKind::Spectrogram => "spectrograms",
        }
    }

    /// File name of the placeholder installed when generation fails.
    pub fn placeholder_file(&self) -> &'static str {
        match self {
            VisualKind::Waveform => "error-waveform.png",
            VisualKind::Spectrogram => "error-spectrogram.png",
        }
    }
}

impl fmt::Display for VisualKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for VisualKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waveform" => Ok(VisualKind::Waveform),
            "spectrogram" => Ok(VisualKind::Spectrogram),
            other => Err(format!("unknown visualization kind: {}", other)),
        }
    }
}

/// Which cache entries a clear operation removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearTarget {
    Waveform,
    Spectrogram,
    Both,
}

impl ClearTarget {
    /// Kinds covered by this target.
    pub fn kinds(&self) -> &'static [VisualKind] {
        match self {
            ClearTarget::Waveform => &[VisualKind::Waveform],
            ClearTarget::Spectrogram => &[VisualKind::Spectrogram],
            ClearTarget::Both => &VisualKind::ALL,
        }
    }
}

impl From<VisualKind> for ClearTarget {
    fn from(kind: VisualKind) -> Self {
        match kind {
            VisualKind::Waveform => ClearTarget::Waveform,
            VisualKind::Spectrogram => ClearTarget::Spectrogram,
        }
    }
}

impl FromStr for ClearTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "both" => Ok(ClearTarget::Both),
            other => other.parse::<VisualKind>().map(ClearTarget::from),
        }
    }
}

/// Output dimensions of a rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Outcome of a cache generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Path of the cache entry holding the image
    pub image_path: PathBuf,
    /// True when the entry already existed and no transcoder ran
    pub cached: bool,
    /// True when generation failed and the placeholder was installed
    pub placeholder: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(VisualKind::Waveform.cache_dir(), "waveforms");
        assert_eq!(VisualKind::Spectrogram.cache_dir(), "spectrograms");
        assert_eq!(
            VisualKind::Spectrogram.placeholder_file(),
            "error-spectrogram.png"
        );
        assert_eq!("Waveform".parse::<VisualKind>(), Ok(VisualKind::Waveform));
        assert!("sonogram".parse::<VisualKind>().is_err());
    }

    #[test]
    fn test_clear_target_kinds() {
        assert_eq!(ClearTarget::Both.kinds().len(), 2);
        assert_eq!(
            "spectrogram".parse::<ClearTarget>(),
            Ok(ClearTarget::Spectrogram)
        );
        assert_eq!("both".parse::<ClearTarget>(), Ok(ClearTarget::Both));
    }

    #[test]
    fn test_audio_duration() {
        let audio = AudioData::new(vec![0.0; 22050], 44100);
        assert_eq!(audio.len(), 22050);
        assert!((audio.duration_secs - 0.5).abs() < 1e-9);
        assert!(AudioData::new(Vec::new(), 0).is_empty());
    }
}
