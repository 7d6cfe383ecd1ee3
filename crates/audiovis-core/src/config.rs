//! Configuration for the transform engine and the image cache.
//!
//! Values come from [`Default`], optionally overlaid by a JSON file and then by
//! `AUDIOVIS_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fft::DEFAULT_FFT_SIZE;
use crate::types::{ImageSize, VisualKind};
use crate::{Error, Result};

/// Environment variable overriding [`CacheConfig::cache_root`].
pub const ENV_CACHE_ROOT: &str = "AUDIOVIS_CACHE_ROOT";

/// Environment variable overriding [`CacheConfig::transcoder`].
pub const ENV_TRANSCODER: &str = "AUDIOVIS_TRANSCODER";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualsConfig {
    /// Image cache settings
    pub cache: CacheConfig,
    /// Transform engine settings
    pub engine: EngineConfig,
}

impl VisualsConfig {
    /// Load a JSON configuration file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: VisualsConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `AUDIOVIS_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(root) = std::env::var_os(ENV_CACHE_ROOT) {
            self.cache.cache_root = PathBuf::from(root);
        }
        if let Ok(program) = std::env::var(ENV_TRANSCODER) {
            if !program.trim().is_empty() {
                self.cache.transcoder = program;
            }
        }
        self
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.engine.validate()
    }
}

/// Image cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `waveforms/`, `spectrograms/` and `placeholders/`
    pub cache_root: PathBuf,
    /// Transcoder executable
    pub transcoder: String,
    /// Rendered waveform size
    pub waveform_size: ImageSize,
    /// Rendered spectrogram size
    pub spectrogram_size: ImageSize,
    /// Kill the transcoder after this many seconds (0 = no limit)
    pub transcoder_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(".cache"),
            transcoder: "ffmpeg".to_string(),
            waveform_size: ImageSize::new(800, 200),
            spectrogram_size: ImageSize::new(800, 200),
            transcoder_timeout_secs: 120,
        }
    }
}

impl CacheConfig {
    /// Default settings rooted at `cache_root`.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Default::default()
        }
    }

    /// Output size for `kind`.
    pub fn size_for(&self, kind: VisualKind) -> ImageSize {
        match kind {
            VisualKind::Waveform => self.waveform_size,
            VisualKind::Spectrogram => self.spectrogram_size,
        }
    }

    /// Transcoder time limit, if any.
    pub fn transcoder_timeout(&self) -> Option<Duration> {
        (self.transcoder_timeout_secs > 0).then(|| Duration::from_secs(self.transcoder_timeout_secs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("cache_root must not be empty".into()));
        }
        if self.transcoder.trim().is_empty() {
            return Err(Error::InvalidConfig("transcoder must not be empty".into()));
        }
        for kind in VisualKind::ALL {
            let size = self.size_for(kind);
            if size.width == 0 || size.height == 0 {
                return Err(Error::InvalidConfig(format!(
                    "{} size must be non-zero, got {}",
                    kind, size
                )));
            }
        }
        Ok(())
    }
}

/// Transform engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker lanes (`None` = available parallelism)
    pub lanes: Option<usize>,
    /// Maximum queued requests before `submit` waits
    pub queue_capacity: usize,
    /// Transform size per spectrogram slice
    pub fft_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lanes: None,
            queue_capacity: 64,
            fft_size: DEFAULT_FFT_SIZE,
        }
    }
}

impl EngineConfig {
    /// Resolved lane count.
    pub fn lane_count(&self) -> usize {
        self.lanes
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lanes == Some(0) {
            return Err(Error::InvalidConfig("lanes must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue_capacity must be at least 1".into()));
        }
        if self.fft_size < 2 || !self.fft_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "fft_size must be a power of two >= 2, got {}",
                self.fft_size
            )));
        }
        Ok(())
    }
}
