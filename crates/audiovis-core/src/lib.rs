//! audiovis core - waveform and spectrogram generation.
//!
//! Two engines turn audio into display-ready data:
//!
//! - **Transform engine**: computes a normalized waveform envelope and a
//!   hearing-range (20 Hz – 20 kHz) spectrogram directly from decoded samples,
//!   on a pool of worker lanes fed by a bounded queue.
//! - **Visualization cache**: renders waveform/spectrogram PNGs for audio files
//!   with ffmpeg, stores them under a deterministic cache path, and falls back
//!   to a shared placeholder image when rendering fails.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ Sample Buffer│──▶│ Transform Engine │──▶│ waveform / matrix│
//! └──────────────┘   │  (queue + lanes) │   └──────────────────┘
//!                    └────────┬─────────┘
//!                 ┌───────────┼────────────┐
//!                 ▼           ▼            ▼
//!            ┌────────┐  ┌─────────┐  ┌──────────┐
//!            │  FFT   │  │Spectrum │  │ Waveform │
//!            └────────┘  └─────────┘  └──────────┘
//!
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │  Audio file  │──▶│ Visualization    │──▶│ <root>/<kind>s/  │
//! └──────────────┘   │ Cache (ffmpeg)   │   │   <key>.png      │
//!                    └────────┬─────────┘   └──────────────────┘
//!                             │ failure
//!                             ▼
//!                    <root>/placeholders/error-<kind>.png
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use audiovis_core::{
//!     CacheConfig, EngineConfig, TransformEngine, TransformRequest,
//!     VisualKind, VisualizationCache,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> audiovis_core::Result<()> {
//!     let cache = VisualizationCache::new(CacheConfig::new("/var/cache/audiovis"));
//!     let image = cache
//!         .generate(Path::new("/music/a/b.flac"), "a/b.flac", VisualKind::Spectrogram)
//!         .await?;
//!     println!("{} (cached: {})", image.image_path.display(), image.cached);
//!
//!     let engine = TransformEngine::start(&EngineConfig::default());
//!     let samples = vec![0.0f32; 44100];
//!     let response = engine
//!         .transform(TransformRequest::waveform("r1", samples, 800, 44100.0))
//!         .await?;
//!     println!("success: {}", response.is_success());
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod audio;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fft;
pub mod normalize;
pub mod protocol;
pub mod spectrum;
pub mod transcoder;
pub mod types;
pub mod waveform;

pub use cache::VisualizationCache;
pub use config::{CacheConfig, EngineConfig, VisualsConfig};
pub use engine::TransformEngine;
pub use error::{Error, Result};
pub use fft::FrequencyTransform;
pub use protocol::{TransformKind, TransformProcessor, TransformRequest, TransformResponse};
pub use transcoder::{FfmpegTranscoder, RenderJob, TranscodeOutcome, Transcoder};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
