//! Visualization cache service.
//!
//! `generate` looks up the cache entry for `(relative path, kind)`; on a miss
//! it runs the transcoder once, into a temporary file next to the entry, and
//! renames that file into place. When the transcoder fails the placeholder is
//! hard-linked into the entry instead, so the caller always gets an image.
//! Concurrent calls for the same entry are serialized on a per-entry lock, so
//! the transcoder runs once and later callers see a cache hit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::paths::cache_path;
use super::placeholder::{ensure_placeholder, is_png};
use crate::config::CacheConfig;
use crate::transcoder::{FfmpegTranscoder, RenderJob, Transcoder};
use crate::types::{ClearTarget, GeneratedImage, VisualKind};
use crate::{Error, Result};

/// Cache of rendered waveform and spectrogram images.
#[derive(Clone)]
pub struct VisualizationCache {
    config: CacheConfig,
    transcoder: Arc<dyn Transcoder>,
    in_flight: Arc<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl VisualizationCache {
    /// Cache driving the configured ffmpeg executable.
    pub fn new(config: CacheConfig) -> Self {
        let transcoder = FfmpegTranscoder::new(config.transcoder.clone())
            .with_timeout(config.transcoder_timeout());
        Self::with_transcoder(config, Arc::new(transcoder))
    }

    /// Cache driving a custom transcoder.
    pub fn with_transcoder(config: CacheConfig, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            config,
            transcoder,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cache entry path for `(relative, kind)`. No IO.
    pub fn cached_path(&self, relative: &str, kind: VisualKind) -> PathBuf {
        cache_path(&self.config.cache_root, relative, kind)
    }

    /// Return the cached image for `(relative, kind)`, rendering it from
    /// `source` on a miss.
    ///
    /// Transcoder failures are absorbed: the placeholder is installed and the
    /// result has `placeholder = true`. A `source` that does not exist is
    /// reported as [`Error::SourceNotFound`].
    #[instrument(skip_all, fields(key = relative, kind = %kind))]
    pub async fn generate(
        &self,
        source: &Path,
        relative: &str,
        kind: VisualKind,
    ) -> Result<GeneratedImage> {
        let entry = self.cached_path(relative, kind);
        if let Some(hit) = cache_hit(&entry).await {
            return Ok(hit);
        }

        let entry_lock = self.entry_lock(&entry).await;
        let result = {
            let _guard = entry_lock.lock().await;
            match cache_hit(&entry).await {
                Some(hit) => Ok(hit),
                None => self.render_entry(source, entry.clone(), kind).await,
            }
        };
        self.release_entry_lock(&entry, entry_lock).await;
        result
    }

    /// Render `source` into `entry`, falling back to the placeholder.
    async fn render_entry(
        &self,
        source: &Path,
        entry: PathBuf,
        kind: VisualKind,
    ) -> Result<GeneratedImage> {
        match tokio::fs::metadata(source).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SourceNotFound {
                    path: source.to_path_buf(),
                });
            }
            // unreadable sources still go to the transcoder, which fails and
            // leaves the placeholder
            _ => {}
        }

        let dir = entry.parent().unwrap_or(&self.config.cache_root).to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::cache_write(&dir, e))?;

        let staging = staging_path(&entry, "partial");
        let job = RenderJob {
            input: source.to_path_buf(),
            output: staging.clone(),
            kind,
            size: self.config.size_for(kind),
        };

        info!(source = %source.display(), "Rendering {}", kind);
        let outcome = match self.transcoder.render(&job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e);
            }
        };

        if outcome.success && is_png(&staging).await {
            publish(&staging, &entry).await?;
            info!(path = %entry.display(), "Cached {}", kind);
            return Ok(GeneratedImage {
                image_path: entry,
                cached: false,
                placeholder: false,
            });
        }

        let _ = tokio::fs::remove_file(&staging).await;
        warn!(
            source = %source.display(),
            exit_code = ?outcome.exit_code,
            timed_out = outcome.timed_out,
            diagnostics = %outcome.diagnostics,
            "Transcoder failed, installing placeholder"
        );

        self.install_placeholder(&entry, kind).await?;
        Ok(GeneratedImage {
            image_path: entry,
            cached: false,
            placeholder: true,
        })
    }

    /// Drop the entry for `(relative, kind)` and generate it again.
    pub async fn regenerate(
        &self,
        source: &Path,
        relative: &str,
        kind: VisualKind,
    ) -> Result<GeneratedImage> {
        self.clear_cache(relative, kind.into()).await?;
        self.generate(source, relative, kind).await
    }

    /// Delete the entries selected by `target`. Absent entries are ignored.
    #[instrument(skip_all, fields(key = relative, target = ?target))]
    pub async fn clear_cache(&self, relative: &str, target: ClearTarget) -> Result<()> {
        for &kind in target.kinds() {
            let entry = self.cached_path(relative, kind);
            match tokio::fs::remove_file(&entry).await {
                Ok(()) => info!(path = %entry.display(), "Cleared {}", kind),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %entry.display(), "Nothing to clear")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Lock serializing generation of `entry`.
    async fn entry_lock(&self, entry: &Path) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        in_flight.entry(entry.to_path_buf()).or_default().clone()
    }

    /// Forget the lock for `entry` once no other caller holds it.
    async fn release_entry_lock(&self, entry: &Path, lock: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        // the map and `lock` are the only remaining references
        if Arc::strong_count(&lock) == 2 {
            in_flight.remove(entry);
        }
    }

    /// Point `entry` at the shared placeholder for `kind`.
    async fn install_placeholder(&self, entry: &Path, kind: VisualKind) -> Result<()> {
        let placeholder =
            ensure_placeholder(&self.config.cache_root, kind, self.config.size_for(kind)).await?;

        let staging = staging_path(entry, "link");
        if let Err(e) = tokio::fs::hard_link(&placeholder, &staging).await {
            debug!(error = %e, "Hard link unavailable, copying placeholder");
            tokio::fs::copy(&placeholder, &staging)
                .await
                .map_err(|e| Error::cache_write(&staging, e))?;
        }

        publish(&staging, entry).await
    }
}

impl std::fmt::Debug for VisualizationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualizationCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn cache_hit(entry: &Path) -> Option<GeneratedImage> {
    if !tokio::fs::try_exists(entry).await.unwrap_or(false) {
        return None;
    }
    debug!(path = %entry.display(), "Cache hit");
    Some(GeneratedImage {
        image_path: entry.to_path_buf(),
        cached: true,
        placeholder: false,
    })
}

/// Hidden sibling of `entry` used to stage a write.
fn staging_path(entry: &Path, tag: &str) -> PathBuf {
    let name = entry
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    entry.with_file_name(format!(".{}.{}.{}.png", name, Uuid::new_v4().simple(), tag))
}

/// Atomically move a finished file over the cache entry.
async fn publish(staging: &Path, entry: &Path) -> Result<()> {
    if let Err(e) = tokio::fs::rename(staging, entry).await {
        let _ = tokio::fs::remove_file(staging).await;
        return Err(Error::cache_write(entry, e));
    }
    Ok(())
}
