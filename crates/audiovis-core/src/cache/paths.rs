//! Cache path derivation.
//!
//! ```text
//! <root>/waveforms/<flattened>.png
//! <root>/spectrograms/<flattened>.png
//! <root>/placeholders/error-waveform.png
//! <root>/placeholders/error-spectrogram.png
//! ```
//!
//! `flattened` is the relative path with every separator replaced by `_`.
//! Two relative paths that differ only in `/` vs `_` share an entry.

use std::path::{Path, PathBuf};

use crate::types::VisualKind;

/// Directory under the cache root holding placeholder images.
pub const PLACEHOLDER_DIR: &str = "placeholders";

/// Flatten a relative path into a single file name.
pub fn flatten_key(relative: &str) -> String {
    relative.replace(['/', '\\'], "_")
}

/// Cache entry path for `(relative, kind)` under `root`.
pub fn cache_path(root: &Path, relative: &str, kind: VisualKind) -> PathBuf {
    root.join(kind.cache_dir())
        .join(format!("{}.png", flatten_key(relative)))
}

/// Placeholder image path for `kind` under `root`.
pub fn placeholder_path(root: &Path, kind: VisualKind) -> PathBuf {
    root.join(PLACEHOLDER_DIR).join(kind.placeholder_file())
}
