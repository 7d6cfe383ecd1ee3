//! Placeholder images and PNG validation.

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::info;
use uuid::Uuid;

use super::paths::placeholder_path;
use crate::types::{ImageSize, VisualKind};
use crate::{Error, Result};

/// First four bytes of every PNG file.
pub const PNG_SIGNATURE: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

/// Encode the placeholder image for `kind`.
///
/// Waveform: black canvas with a dim centre line. Spectrogram: the darkest
/// colour of the magma ramp.
pub fn render_placeholder(kind: VisualKind, size: ImageSize) -> Result<Vec<u8>> {
    let (width, height) = (size.width.max(1), size.height.max(1));
    let image = match kind {
        VisualKind::Waveform => {
            let mid = height / 2;
            RgbImage::from_fn(width, height, |_, y| {
                if y == mid {
                    Rgb([64, 64, 64])
                } else {
                    Rgb([0, 0, 0])
                }
            })
        }
        VisualKind::Spectrogram => RgbImage::from_pixel(width, height, Rgb([0, 0, 3])),
    };

    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| Error::Placeholder(e.to_string()))?;
    Ok(bytes.into_inner())
}

/// Make sure the placeholder for `kind` exists under `root` and return its path.
///
/// A missing placeholder is written to a temporary file and renamed into
/// place, so readers never see a partial image.
pub async fn ensure_placeholder(root: &Path, kind: VisualKind, size: ImageSize) -> Result<PathBuf> {
    let path = placeholder_path(root, kind);
    if is_png(&path).await {
        return Ok(path);
    }

    let dir = path.parent().unwrap_or(root);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::cache_write(dir, e))?;

    let bytes = render_placeholder(kind, size)?;
    let staging = dir.join(format!(".{}.{}.partial", kind.placeholder_file(), Uuid::new_v4().simple()));
    tokio::fs::write(&staging, &bytes)
        .await
        .map_err(|e| Error::cache_write(&staging, e))?;

    if let Err(e) = tokio::fs::rename(&staging, &path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(Error::cache_write(&path, e));
    }

    info!(kind = %kind, path = %path.display(), "Installed placeholder image");
    Ok(path)
}

/// True when `path` is a readable file starting with the PNG signature.
pub async fn is_png(path: &Path) -> bool {
    let Ok(mut file) = tokio::fs::File::open(path).await else {
        return false;
    };
    let mut header = [0u8; 4];
    match file.read_exact(&mut header).await {
        Ok(_) => header == PNG_SIGNATURE,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_png_of_requested_size() {
        let bytes = render_placeholder(VisualKind::Waveform, ImageSize::new(40, 10)).unwrap();
        assert_eq!(&bytes[..4], &PNG_SIGNATURE);

        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!(decoded.width(), 40);
        assert_eq!(decoded.height(), 10);
    }

    #[tokio::test]
    async fn test_ensure_placeholder_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let size = ImageSize::new(16, 8);

        let first = ensure_placeholder(dir.path(), VisualKind::Spectrogram, size).await.unwrap();
        let bytes = std::fs::read(&first).unwrap();
        let second = ensure_placeholder(dir.path(), VisualKind::Spectrogram, size).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(bytes, std::fs::read(&second).unwrap());
        assert!(first.ends_with("placeholders/error-spectrogram.png"));
    }

    #[tokio::test]
    async fn test_is_png_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("note.png");
        std::fs::write(&text, b"hello").unwrap();
        assert!(!is_png(&text).await);
        assert!(!is_png(&dir.path().join("absent.png")).await);
    }
}
