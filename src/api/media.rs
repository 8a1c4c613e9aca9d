//! Storage for uploaded profile pictures.
//!
//! Files land under `<media root>/profile_pics/<ulid>.<ext>`; the database only
//! keeps the path relative to the media root, which is also the path the
//! `/media` route serves it under.

use anyhow::{anyhow, Context, Result};
use axum::body::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;
use ulid::Ulid;

const PROFILE_PICS_DIR: &str = "profile_pics";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    /// Identify an image by its leading magic bytes.
    pub(crate) fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub(crate) fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// A file part received with a registration form.
#[derive(Clone)]
pub(crate) struct UploadedImage {
    pub(crate) file_name: Option<String>,
    pub(crate) bytes: Bytes,
}

impl std::fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedImage")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Write a profile picture and return its path relative to the media root.
    pub(crate) async fn save_profile_pic(&self, kind: ImageKind, bytes: &[u8]) -> Result<String> {
        let dir = self.root.join(PROFILE_PICS_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create media directory {}", dir.display()))?;

        let relative = format!("{PROFILE_PICS_DIR}/{}.{}", Ulid::new(), kind.extension());
        let path = self.root.join(&relative);
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        debug!("stored profile picture at {}", path.display());

        Ok(relative)
    }

    /// Delete a previously stored file; a missing file is not an error.
    pub(crate) async fn remove(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(anyhow!(
                "media path escapes the media root: {}",
                relative.display()
            ));
        }
        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("authly-media-{}", Ulid::new()))
    }

    #[test]
    fn sniff_known_formats() {
        assert_eq!(ImageKind::sniff(PNG), Some(ImageKind::Png));
        assert_eq!(
            ImageKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            Some(ImageKind::Jpeg)
        );
        assert_eq!(ImageKind::sniff(b"GIF89a...."), Some(ImageKind::Gif));
        assert_eq!(
            ImageKind::sniff(b"RIFF\x24\0\0\0WEBPVP8 "),
            Some(ImageKind::Webp)
        );
    }

    #[test]
    fn sniff_rejects_other_content() {
        assert_eq!(ImageKind::sniff(b""), None);
        assert_eq!(ImageKind::sniff(b"hello world"), None);
        assert_eq!(ImageKind::sniff(b"RIFF\0\0\0\0WAVE"), None);
    }

    #[tokio::test]
    async fn save_and_remove_profile_pic() -> Result<()> {
        let root = temp_root();
        let store = MediaStore::new(root.clone());

        let relative = store.save_profile_pic(ImageKind::Png, PNG).await?;
        assert!(relative.starts_with("profile_pics/"));
        assert!(relative.ends_with(".png"));
        assert_eq!(fs::read(root.join(&relative)).await?, PNG);

        store.remove(&relative).await?;
        assert!(!root.join(&relative).exists());

        // Removing twice is fine.
        store.remove(&relative).await?;

        fs::remove_dir_all(&root).await?;
        Ok(())
    }

    #[tokio::test]
    async fn remove_refuses_paths_outside_root() {
        let store = MediaStore::new(temp_root());
        assert!(store.remove("../etc/passwd").await.is_err());
        assert!(store.remove("/etc/passwd").await.is_err());
    }
}
