//! Converts selected image files into payloads for the scene service.

use crate::error::{Result, SceneError};
use crate::image::types::{ImageFormat, ImageInput};
use std::path::{Path, PathBuf};

/// An image the user picked, not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedImage {
    /// A file on disk, read when the attempt starts.
    File(PathBuf),
    /// Bytes already in memory.
    Memory(ImageInput),
}

impl SelectedImage {
    /// Selects a file, applying the `image/*` acceptance check.
    pub fn file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !ImageEncoder::accepts(&path) {
            return Err(SceneError::UnsupportedFile(path.display().to_string()));
        }
        Ok(Self::File(path))
    }

    /// Selects in-memory bytes whose MIME type must start with `image/`.
    pub fn memory(data: Vec<u8>, mime_type: impl Into<String>) -> Result<Self> {
        let mime_type = mime_type.into();
        if !ImageEncoder::is_image_mime(&mime_type) {
            return Err(SceneError::UnsupportedFile(mime_type));
        }
        Ok(Self::Memory(ImageInput::new(data, mime_type)))
    }

    /// Short label for logs.
    pub fn label(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Memory(input) => format!("<{} bytes {}>", input.data().len(), input.mime_type()),
        }
    }
}

/// Reads selections into [`ImageInput`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageEncoder;

impl ImageEncoder {
    /// Returns true for MIME types in the `image/` family.
    pub fn is_image_mime(mime_type: &str) -> bool {
        mime_type.trim().to_ascii_lowercase().starts_with("image/")
    }

    /// Returns true if the path has an extension of an accepted image format.
    pub fn accepts(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .is_some()
    }

    /// Reads the selection and produces its payload.
    ///
    /// The MIME type comes from the file's magic bytes, falling back to its
    /// extension. An empty payload is an error.
    pub async fn encode(&self, selection: &SelectedImage) -> Result<ImageInput> {
        match selection {
            SelectedImage::File(path) => self.encode_file(path).await,
            SelectedImage::Memory(input) => {
                if input.data().is_empty() {
                    return Err(SceneError::EmptyImage(selection.label()));
                }
                Ok(input.clone())
            }
        }
    }

    async fn encode_file(&self, path: &Path) -> Result<ImageInput> {
        let data = tokio::fs::read(path).await?;
        if data.is_empty() {
            return Err(SceneError::EmptyImage(path.display().to_string()));
        }

        let format = ImageFormat::from_magic_bytes(&data)
            .or_else(|| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .and_then(ImageFormat::from_extension)
            })
            .ok_or_else(|| SceneError::UnsupportedFile(path.display().to_string()))?;

        tracing::debug!(path = %path.display(), bytes = data.len(), mime = format.mime_type(), "encoded image");
        Ok(ImageInput::new(data, format.mime_type()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_is_image_mime() {
        assert!(ImageEncoder::is_image_mime("image/png"));
        assert!(ImageEncoder::is_image_mime("Image/WEBP"));
        assert!(!ImageEncoder::is_image_mime("application/pdf"));
        assert!(!ImageEncoder::is_image_mime(""));
    }

    #[test]
    fn test_selection_rejects_non_images() {
        assert!(SelectedImage::file("notes.txt").is_err());
        assert!(SelectedImage::file("rider.JPG").is_ok());
        assert!(SelectedImage::memory(vec![1], "text/plain").is_err());
    }

    #[tokio::test]
    async fn test_encode_file_detects_mime_from_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        // A PNG payload behind a .jpg name: the bytes win.
        let path = dir.path().join("rider.jpg");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let input = ImageEncoder
            .encode(&SelectedImage::file(&path).unwrap())
            .await
            .unwrap();
        assert_eq!(input.mime_type(), "image/png");
        assert_eq!(input.data(), &PNG_HEADER);
    }

    #[tokio::test]
    async fn test_encode_file_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.webp");
        std::fs::write(&path, b"not really webp").unwrap();

        let input = ImageEncoder
            .encode(&SelectedImage::file(&path).unwrap())
            .await
            .unwrap();
        assert_eq!(input.mime_type(), "image/webp");
    }

    #[tokio::test]
    async fn test_encode_empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        std::fs::write(&path, b"").unwrap();

        let err = ImageEncoder
            .encode(&SelectedImage::file(&path).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SceneError::EmptyImage(_)));
    }

    #[tokio::test]
    async fn test_encode_missing_file_fails() {
        let err = ImageEncoder
            .encode(&SelectedImage::File(PathBuf::from("/definitely/not/here.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, SceneError::Io(_)));
    }
}
