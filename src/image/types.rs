//! Core image types shared by the encoder, the scene client and the watermark.

use crate::error::Result;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default file name offered for the finished image.
pub const DEFAULT_DOWNLOAD_NAME: &str = "hinh-anh-dap-xe.png";

/// Image formats accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// An encoded image ready to be sent to the scene service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    data: Vec<u8>,
    mime_type: String,
}

impl ImageInput {
    /// Wraps raw image bytes with their MIME type.
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Raw image bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// MIME type, e.g. `image/png`.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Encodes the bytes as standard base64 for the wire.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// Raw image returned by the scene service, before watermarking.
#[derive(Debug, Clone)]
#[must_use = "generated image should be watermarked or saved"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type reported by the service.
    pub mime_type: String,
    /// Model that produced the image.
    pub model: Option<String>,
    /// Round-trip time of the request in milliseconds.
    pub duration_ms: Option<u64>,
}

impl GeneratedImage {
    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Final PNG with the caption applied.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "watermarked image should be saved or displayed"]
pub struct WatermarkedImage {
    /// PNG-encoded bytes.
    pub png: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl WatermarkedImage {
    /// Returns the size of the PNG data in bytes.
    pub fn size(&self) -> usize {
        self.png.len()
    }

    /// Saves the PNG to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.png)?;
        Ok(())
    }

    /// Returns the image as a self-contained `data:image/png` URI.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.png)
        )
    }
}
