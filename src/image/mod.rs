//! Image payloads, input encoding and the watermark compositor.

mod encoder;
mod types;
pub mod watermark;

pub use encoder::{ImageEncoder, SelectedImage};
pub use types::{GeneratedImage, ImageFormat, ImageInput, WatermarkedImage, DEFAULT_DOWNLOAD_NAME};
pub use watermark::{WatermarkStyle, Watermarker, WatermarkerBuilder};
