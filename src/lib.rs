#![warn(missing_docs)]
//! pedalscene - put a rider (and their bicycle) into a new scene.
//!
//! A character photo, an optional bicycle photo and either a scene
//! description or a scene photo are sent to Gemini, which composites the
//! subject into the scene. The returned image gets a caption watermark and is
//! re-encoded as PNG.
//!
//! # Quick Start
//!
//! ```no_run
//! use pedalscene::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> pedalscene::Result<()> {
//!     let settings = SettingsStore::open("settings.json")?;
//!     let controller = SceneController::new(
//!         GeminiSceneClient::builder().build()?,
//!         Watermarker::new()?,
//!         settings,
//!     );
//!
//!     controller.select_character_image(Some(SelectedImage::file("rider.jpg")?));
//!     controller.set_scene_text("sunset beach");
//!
//!     match controller.generate().await {
//!         Outcome::Done(image) => image.save(DEFAULT_DOWNLOAD_NAME)?,
//!         other => eprintln!("{other:?}"),
//!     }
//!     Ok(())
//! }
//! ```

mod error;

pub mod controller;
pub mod image;
pub mod messages;
pub mod scene;
pub mod settings;

// Re-export error types at crate root
pub use error::{Result, SceneError};

pub use controller::{GenerationState, Outcome, Phase, SceneController, SceneForm};
pub use self::image::{
    GeneratedImage, ImageEncoder, ImageInput, SelectedImage, WatermarkedImage, Watermarker,
    DEFAULT_DOWNLOAD_NAME,
};
pub use messages::{Locale, UserMessage};
pub use scene::providers::{GeminiModel, GeminiSceneClient, GeminiSceneClientBuilder};
pub use scene::{PromptTemplate, SceneGenerator, ScenePrompt, SceneRequest, Subject};
pub use settings::SettingsStore;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::controller::{GenerationState, Outcome, SceneController};
    pub use crate::error::{Result, SceneError};
    pub use crate::image::{SelectedImage, WatermarkedImage, Watermarker, DEFAULT_DOWNLOAD_NAME};
    pub use crate::messages::{Locale, UserMessage};
    pub use crate::scene::providers::GeminiSceneClient;
    pub use crate::scene::{SceneGenerator, SceneRequest};
    pub use crate::settings::SettingsStore;
}
