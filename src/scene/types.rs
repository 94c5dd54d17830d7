//! Request type for scene generation.

use crate::image::ImageInput;

/// Everything one generation attempt sends to the service.
#[derive(Debug, Clone)]
pub struct SceneRequest {
    /// Photo of the person (possibly already riding a bicycle).
    pub character_image: ImageInput,
    /// Separate photo of a bicycle.
    pub bike_image: Option<ImageInput>,
    /// Reference photo of the target scene.
    pub scene_image: Option<ImageInput>,
    /// Free-text scene description, or mood guidance when a scene image is given.
    pub scene_text: String,
}

impl SceneRequest {
    /// Creates a request with only the character image and a scene description.
    pub fn new(character_image: ImageInput, scene_text: impl Into<String>) -> Self {
        Self {
            character_image,
            bike_image: None,
            scene_image: None,
            scene_text: scene_text.into(),
        }
    }

    /// Adds a separate bicycle photo.
    pub fn with_bike_image(mut self, image: ImageInput) -> Self {
        self.bike_image = Some(image);
        self
    }

    /// Adds a reference scene photo.
    pub fn with_scene_image(mut self, image: ImageInput) -> Self {
        self.scene_image = Some(image);
        self
    }

    /// Images in the order they are sent: character, bike, scene.
    pub fn images(&self) -> impl Iterator<Item = &ImageInput> {
        std::iter::once(&self.character_image)
            .chain(self.bike_image.as_ref())
            .chain(self.scene_image.as_ref())
    }
}
