//! Scene generator trait.

use crate::error::Result;
use crate::image::GeneratedImage;
use crate::scene::types::SceneRequest;
use async_trait::async_trait;

/// A service that composites the subject of a [`SceneRequest`] into a scene.
#[async_trait]
pub trait SceneGenerator: Send + Sync {
    /// Sends one generation request.
    ///
    /// Returns `Ok(None)` when the service answered but produced no image.
    /// An empty `api_key` must be rejected before any network call.
    async fn generate_scene(
        &self,
        api_key: &str,
        request: &SceneRequest,
    ) -> Result<Option<GeneratedImage>>;

    /// Returns the name of this generator for display.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: SceneGenerator + ?Sized> SceneGenerator for std::sync::Arc<T> {
    async fn generate_scene(
        &self,
        api_key: &str,
        request: &SceneRequest,
    ) -> Result<Option<GeneratedImage>> {
        (**self).generate_scene(api_key, request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
