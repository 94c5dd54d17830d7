//! Application controller: owns the form, the credential and the state of
//! the current generation attempt.
//!
//! An attempt moves `Idle → Validating → Requesting → Watermarking → Done`,
//! leaving for `Error` from any of the three working phases. Guard failures
//! never leave `Idle`; they set a notice instead.
//!
//! Every attempt takes a fresh token. A pipeline writes state only while its
//! token is still the current one, so [`SceneController::cancel`] makes any
//! in-flight attempt drop its result.

use crate::error::{Result, SceneError};
use crate::image::{ImageEncoder, SelectedImage, WatermarkedImage, Watermarker};
use crate::messages::UserMessage;
use crate::scene::{SceneGenerator, SceneRequest};
use crate::settings::SettingsStore;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fieldless view of [`GenerationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the user.
    Idle,
    /// Reading the selected files.
    Validating,
    /// Waiting on the scene service.
    Requesting,
    /// Drawing the caption.
    Watermarking,
    /// A result is available.
    Done,
    /// The last attempt failed.
    Error,
}

/// State of the current attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    /// Waiting for the user; `notice` holds a rejected guard, if any.
    Idle {
        /// Why the last trigger was refused.
        notice: Option<UserMessage>,
    },
    /// Reading the selected files.
    Validating,
    /// Waiting on the scene service.
    Requesting,
    /// Drawing the caption.
    Watermarking,
    /// Finished image.
    Done(WatermarkedImage),
    /// Failure shown to the user.
    Error(UserMessage),
}

impl Default for GenerationState {
    fn default() -> Self {
        Self::Idle { notice: None }
    }
}

impl GenerationState {
    /// The fieldless phase.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle { .. } => Phase::Idle,
            Self::Validating => Phase::Validating,
            Self::Requesting => Phase::Requesting,
            Self::Watermarking => Phase::Watermarking,
            Self::Done(_) => Phase::Done,
            Self::Error(_) => Phase::Error,
        }
    }

    /// True while a pipeline is running; the trigger is disabled then.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Validating | Self::Requesting | Self::Watermarking)
    }

    /// The finished image, if any.
    pub fn result(&self) -> Option<&WatermarkedImage> {
        match self {
            Self::Done(image) => Some(image),
            _ => None,
        }
    }

    /// Message to display, from either a failure or a refused trigger.
    pub fn message(&self) -> Option<UserMessage> {
        match self {
            Self::Error(message) => Some(*message),
            Self::Idle { notice } => *notice,
            _ => None,
        }
    }
}

/// Inputs the user has selected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneForm {
    /// Photo of the person (required).
    pub character_image: Option<SelectedImage>,
    /// Separate bicycle photo.
    pub bike_image: Option<SelectedImage>,
    /// Reference scene photo.
    pub scene_image: Option<SelectedImage>,
    /// Scene description.
    pub scene_text: String,
}

impl SceneForm {
    /// True when there is something to build a scene from.
    pub fn has_scene(&self) -> bool {
        !self.scene_text.trim().is_empty() || self.scene_image.is_some()
    }
}

/// How a call to [`SceneController::generate`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The watermarked image is ready.
    Done(WatermarkedImage),
    /// The pipeline failed; state is `Error`.
    Failed(UserMessage),
    /// A guard refused to start; state stays `Idle`.
    Rejected(UserMessage),
    /// Another attempt is still running; nothing changed.
    Busy,
    /// The attempt was cancelled or replaced and its result dropped.
    Superseded,
}

#[derive(Debug, Default)]
struct Inner {
    state: GenerationState,
    form: SceneForm,
    settings: SettingsStore,
    token: u64,
    transitions: Vec<Phase>,
    last_request: Option<SceneForm>,
}

impl Inner {
    fn enter(&mut self, state: GenerationState) {
        let phase = state.phase();
        tracing::info!(token = self.token, ?phase, "state change");
        self.transitions.push(phase);
        self.state = state;
    }

    fn check_guards(&self) -> std::result::Result<String, UserMessage> {
        let api_key = self
            .settings
            .api_key()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(UserMessage::MissingApiKey)?;
        if self.form.character_image.is_none() {
            return Err(UserMessage::MissingCharacterImage);
        }
        if !self.form.has_scene() {
            return Err(UserMessage::MissingScene);
        }
        Ok(api_key.to_string())
    }
}

/// Drives generation attempts against a [`SceneGenerator`].
#[derive(Debug)]
pub struct SceneController<G> {
    generator: G,
    encoder: ImageEncoder,
    watermarker: Watermarker,
    inner: Mutex<Inner>,
}

impl<G: SceneGenerator> SceneController<G> {
    /// Creates a controller; `settings` is the already-loaded store.
    pub fn new(generator: G, watermarker: Watermarker, settings: SettingsStore) -> Self {
        Self {
            generator,
            encoder: ImageEncoder,
            watermarker,
            inner: Mutex::new(Inner {
                settings,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn state(&self) -> GenerationState {
        self.lock().state.clone()
    }

    /// True while an attempt is running.
    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading()
    }

    /// Phases entered by the most recent attempt, in order.
    pub fn transitions(&self) -> Vec<Phase> {
        self.lock().transitions.clone()
    }

    /// Inputs used by the most recent attempt that passed its guards.
    pub fn last_request(&self) -> Option<SceneForm> {
        self.lock().last_request.clone()
    }

    /// Current form contents.
    pub fn form(&self) -> SceneForm {
        self.lock().form.clone()
    }

    /// The stored API key, if any.
    pub fn api_key(&self) -> Option<String> {
        self.lock().settings.api_key().map(str::to_string)
    }

    /// The stored API key with all but its last characters hidden.
    pub fn masked_api_key(&self) -> Option<String> {
        self.lock().settings.masked_api_key()
    }

    /// Replaces the API key and persists it.
    pub fn save_api_key(&self, key: &str) -> Result<()> {
        self.lock().settings.save_api_key(key)
    }

    /// Selects or clears the character photo.
    pub fn select_character_image(&self, image: Option<SelectedImage>) {
        self.lock().form.character_image = image;
    }

    /// Selects or clears the bicycle photo.
    pub fn select_bike_image(&self, image: Option<SelectedImage>) {
        self.lock().form.bike_image = image;
    }

    /// Selects or clears the scene photo.
    pub fn select_scene_image(&self, image: Option<SelectedImage>) {
        self.lock().form.scene_image = image;
    }

    /// Sets the scene description.
    pub fn set_scene_text(&self, text: impl Into<String>) {
        self.lock().form.scene_text = text.into();
    }

    /// Abandons any running attempt and returns to `Idle`.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        inner.token += 1;
        inner.enter(GenerationState::default());
    }

    /// Runs one full attempt: guards, encoding, the service call and the
    /// watermark.
    pub async fn generate(&self) -> Outcome {
        let (token, api_key, form) = {
            let mut inner = self.lock();
            if inner.state.is_loading() {
                return Outcome::Busy;
            }

            inner.token += 1;
            inner.transitions.clear();
            inner.state = GenerationState::default();

            let api_key = match inner.check_guards() {
                Ok(key) => key,
                Err(message) => {
                    tracing::info!(?message, "generation refused");
                    inner.state = GenerationState::Idle {
                        notice: Some(message),
                    };
                    return Outcome::Rejected(message);
                }
            };

            let form = inner.form.clone();
            inner.last_request = Some(form.clone());
            inner.enter(GenerationState::Validating);
            (inner.token, api_key, form)
        };

        let request = match self.build_request(&form).await {
            Ok(request) => request,
            Err(e) => return self.fail(token, &e),
        };

        if !self.advance(token, GenerationState::Requesting) {
            return Outcome::Superseded;
        }
        let generated = match self.generator.generate_scene(&api_key, &request).await {
            Ok(Some(image)) => image,
            Ok(None) => {
                return self.finish(token, GenerationState::Error(UserMessage::NoImageProduced))
            }
            Err(e) => return self.fail(token, &e),
        };

        if !self.advance(token, GenerationState::Watermarking) {
            return Outcome::Superseded;
        }
        let watermarker = self.watermarker.clone();
        let data = generated.data;
        let marked = match tokio::task::spawn_blocking(move || watermarker.apply(&data)).await {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => return self.fail(token, &e),
            Err(e) => {
                tracing::error!("watermark task failed: {e}");
                return self.finish(token, GenerationState::Error(UserMessage::Unexpected));
            }
        };

        self.finish(token, GenerationState::Done(marked))
    }

    async fn build_request(&self, form: &SceneForm) -> Result<SceneRequest> {
        let character = form
            .character_image
            .as_ref()
            .ok_or_else(|| SceneError::UnsupportedFile("no character image".into()))?;

        let mut request = SceneRequest::new(
            self.encoder.encode(character).await?,
            form.scene_text.clone(),
        );
        if let Some(bike) = &form.bike_image {
            request = request.with_bike_image(self.encoder.encode(bike).await?);
        }
        if let Some(scene) = &form.scene_image {
            request = request.with_scene_image(self.encoder.encode(scene).await?);
        }
        Ok(request)
    }

    /// Moves to `state` if `token` is still current.
    fn advance(&self, token: u64, state: GenerationState) -> bool {
        let mut inner = self.lock();
        if inner.token != token {
            tracing::warn!(token, current = inner.token, "discarding stale attempt");
            return false;
        }
        inner.enter(state);
        true
    }

    fn fail(&self, token: u64, error: &SceneError) -> Outcome {
        tracing::warn!(generator = self.generator.name(), "generation failed: {error}");
        self.finish(token, GenerationState::Error(error.user_message()))
    }

    fn finish(&self, token: u64, state: GenerationState) -> Outcome {
        let outcome = match &state {
            GenerationState::Done(image) => Outcome::Done(image.clone()),
            GenerationState::Error(message) => Outcome::Failed(*message),
            _ => Outcome::Superseded,
        };
        if self.advance(token, state) {
            outcome
        } else {
            Outcome::Superseded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{GeneratedImage, ImageInput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ::image::RgbaImage::from_pixel(width, height, ::image::Rgba([30, 60, 90, 255]));
        let mut out = Vec::new();
        ::image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), ::image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn selected() -> SelectedImage {
        SelectedImage::Memory(ImageInput::new(png(4, 4), "image/png"))
    }

    #[derive(Default)]
    struct FixedGenerator {
        calls: AtomicUsize,
        reply: Option<Vec<u8>>,
    }

    #[async_trait]
    impl SceneGenerator for FixedGenerator {
        async fn generate_scene(
            &self,
            _api_key: &str,
            _request: &SceneRequest,
        ) -> Result<Option<GeneratedImage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone().map(|data| GeneratedImage {
                data,
                mime_type: "image/png".into(),
                model: None,
                duration_ms: None,
            }))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct GatedGenerator {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SceneGenerator for GatedGenerator {
        async fn generate_scene(
            &self,
            _api_key: &str,
            _request: &SceneRequest,
        ) -> Result<Option<GeneratedImage>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Some(GeneratedImage {
                data: png(90, 60),
                mime_type: "image/png".into(),
                model: None,
                duration_ms: None,
            }))
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn controller<G: SceneGenerator>(generator: G) -> SceneController<G> {
        let mut settings = SettingsStore::in_memory();
        settings.save_api_key("test-key").unwrap();
        SceneController::new(generator, Watermarker::new().unwrap(), settings)
    }

    #[tokio::test]
    async fn test_guard_order() {
        let c = SceneController::new(
            FixedGenerator::default(),
            Watermarker::new().unwrap(),
            SettingsStore::in_memory(),
        );
        assert_eq!(
            c.generate().await,
            Outcome::Rejected(UserMessage::MissingApiKey)
        );

        c.save_api_key("k").unwrap();
        assert_eq!(
            c.generate().await,
            Outcome::Rejected(UserMessage::MissingCharacterImage)
        );

        c.select_character_image(Some(selected()));
        c.set_scene_text("   ");
        assert_eq!(
            c.generate().await,
            Outcome::Rejected(UserMessage::MissingScene)
        );
        assert_eq!(
            c.state(),
            GenerationState::Idle {
                notice: Some(UserMessage::MissingScene)
            }
        );
        assert!(c.transitions().is_empty());
        assert!(c.last_request().is_none());
    }

    #[tokio::test]
    async fn test_scene_image_satisfies_scene_guard() {
        let c = controller(FixedGenerator {
            reply: Some(png(90, 45)),
            ..Default::default()
        });
        c.select_character_image(Some(selected()));
        c.select_scene_image(Some(selected()));

        let outcome = c.generate().await;
        assert!(matches!(outcome, Outcome::Done(_)));
    }

    #[tokio::test]
    async fn test_success_path_transitions() {
        let c = controller(FixedGenerator {
            reply: Some(png(90, 45)),
            ..Default::default()
        });
        c.select_character_image(Some(selected()));
        c.set_scene_text("forest trail");

        let Outcome::Done(image) = c.generate().await else {
            panic!("expected Done");
        };
        assert_eq!((image.width, image.height), (90, 45));
        assert_eq!(
            c.transitions(),
            vec![
                Phase::Validating,
                Phase::Requesting,
                Phase::Watermarking,
                Phase::Done
            ]
        );
        assert_eq!(c.state().result(), Some(&image));
        assert_eq!(c.last_request().unwrap().scene_text, "forest trail");
    }

    #[tokio::test]
    async fn test_new_attempt_clears_previous_result() {
        let c = controller(FixedGenerator {
            reply: Some(png(90, 45)),
            ..Default::default()
        });
        c.select_character_image(Some(selected()));
        c.set_scene_text("forest trail");
        assert!(matches!(c.generate().await, Outcome::Done(_)));

        c.set_scene_text("");
        assert_eq!(
            c.generate().await,
            Outcome::Rejected(UserMessage::MissingScene)
        );
        assert!(c.state().result().is_none());
    }

    #[tokio::test]
    async fn test_empty_file_fails_in_validating() {
        let generator = FixedGenerator {
            reply: Some(png(90, 45)),
            ..Default::default()
        };
        let c = controller(generator);
        c.select_character_image(Some(SelectedImage::Memory(ImageInput::new(
            Vec::new(),
            "image/png",
        ))));
        c.set_scene_text("x");

        assert_eq!(
            c.generate().await,
            Outcome::Failed(UserMessage::ConversionFailed)
        );
        assert_eq!(c.transitions(), vec![Phase::Validating, Phase::Error]);
        assert_eq!(c.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_garbage_result_fails_in_watermarking() {
        let c = controller(FixedGenerator {
            reply: Some(b"not an image".to_vec()),
            ..Default::default()
        });
        c.select_character_image(Some(selected()));
        c.set_scene_text("x");

        assert_eq!(c.generate().await, Outcome::Failed(UserMessage::Unexpected));
        assert_eq!(
            c.transitions(),
            vec![
                Phase::Validating,
                Phase::Requesting,
                Phase::Watermarking,
                Phase::Error
            ]
        );
    }

    #[tokio::test]
    async fn test_busy_while_running_and_cancel_drops_result() {
        let c = controller(GatedGenerator {
            entered: Notify::new(),
            release: Notify::new(),
        });
        c.select_character_image(Some(selected()));
        c.set_scene_text("x");

        let first = c.generate();
        let second = async {
            c.generator.entered.notified().await;
            assert!(c.is_loading());
            let busy = c.generate().await;
            c.cancel();
            c.generator.release.notify_one();
            busy
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(second, Outcome::Busy);
        assert_eq!(first, Outcome::Superseded);
        assert_eq!(c.state(), GenerationState::Idle { notice: None });
    }

    #[tokio::test]
    async fn test_generator_shared_through_arc() {
        let generator = Arc::new(FixedGenerator {
            reply: Some(png(90, 45)),
            ..Default::default()
        });
        let c = controller(Arc::clone(&generator));
        c.select_character_image(Some(selected()));
        c.set_scene_text("x");
        assert!(matches!(c.generate().await, Outcome::Done(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }
}
