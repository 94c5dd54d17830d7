//! Gemini (Google) scene generation client.

use crate::error::{parse_retry_after, sanitize_error_message, Result, SceneError};
use crate::image::GeneratedImage;
use crate::scene::prompt::ScenePrompt;
use crate::scene::provider::SceneGenerator;
use crate::scene::types::SceneRequest;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Public Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Text the service puts in its message when the key is rejected.
const INVALID_KEY_TEXT: &str = "API key not valid";

/// Structured reason the service attaches to a rejected key.
const INVALID_KEY_REASON: &str = "API_KEY_INVALID";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image, preview release.
    #[default]
    FlashImagePreview,
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashImagePreview => "gemini-2.5-flash-image-preview",
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
        }
    }
}

/// Builder for GeminiSceneClient.
#[derive(Debug, Clone)]
pub struct GeminiSceneClientBuilder {
    model: String,
    base_url: String,
    client: Option<reqwest::Client>,
}

impl Default for GeminiSceneClientBuilder {
    fn default() -> Self {
        Self {
            model: GeminiModel::default().as_str().to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: None,
        }
    }
}

impl GeminiSceneClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model.as_str().to_string();
        self
    }

    /// Sets a raw model identifier, for models without a [`GeminiModel`] variant.
    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Points the client at a different host (proxies, test servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Reuses an existing HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<GeminiSceneClient> {
        if self.model.trim().is_empty() {
            return Err(SceneError::UnexpectedResponse(
                "model identifier must not be empty".into(),
            ));
        }
        Ok(GeminiSceneClient {
            client: self.client.unwrap_or_default(),
            model: self.model,
            base_url: self.base_url,
        })
    }
}

/// Scene generator backed by Gemini `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiSceneClient {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl GeminiSceneClient {
    /// Creates a new `GeminiSceneClientBuilder`.
    pub fn builder() -> GeminiSceneClientBuilder {
        GeminiSceneClientBuilder::new()
    }

    /// Model identifier in use.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model)
    }

    /// Checks that `api_key` is accepted by the service.
    pub async fn check_api_key(&self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SceneError::MissingApiKey);
        }

        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", api_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let headers = response.headers().clone();
        let text = response.text().await.unwrap_or_default();
        Err(classify_error(status.as_u16(), &text, &headers))
    }

    async fn generate_impl(
        &self,
        api_key: &str,
        request: &SceneRequest,
    ) -> Result<Option<GeneratedImage>> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SceneError::MissingApiKey);
        }

        let start = Instant::now();
        let prompt = ScenePrompt::build(request);
        let body = GeminiRequest::from_scene_request(request, &prompt);
        let url = format!("{}:generateContent", self.model_url());

        tracing::debug!(
            model = %self.model,
            template = ?prompt.template(),
            images = request.images().count(),
            "submitting scene generation request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let Some(inline_data) = first_inline_image(gemini_response)? else {
            tracing::debug!(model = %self.model, "response carried no image");
            return Ok(None);
        };

        let data = base64::engine::general_purpose::STANDARD
            .decode(inline_data.data.trim())
            .map_err(|e| SceneError::Decode(e.to_string()))?;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(model = %self.model, bytes = data.len(), duration_ms, "scene generation complete");
        Ok(Some(GeneratedImage {
            data,
            mime_type: inline_data.mime_type,
            model: Some(self.model.clone()),
            duration_ms: Some(duration_ms),
        }))
    }
}

#[async_trait]
impl SceneGenerator for GeminiSceneClient {
    async fn generate_scene(
        &self,
        api_key: &str,
        request: &SceneRequest,
    ) -> Result<Option<GeneratedImage>> {
        self.generate_impl(api_key, request).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

/// Picks the first inline image across the first candidate's parts.
///
/// Blocks are errors; a response that simply has no image is `Ok(None)`.
fn first_inline_image(response: GeminiResponse) -> Result<Option<InlineData>> {
    // prompt_feedback blocks arrive with HTTP 200
    if let Some(ref feedback) = response.prompt_feedback {
        if let Some(ref reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(SceneError::ContentBlocked(msg));
        }
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(None);
    };

    if let Some(ref finish_reason) = candidate.finish_reason {
        match finish_reason.as_str() {
            "SAFETY"
            | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT"
            | "IMAGE_RECITATION"
            | "RECITATION"
            | "PROHIBITED_CONTENT"
            | "BLOCKLIST" => {
                return Err(SceneError::ContentBlocked(format!(
                    "Content blocked by Gemini safety filter: {}",
                    finish_reason
                )));
            }
            "IMAGE_OTHER" | "NO_IMAGE" => return Ok(None),
            _ => {} // STOP, MAX_TOKENS, etc. are normal
        }
    }

    let Some(content) = candidate.content else {
        return Ok(None);
    };

    let mut image = None;
    for part in content.parts {
        if let Some(data) = part.inline_data {
            if data.data.trim().is_empty() {
                continue;
            }
            image = Some(data);
            break;
        }
        if let Some(text) = part.text {
            tracing::debug!(text = %sanitize_error_message(&text), "model returned text part");
        }
    }
    Ok(image)
}

/// Maps a non-2xx response to an error, preferring the structured reason.
fn classify_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> SceneError {
    let envelope = serde_json::from_str::<GeminiErrorEnvelope>(text).ok();
    let raw_message = envelope
        .as_ref()
        .and_then(|e| e.error.message.as_deref())
        .unwrap_or(text);
    let message = sanitize_error_message(raw_message);

    let reasons: Vec<&str> = envelope
        .as_ref()
        .map(|e| {
            e.error
                .details
                .iter()
                .filter_map(|d| d.reason.as_deref())
                .collect()
        })
        .unwrap_or_default();

    // 403 also covers a disabled API or a blocked project, so only the
    // reason or the message can tell a bad key apart there.
    if status == 401 || reasons.contains(&INVALID_KEY_REASON) {
        return SceneError::InvalidApiKey(message);
    }
    if reasons.is_empty() && raw_message.contains(INVALID_KEY_TEXT) {
        return SceneError::InvalidApiKey(message);
    }

    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return SceneError::RateLimited { retry_after };
    }

    let lower = message.to_lowercase();
    if lower.contains("safety") || lower.contains("blocked") || lower.contains("prohibited") {
        return SceneError::ContentBlocked(message);
    }

    SceneError::Api { status, message }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn from_scene_request(req: &SceneRequest, prompt: &ScenePrompt) -> Self {
        let mut parts: Vec<GeminiRequestPart> = req
            .images()
            .map(|image| GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: image.mime_type().to_string(),
                    data: image.to_base64(),
                },
            })
            .collect();

        parts.push(GeminiRequestPart::Text {
            text: prompt.text().to_string(),
        });

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Vec<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}
