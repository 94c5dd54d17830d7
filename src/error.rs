//! Error types for scene generation.

use crate::messages::UserMessage;
use std::time::Duration;

/// Maximum length of service error text carried inside an error.
const MAX_ERROR_MESSAGE_LEN: usize = 300;

/// Errors that can occur while composing a scene.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// No API key was supplied.
    #[error("API key is required")]
    MissingApiKey,

    /// The service rejected the API key.
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized error text from the service.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested delay from the `Retry-After` header.
        retry_after: Option<Duration>,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The service answered with something we could not interpret.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The selected file is not an accepted image type.
    #[error("unsupported file: {0}")]
    UnsupportedFile(String),

    /// The selected file was read but contained no data.
    #[error("image file is empty: {0}")]
    EmptyImage(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Raster decode/encode failure.
    #[error("image error: {0}")]
    ImageDecode(#[from] ::image::ImageError),

    /// Drawing surface or font could not be prepared.
    #[error("compositing failed: {0}")]
    Compositing(String),

    /// I/O error (reading inputs, saving output, settings file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SceneError {
    /// Translates the error into the message shown to the user.
    pub fn user_message(&self) -> UserMessage {
        match self {
            Self::MissingApiKey => UserMessage::MissingApiKey,
            Self::InvalidApiKey(_) => UserMessage::InvalidApiKey,
            Self::UnsupportedFile(_) | Self::EmptyImage(_) | Self::Io(_) => {
                UserMessage::ConversionFailed
            }
            Self::Api { .. }
            | Self::RateLimited { .. }
            | Self::ContentBlocked(_)
            | Self::UnexpectedResponse(_)
            | Self::Network(_)
            | Self::Decode(_)
            | Self::Json(_) => UserMessage::GenerationFailed,
            Self::ImageDecode(_) | Self::Compositing(_) => UserMessage::Unexpected,
        }
    }
}

/// Result type alias for scene operations.
pub type Result<T> = std::result::Result<T, SceneError>;

/// Trims service error text to a bounded single line and strips anything
/// that looks like an API key.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let flat: String = text
        .split_whitespace()
        .map(|word| {
            if word.starts_with("AIza") || word.contains("key=") {
                "[redacted]"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if flat.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = flat.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        flat
    }
}

/// Reads a `Retry-After` header expressed in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_mapping() {
        assert_eq!(
            SceneError::MissingApiKey.user_message(),
            UserMessage::MissingApiKey
        );
        assert_eq!(
            SceneError::InvalidApiKey("nope".into()).user_message(),
            UserMessage::InvalidApiKey
        );
        assert_eq!(
            SceneError::EmptyImage("a.png".into()).user_message(),
            UserMessage::ConversionFailed
        );
        assert_eq!(
            SceneError::Api {
                status: 500,
                message: "boom".into()
            }
            .user_message(),
            UserMessage::GenerationFailed
        );
        assert_eq!(
            SceneError::RateLimited { retry_after: None }.user_message(),
            UserMessage::GenerationFailed
        );
        assert_eq!(
            SceneError::Compositing("no surface".into()).user_message(),
            UserMessage::Unexpected
        );
    }

    #[test]
    fn test_error_display() {
        let err = SceneError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = SceneError::ContentBlocked("Safety filter triggered".into());
        assert_eq!(err.to_string(), "content blocked: Safety filter triggered");
    }

    #[test]
    fn test_sanitize_redacts_keys_and_flattens() {
        let text = "bad request\n  for AIzaSyDUMMY and url?key=abc";
        assert_eq!(
            sanitize_error_message(text),
            "bad request for [redacted] and [redacted]"
        );
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(MAX_ERROR_MESSAGE_LEN + 50);
        let out = sanitize_error_message(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), MAX_ERROR_MESSAGE_LEN + 3);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(30));
    }
}
