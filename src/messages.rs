//! User-facing messages in the supported display languages.

use serde::{Deserialize, Serialize};

/// Display language for user-facing messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English.
    #[default]
    En,
    /// Vietnamese.
    Vi,
}

impl Locale {
    /// Parses a locale tag such as `vi`, `vi-VN` or `en_US`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let lang = tag.split(['-', '_']).next()?.to_lowercase();
        match lang.as_str() {
            "en" => Some(Self::En),
            "vi" => Some(Self::Vi),
            _ => None,
        }
    }
}

/// Every message the application can show about an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMessage {
    /// No API key has been entered.
    MissingApiKey,
    /// No character photo has been selected.
    MissingCharacterImage,
    /// Neither a scene description nor a scene image was given.
    MissingScene,
    /// A selected file could not be read or converted.
    ConversionFailed,
    /// The service rejected the API key.
    InvalidApiKey,
    /// The service failed for any other reason.
    GenerationFailed,
    /// The service answered but produced no image.
    NoImageProduced,
    /// Anything else, including watermarking failures.
    Unexpected,
}

impl UserMessage {
    /// Returns true for messages raised before any external call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey | Self::MissingCharacterImage | Self::MissingScene
        )
    }

    /// Returns the message text in the given language.
    pub fn text(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match self {
                Self::MissingApiKey => "Please enter your Google AI API key to continue.",
                Self::MissingCharacterImage => "Please upload a character photo.",
                Self::MissingScene => "Please describe the scene or upload a background image.",
                Self::ConversionFailed => "Could not convert the file to base64.",
                Self::InvalidApiKey => "Invalid API key. Please check it and try again.",
                Self::GenerationFailed => "Could not generate the scene. The API returned an error.",
                Self::NoImageProduced => {
                    "The AI could not produce an image. Please try again with a different prompt or image."
                }
                Self::Unexpected => "An unknown error occurred while generating the image.",
            },
            Locale::Vi => match self {
                Self::MissingApiKey => "Vui lòng nhập Google AI API Key của bạn để tiếp tục.",
                Self::MissingCharacterImage => "Vui lòng tải lên ảnh nhân vật.",
                Self::MissingScene => "Vui lòng mô tả bối cảnh hoặc tải lên ảnh nền.",
                Self::ConversionFailed => "Không thể chuyển đổi tệp thành base64.",
                Self::InvalidApiKey => "API Key không hợp lệ. Vui lòng kiểm tra lại.",
                Self::GenerationFailed => "Không thể tạo bối cảnh. API đã trả về lỗi.",
                Self::NoImageProduced => {
                    "AI không thể tạo hình ảnh. Vui lòng thử lại với một lời nhắc hoặc hình ảnh khác."
                }
                Self::Unexpected => "Đã xảy ra lỗi không xác định trong quá trình tạo ảnh.",
            },
        }
    }
}

impl std::fmt::Display for UserMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text(Locale::En))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_from_tag() {
        assert_eq!(Locale::from_tag("vi"), Some(Locale::Vi));
        assert_eq!(Locale::from_tag("vi-VN"), Some(Locale::Vi));
        assert_eq!(Locale::from_tag("en_US"), Some(Locale::En));
        assert_eq!(Locale::from_tag("fr"), None);
    }

    #[test]
    fn test_validation_messages() {
        assert!(UserMessage::MissingApiKey.is_validation());
        assert!(UserMessage::MissingScene.is_validation());
        assert!(!UserMessage::InvalidApiKey.is_validation());
        assert!(!UserMessage::NoImageProduced.is_validation());
    }

    #[test]
    fn test_messages_differ_per_locale() {
        let en = UserMessage::InvalidApiKey.text(Locale::En);
        let vi = UserMessage::InvalidApiKey.text(Locale::Vi);
        assert_ne!(en, vi);
        assert_eq!(UserMessage::InvalidApiKey.to_string(), en);
    }
}
