//! Scene generation backends.

mod gemini;

pub use gemini::{GeminiModel, GeminiSceneClient, GeminiSceneClientBuilder, DEFAULT_BASE_URL};
