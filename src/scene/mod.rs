//! Scene generation: prompt templates, the generator trait and its backends.

mod prompt;
mod provider;
pub mod providers;
mod types;

pub use prompt::{PromptTemplate, ScenePrompt, Subject};
pub use provider::SceneGenerator;
pub use types::SceneRequest;
