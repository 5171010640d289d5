//! Model backend implementations.

mod anthropic;
mod gemini;

pub use anthropic::{AnthropicBackend, AnthropicBackendBuilder, DEFAULT_ANTHROPIC_MODEL};
pub use gemini::{DEFAULT_GEMINI_MODEL, GeminiBackend};
