//! Language model integration
//!
//! - `gemini`: Google Gemini `generateContent` client
//! - `insights`: summary / sentiment / urgency analysis
//! - `reply`: reply drafting

mod gemini;
pub mod insights;
pub mod reply;

use anyhow::Result;

pub use gemini::GeminiClient;

/// A text-in, text-out language model
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Whether the generator has what it needs (e.g. an API key) to run
    fn is_configured(&self) -> bool {
        true
    }
}
