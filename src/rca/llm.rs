//! Pluggable LLM classifier contract.
//!
//! The engine treats the LLM purely as a narrow text-completion classifier: it
//! is called (a) once during identifier extraction and (b) once during
//! hypothesis seeding (§4.2, §4.6). Neither call is on the control-flow hot
//! path, and the core ships no concrete provider binding — per Non-goal 2,
//! callers supply their own [`LlmClassifier`] backed by whatever HTTP client
//! and credentials they choose. [`NullLlmClassifier`] is the degrade-to-regex
//! implementation used in tests and when no LLM is configured.

use async_trait::async_trait;

/// Result type for LLM calls: a generic boxed error, matching the internal
/// fallible-helper convention used throughout the crate (§10).
pub type LlmResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A single-method text-completion contract. `prompt` is caller-composed;
/// the engine imposes no specific prompt text (Non-goal 2).
#[async_trait]
pub trait LlmClassifier: Send + Sync {
    /// Returns the model's raw text completion for `prompt`, or an error if
    /// the call could not be made (network failure, no credentials, etc). A
    /// classifier that wants to signal "available but not confident" should
    /// return `Ok` with content the caller's parsing logic treats as
    /// low-confidence, not an `Err`.
    async fn complete(&self, prompt: &str) -> LlmResult<String>;
}

/// Always-unavailable classifier: every call fails immediately. Using this
/// forces the identifier extractor and hypothesis engine onto their
/// documented regex/pattern-library fallback paths, which is exactly what a
/// caller with no LLM configured wants.
pub struct NullLlmClassifier;

#[async_trait]
impl LlmClassifier for NullLlmClassifier {
    async fn complete(&self, _prompt: &str) -> LlmResult<String> {
        Err("no LLM classifier configured".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_classifier_always_errors() {
        let classifier = NullLlmClassifier;
        assert!(classifier.complete("anything").await.is_err());
    }
}
