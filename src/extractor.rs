//! Trait seam for the external embedding-extraction model.
//!
//! The real extractor wraps a deep-learning speaker model and takes minutes
//! per meeting; this core only sees it through `EmbeddingExtractor`. The
//! trait allows swapping implementations (real model vs mock).

use crate::embedding::Embedding;
use crate::error::{Result, RollcallError};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for extracting a voice embedding from a time range of an audio file.
pub trait EmbeddingExtractor: Send + Sync {
    /// Extract an embedding for `[start_secs, end_secs)` of `audio_ref`.
    ///
    /// # Returns
    /// A fixed-dimension embedding vector, or an error if the model fails.
    fn extract(&self, audio_ref: &str, start_secs: f64, end_secs: f64) -> Result<Embedding>;

    /// Name of the underlying model (for reports and profile metadata).
    fn model_name(&self) -> &str;
}

/// Implement EmbeddingExtractor for Arc<T> to allow sharing across workers.
impl<T: EmbeddingExtractor> EmbeddingExtractor for Arc<T> {
    fn extract(&self, audio_ref: &str, start_secs: f64, end_secs: f64) -> Result<Embedding> {
        (**self).extract(audio_ref, start_secs, end_secs)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock extractor for testing.
///
/// Returns a fixed embedding, per-speaker-window overrides, or a configured
/// failure. Failure after N calls simulates an extractor aborted mid-meeting.
#[derive(Debug, Clone)]
pub struct MockExtractor {
    model_name: String,
    response: Embedding,
    overrides: HashMap<String, Embedding>,
    fail_after: Option<usize>,
    calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl MockExtractor {
    /// Create a mock returning `response` for every extraction.
    pub fn new(response: Embedding) -> Self {
        Self {
            model_name: "mock-speaker-model".to_string(),
            response,
            overrides: HashMap::new(),
            fail_after: None,
            calls: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    /// Return `embedding` for extractions on `audio_ref` instead of the default.
    pub fn with_override(mut self, audio_ref: &str, embedding: Embedding) -> Self {
        self.overrides.insert(audio_ref.to_string(), embedding);
        self
    }

    /// Fail every extraction after the first `n` successful calls.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Number of extract calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl EmbeddingExtractor for MockExtractor {
    fn extract(&self, audio_ref: &str, _start_secs: f64, _end_secs: f64) -> Result<Embedding> {
        let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(limit) = self.fail_after
            && call >= limit
        {
            return Err(RollcallError::Extraction {
                message: format!("mock extractor aborted after {limit} calls"),
            });
        }
        Ok(self
            .overrides
            .get(audio_ref)
            .cloned()
            .unwrap_or_else(|| self.response.clone()))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_returns_configured_embedding() {
        let emb = Embedding::new(vec![1.0, 0.0]);
        let extractor = MockExtractor::new(emb.clone());
        let result = extractor.extract("meeting.wav", 0.0, 5.0).unwrap();
        assert_eq!(result, emb);
    }

    #[test]
    fn test_mock_override_per_audio_ref() {
        let default = Embedding::new(vec![1.0, 0.0]);
        let special = Embedding::new(vec![0.0, 1.0]);
        let extractor =
            MockExtractor::new(default.clone()).with_override("special.wav", special.clone());

        assert_eq!(extractor.extract("other.wav", 0.0, 5.0).unwrap(), default);
        assert_eq!(extractor.extract("special.wav", 0.0, 5.0).unwrap(), special);
    }

    #[test]
    fn test_mock_fails_after_limit() {
        let extractor = MockExtractor::new(Embedding::new(vec![1.0])).failing_after(2);
        assert!(extractor.extract("a.wav", 0.0, 1.0).is_ok());
        assert!(extractor.extract("a.wav", 1.0, 2.0).is_ok());
        assert!(extractor.extract("a.wav", 2.0, 3.0).is_err());
        assert_eq!(extractor.call_count(), 3);
    }

    #[test]
    fn test_extractor_trait_is_object_safe() {
        let extractor: Box<dyn EmbeddingExtractor> =
            Box::new(MockExtractor::new(Embedding::new(vec![1.0, 0.0])));
        assert_eq!(extractor.model_name(), "mock-speaker-model");
        assert!(extractor.extract("m.wav", 0.0, 2.0).is_ok());
    }

    #[test]
    fn test_arc_extractor_shares_call_count() {
        let extractor = Arc::new(MockExtractor::new(Embedding::new(vec![1.0])));
        let shared = Arc::clone(&extractor);
        shared.extract("m.wav", 0.0, 2.0).unwrap();
        assert_eq!(extractor.call_count(), 1);
    }
}
