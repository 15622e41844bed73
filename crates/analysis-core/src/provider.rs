//! Abstraction over hosted analysis backends so vendors can plug in and
//! tests can run offline.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::AnalysisError;

/// One analysis exchange: system instruction + user prompt in, raw text out.
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub system_instruction: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Single request/response exchange plus typed failure classification.
/// Retries, if any, are caller policy.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError>;
}

/// Deterministic provider for tests and offline development. Yields each
/// queued response once, in order, then repeats the last one.
#[derive(Default)]
pub struct MockAnalysisProvider {
    responses: Mutex<Vec<Result<String, AnalysisError>>>,
    served: Mutex<usize>,
}

impl MockAnalysisProvider {
    pub fn replying(response: impl Into<String>) -> Self {
        let provider = Self::default();
        provider.responses.lock().push(Ok(response.into()));
        provider
    }

    pub fn failing(error: AnalysisError) -> Self {
        let provider = Self::default();
        provider.responses.lock().push(Err(error));
        provider
    }

    pub fn then(self, response: Result<String, AnalysisError>) -> Self {
        self.responses.lock().push(response);
        self
    }

    pub fn calls(&self) -> usize {
        *self.served.lock()
    }
}

#[async_trait]
impl AnalysisProvider for MockAnalysisProvider {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<String, AnalysisError> {
        let responses = self.responses.lock();
        let mut served = self.served.lock();
        let index = (*served).min(responses.len().saturating_sub(1));
        *served += 1;
        responses
            .get(index)
            .cloned()
            .unwrap_or_else(|| Err(AnalysisError::Upstream("mock has no responses".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            system_instruction: "system".into(),
            user_prompt: "user".into(),
            max_output_tokens: 256,
            temperature: 0.1,
        }
    }

    #[tokio::test]
    async fn mock_serves_queued_responses_in_order() {
        let provider = MockAnalysisProvider::replying("first")
            .then(Ok("second".into()));

        assert_eq!(provider.analyze(&request()).await.unwrap(), "first");
        assert_eq!(provider.analyze(&request()).await.unwrap(), "second");
        // Past the queue the last response repeats.
        assert_eq!(provider.analyze(&request()).await.unwrap(), "second");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn mock_propagates_typed_failures() {
        let provider = MockAnalysisProvider::failing(AnalysisError::Transport("reset".into()));
        let err = provider.analyze(&request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Transport(_)));
    }
}
