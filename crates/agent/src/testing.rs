//! Scripted providers for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use async_trait::async_trait;
use offerdesk_core::error::ProviderError;
use offerdesk_core::provider::{GenerateRequest, GenerateResponse, Provider, Usage};
use offerdesk_core::tool::CallRequest;

/// A provider that returns a sequence of scripted responses.
///
/// Each call to `generate` pops the next response and records the request.
/// Running out of responses is reported as an API error.
pub struct SequentialMockProvider {
    responses: Mutex<VecDeque<Result<GenerateResponse, ProviderError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<GenerateResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Responses that may include provider failures.
    pub fn scripted(responses: Vec<Result<GenerateResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A single text response (no calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let call = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|_| ProviderError::Network("mock poisoned".into()))?;
            requests.push(request);
            requests.len()
        };
        self.responses
            .lock()
            .map_err(|_| ProviderError::Network("mock poisoned".into()))?
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProviderError::ApiError {
                    status_code: 500,
                    message: format!("no scripted response for call #{call}"),
                })
            })
    }
}

/// A text-only response.
pub fn text_response(text: &str) -> GenerateResponse {
    GenerateResponse {
        usage: Some(usage()),
        model: "mock-model".into(),
        ..GenerateResponse::text(text)
    }
}

/// A response requesting the given calls.
pub fn calls_response(calls: Vec<CallRequest>) -> GenerateResponse {
    GenerateResponse {
        usage: Some(usage()),
        model: "mock-model".into(),
        ..GenerateResponse::calls(calls)
    }
}

fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}
