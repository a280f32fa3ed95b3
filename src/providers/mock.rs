/*!
 * Mock provider implementations for testing.
 *
 * This module provides a scripted provider that simulates different behaviors:
 * - `MockProvider::working()` - Always succeeds
 * - `MockProvider::rate_limited()` - Always answers with HTTP 429
 * - `MockProvider::rate_limited_then_working(n)` - 429 for the first `n` calls
 * - `MockProvider::failing()` - Always fails with a non-retryable error
 * - `MockProvider::unauthorized()` - Rejects the API key
 *
 * Every request is recorded so tests can assert on prompts and call counts.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, CompletionResponse, Provider, RequestKind};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Always reports rate limiting
    RateLimited,
    /// Reports rate limiting for the first `failures` calls, then succeeds
    RateLimitedThenWorking { failures: usize },
    /// Fails every Nth request (1-based) with a server error
    Intermittent { fail_every: usize },
    /// Always fails with a server error
    Failing,
    /// Always rejects the credentials
    Unauthorized,
    /// Returns an empty completion
    Empty,
}

/// Called with the 0-based call number before each request is answered
pub type CallHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Mock provider for testing enrichment behavior
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter
    request_count: Arc<AtomicUsize>,
    /// Every request received, in order
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&CompletionRequest) -> String>,
    /// Side effect run on every call (optional)
    hook: Option<CallHook>,
    /// Whether `check_credentials` passes
    has_credentials: bool,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("behavior", &self.behavior)
            .field("request_count", &self.request_count())
            .field("has_credentials", &self.has_credentials)
            .finish()
    }
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
            hook: None,
            has_credentials: true,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock provider that is always rate limited
    pub fn rate_limited() -> Self {
        Self::new(MockBehavior::RateLimited)
    }

    /// Create a mock provider that is rate limited a few times before answering
    pub fn rate_limited_then_working(failures: usize) -> Self {
        Self::new(MockBehavior::RateLimitedThenWorking { failures })
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock provider that rejects the API key
    pub fn unauthorized() -> Self {
        Self::new(MockBehavior::Unauthorized)
    }

    /// Create a mock provider that returns empty completions
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Simulate a provider with no API key configured
    pub fn without_credentials(mut self) -> Self {
        self.has_credentials = false;
        self
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&CompletionRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Run a side effect on every call, e.g. cancel a run mid-stage
    pub fn with_hook(mut self, hook: CallHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Snapshot of all requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Default reply: echoes the last prompt line, with a chatty second line for titles
    pub fn default_response(request: &CompletionRequest) -> String {
        let payload = request.prompt.lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or_default()
            .trim();

        match request.kind {
            RequestKind::Title => {
                let head: String = payload.chars().take(12).collect();
                format!("Title: {}\nThis title summarizes the segment.", head)
            }
            RequestKind::Proofread => format!("[proofread] {}", payload),
            RequestKind::ConnectionTest => "pong".to_string(),
        }
    }

    fn respond(&self, request: &CompletionRequest) -> CompletionResponse {
        let text = match self.custom_response {
            Some(generator) => generator(request),
            None => Self::default_response(request),
        };

        CompletionResponse {
            prompt_tokens: Some(request.prompt.len() as u64),
            completion_tokens: Some(text.len() as u64),
            text,
        }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            custom_response: self.custom_response,
            hook: self.hook.clone(),
            has_credentials: self.has_credentials,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(hook) = &self.hook {
            hook(count);
        }

        match self.behavior {
            MockBehavior::Working => Ok(self.respond(&request)),

            MockBehavior::RateLimited => {
                Err(ProviderError::RateLimitExceeded("Too many requests".to_string()))
            }

            MockBehavior::RateLimitedThenWorking { failures } => {
                if count < failures {
                    Err(ProviderError::RateLimitExceeded("Too many requests".to_string()))
                } else {
                    Ok(self.respond(&request))
                }
            }

            MockBehavior::Intermittent { fail_every } => {
                if fail_every > 0 && (count + 1) % fail_every == 0 {
                    Err(ProviderError::ApiError {
                        status_code: 500,
                        message: format!("Simulated failure on request {}", count + 1),
                    })
                } else {
                    Ok(self.respond(&request))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated server error".to_string(),
            }),

            MockBehavior::Unauthorized => {
                Err(ProviderError::AuthenticationError("Invalid API key".to_string()))
            }

            MockBehavior::Empty => Ok(CompletionResponse::text("")),
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.check_credentials()?;
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError("Invalid API key".to_string())),
            _ => Ok(()),
        }
    }

    fn check_credentials(&self) -> Result<(), ProviderError> {
        if self.has_credentials {
            Ok(())
        } else {
            Err(ProviderError::AuthenticationError("API key is not set".to_string()))
        }
    }
}
