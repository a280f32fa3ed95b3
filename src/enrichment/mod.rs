/*!
 * Segment enrichment through the remote text service.
 *
 * `EnrichmentClient` turns one segment text into a title or a proofread
 * version of itself. Rate-limited calls are retried with a fixed wait,
 * everything else is reported to the caller which decides on a fallback.
 */

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{Config, RetryConfig};
use crate::errors::{EnrichmentError, ProviderError};
use crate::pipeline::cancel::CancellationToken;
use crate::pipeline::events::EventSender;
use crate::providers::openai::OpenAI;
use crate::providers::{CompletionRequest, Provider, RequestKind};

pub mod fallback;
pub mod prompts;

pub use fallback::{fallback_proofread, fallback_title, recovery_for, Recovery};
pub use prompts::PromptTemplate;

/// How rate-limited calls are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call including the first, `None` for no limit
    pub max_attempts: Option<u32>,
    /// Wait between two attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Keep retrying until the service answers or the run is cancelled
    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff,
        }
    }

    fn allows_another_attempt(&self, attempts_made: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts_made < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Client for title generation and proofreading
#[derive(Debug, Clone)]
pub struct EnrichmentClient {
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
    system_prompt: String,
    temperature: f32,
    events: Option<EventSender>,
}

impl EnrichmentClient {
    pub fn new(provider: Arc<dyn Provider>, retry: RetryPolicy) -> Self {
        let api = crate::app_config::ApiConfig::default();
        Self {
            provider,
            retry,
            system_prompt: api.system_prompt,
            temperature: api.temperature,
            events: None,
        }
    }

    /// Build a client talking to the configured OpenAI-compatible service
    pub fn from_config(config: &Config) -> Self {
        let provider: Arc<dyn Provider> = Arc::new(OpenAI::from_config(&config.api));
        Self::new(provider, RetryPolicy::from_config(&config.retry))
            .with_system_prompt(config.api.system_prompt.clone())
            .with_temperature(config.api.temperature)
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Report retry waits as log events on a run's channel
    pub fn with_event_sender(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Rebuild the connection after the settings changed
    ///
    /// Calls already in flight keep the old provider.
    pub fn refresh(&mut self, config: &Config) {
        self.provider = Arc::new(OpenAI::from_config(&config.api));
        self.retry = RetryPolicy::from_config(&config.retry);
        self.system_prompt = config.api.system_prompt.clone();
        self.temperature = config.api.temperature;
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fail fast when the service cannot be called at all
    pub fn ensure_ready(&self) -> Result<(), EnrichmentError> {
        self.provider
            .check_credentials()
            .map_err(|e| EnrichmentError::StageFailed(e.to_string()))
    }

    /// Generate a short headline for a segment
    ///
    /// Only the first line of the answer is kept, models tend to append an
    /// explanation after the title.
    pub async fn generate_title(&self, text: &str, cancel: &CancellationToken) -> Result<String, EnrichmentError> {
        let prompt = PromptTemplate::title().render(text);
        let request = CompletionRequest::new(RequestKind::Title, &self.system_prompt, prompt)
            .temperature(self.temperature);

        let answer = self.call_with_retry(request, cancel).await?;
        Ok(first_line(&answer))
    }

    /// Proofread a segment, adding punctuation and fixing obvious typos
    pub async fn proofread(&self, text: &str, cancel: &CancellationToken) -> Result<String, EnrichmentError> {
        let prompt = PromptTemplate::proofread().render(text);
        let request = CompletionRequest::new(RequestKind::Proofread, &self.system_prompt, prompt)
            .temperature(self.temperature);

        let answer = first_line(&self.call_with_retry(request, cancel).await?);
        let before = content_len(text);
        let after = content_len(&answer);
        if before != after {
            debug!("Proofreading changed segment length from {} to {} characters (punctuation excluded)", before, after);
        }
        Ok(answer)
    }

    /// Round-trip a tiny request to check settings
    pub async fn test_connection(&self) -> Result<(), EnrichmentError> {
        self.provider.test_connection().await?;
        Ok(())
    }

    async fn call_with_retry(&self, request: CompletionRequest, cancel: &CancellationToken) -> Result<String, EnrichmentError> {
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(EnrichmentError::Cancelled);
            }

            attempts += 1;
            match self.provider.complete(request.clone()).await {
                Ok(response) => {
                    let text = response.text.trim();
                    if text.is_empty() {
                        return Err(EnrichmentError::RemoteCallFailed(ProviderError::ParseError(
                            "Service returned an empty completion".to_string(),
                        )));
                    }
                    return Ok(text.to_string());
                }
                Err(e) if e.is_rate_limited() => {
                    if !self.retry.allows_another_attempt(attempts) {
                        return Err(EnrichmentError::RemoteCallFailed(ProviderError::RateLimitExceeded(
                            format!("retry budget of {} attempts exhausted", attempts),
                        )));
                    }

                    let budget = self.retry.max_attempts
                        .map_or_else(|| "unbounded".to_string(), |max| max.to_string());
                    let message = format!(
                        "Rate limited, retrying ({}/{}) in {} ms",
                        attempts,
                        budget,
                        self.retry.backoff.as_millis()
                    );
                    warn!("{}", message);
                    if let Some(events) = &self.events {
                        events.log(message);
                    }

                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => return Err(EnrichmentError::RemoteCallFailed(e)),
            }
        }
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Character count ignoring punctuation and whitespace
fn content_len(text: &str) -> usize {
    text.chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation() && !is_cjk_punctuation(*c))
        .count()
}

fn is_cjk_punctuation(c: char) -> bool {
    matches!(c, '\u{3000}'..='\u{303F}' | '\u{FF01}'..='\u{FF0F}' | '\u{FF1A}'..='\u{FF20}')
}
