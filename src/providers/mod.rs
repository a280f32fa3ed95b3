/*!
 * Provider implementations for the remote text service.
 *
 * This module contains client implementations behind a common trait:
 * - OpenAI: any OpenAI-compatible chat completions API (Moonshot, OpenAI, ...)
 * - Mock: scripted provider used by the test suite
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// What a completion request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Title,
    Proofread,
    ConnectionTest,
}

/// A single prompt sent to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Purpose of the request, used for logging and by test doubles
    pub kind: RequestKind,
    /// System message
    pub system: String,
    /// User prompt
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Optional output limit
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(kind: RequestKind, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.6,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Free-text completion returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Completion text
    pub text: String,
    /// Prompt tokens reported by the service
    pub prompt_tokens: Option<u64>,
    /// Completion tokens reported by the service
    pub completion_tokens: Option<u64>,
}

impl CompletionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_tokens: None,
            completion_tokens: None,
        }
    }
}

/// Common trait for all text service providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the enrichment client.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<CompletionResponse, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    ///
    /// # Returns
    /// * `Result<(), ProviderError>` - Ok if the connection is successful, or an error
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Check that the provider can be called at all, without a network round-trip
    fn check_credentials(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub mod mock;
pub mod openai;
