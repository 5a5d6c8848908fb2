//! Generative-model boundary.
//!
//! A [`ModelInvoker`] turns a rendered prompt plus the expected output shape
//! into raw model text. Parsing and validating that text is the flow
//! runtime's job; the invoker only reports transport and provider failures.

mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use http::HttpModelInvoker;

/// Content-safety categories understood by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
}

/// Blocking threshold for a [`HarmCategory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockLowAndAbove,
    BlockMediumAndAbove,
    BlockOnlyHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

impl SafetySetting {
    pub fn new(category: HarmCategory, threshold: HarmBlockThreshold) -> Self {
        Self {
            category,
            threshold,
        }
    }
}

/// Per-flow tunables, passed to the provider unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelConfig {
    /// Overrides the configured model for this flow
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Empty means provider defaults
    pub safety_settings: Vec<SafetySetting>,
}

/// One model call.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    /// Flow name, for logging and provider-side schema names
    pub flow: &'a str,
    pub prompt: &'a str,
    /// JSON Schema of the expected output
    pub output_schema: &'a serde_json::Value,
    pub config: &'a ModelConfig,
}

/// Hosted generative model.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Return the raw generated text for `request`.
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<String, ProviderError>;
}

/// Bounds every call of the wrapped invoker by a timeout.
pub struct WithTimeout<M> {
    inner: M,
    timeout: Duration,
}

impl<M: ModelInvoker> WithTimeout<M> {
    pub fn new(inner: M, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<M: ModelInvoker> ModelInvoker for WithTimeout<M> {
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<String, ProviderError> {
        match tokio::time::timeout(self.timeout, self.inner.invoke(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(flow = request.flow, timeout = ?self.timeout, "Model call timed out");
                Err(ProviderError::Timeout(self.timeout))
            }
        }
    }
}
