//! Backend adapter abstraction and implementations
//!
//! Provides the [`BackendAdapter`] trait, the [`BackendRegistry`] catalog,
//! and production-ready adapters:
//! - [`EchoBackend`]: Testing/demo adapter
//! - [`GeminiBackend`]: Google Gemini API (gemini-pro, gemini-1.5-flash)
//! - [`OpenAiBackend`]: OpenAI chat completions API
//! - [`AnthropicBackend`]: Anthropic Claude messages API
//!
//! ## Environment Variables
//!
//! - `GEMINI_API_KEY`: Required for GeminiBackend
//! - `OPENAI_API_KEY`: Required for OpenAiBackend
//! - `ANTHROPIC_API_KEY`: Required for AnthropicBackend

use crate::{OrchestraError, RequestContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Trait for text-generation backends.
///
/// Implementations must be thread-safe (Send + Sync) for use across tasks.
/// The trait is object-safe to allow dynamic dispatch via
/// `Arc<dyn BackendAdapter>`.
///
/// Every backend is an opaque capability `generate(prompt) -> text`; the
/// engine never depends on any backend-specific wire format.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Generate a completion for the given prompt.
    ///
    /// `context` is opaque per-request metadata passed through untouched by
    /// the routing layer; adapters are free to ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestraError::BackendInvocation`] on transport, auth,
    /// quota, or response-parsing failure.
    async fn generate(
        &self,
        prompt: &str,
        context: &RequestContext,
    ) -> Result<String, OrchestraError>;
}

// ============================================================================
// Backend Registry
// ============================================================================

/// Catalog of named generation backends.
///
/// Immutable after construction — register every adapter at startup, then
/// share via `Arc`. Lookup failures surface as
/// [`OrchestraError::BackendNotConfigured`] so the routing layer can decide
/// whether the fallback path applies.
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn BackendAdapter>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register an adapter under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, adapter: Arc<dyn BackendAdapter>) {
        self.backends.insert(name.into(), adapter);
    }

    /// Return `true` if `name` is a registered backend.
    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Return the sorted list of registered backend names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke the named backend with the given prompt and context.
    ///
    /// # Errors
    ///
    /// - [`OrchestraError::BackendNotConfigured`] if `name` is unknown.
    /// - [`OrchestraError::BackendInvocation`] if the adapter call fails.
    pub async fn invoke(
        &self,
        name: &str,
        prompt: &str,
        context: &RequestContext,
    ) -> Result<String, OrchestraError> {
        let adapter = self
            .backends
            .get(name)
            .ok_or_else(|| OrchestraError::BackendNotConfigured(name.to_string()))?;
        adapter.generate(prompt, context).await
    }
}

// ============================================================================
// Echo Backend (Testing)
// ============================================================================

/// Dummy echo backend for testing and demos.
///
/// Returns the prompt unchanged after a simulated delay. Useful for engine
/// smoke tests without real model dependencies.
pub struct EchoBackend {
    /// Simulated generation delay
    pub delay_ms: u64,
}

impl EchoBackend {
    /// Create an echo backend with the default 10ms delay.
    pub fn new() -> Self {
        Self { delay_ms: 10 }
    }

    /// Create an echo backend with a custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for EchoBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendAdapter for EchoBackend {
    async fn generate(
        &self,
        prompt: &str,
        _context: &RequestContext,
    ) -> Result<String, OrchestraError> {
        // Simulate generation latency
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(prompt.to_string())
    }
}

// ============================================================================
// Gemini Backend
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

/// Gemini API request payload
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

/// Gemini API response
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

/// Google Gemini API backend (gemini-pro, gemini-1.5-flash, etc.)
///
/// Requires the GEMINI_API_KEY environment variable.
///
/// ## Example
///
/// ```no_run
/// use model_orchestra::GeminiBackend;
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), model_orchestra::OrchestraError> {
/// let backend = Arc::new(GeminiBackend::new("gemini-1.5-flash")?);
/// # Ok(()) }
/// ```
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiBackend {
    /// Create a new Gemini backend for the given model.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestraError::Config`] if GEMINI_API_KEY is not set.
    pub fn new(model: impl Into<String>) -> Result<Self, OrchestraError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| OrchestraError::Config("GEMINI_API_KEY not set".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(30),
        })
    }

    /// Override the API base URL (useful for testing against a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl BackendAdapter for GeminiBackend {
    async fn generate(
        &self,
        prompt: &str,
        _context: &RequestContext,
    ) -> Result<String, OrchestraError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| OrchestraError::BackendInvocation {
                backend: self.model.clone(),
                message: format!("Gemini request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OrchestraError::BackendInvocation {
                backend: self.model.clone(),
                message: format!("Gemini API error {status}: {error_text}"),
            });
        }

        let api_response: GeminiResponse =
            response
                .json()
                .await
                .map_err(|e| OrchestraError::BackendInvocation {
                    backend: self.model.clone(),
                    message: format!("Failed to parse response: {e}"),
                })?;

        let text = api_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| OrchestraError::BackendInvocation {
                backend: self.model.clone(),
                message: "No candidates in Gemini response".to_string(),
            })?;

        Ok(text)
    }
}

// ============================================================================
// OpenAI Backend
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

/// OpenAI API request payload
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

/// OpenAI API response
#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

/// OpenAI chat completions backend (gpt-3.5-turbo, gpt-4, etc.)
///
/// Requires the OPENAI_API_KEY environment variable.
///
/// ## Example
///
/// ```no_run
/// use model_orchestra::OpenAiBackend;
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), model_orchestra::OrchestraError> {
/// let backend = Arc::new(OpenAiBackend::new("gpt-3.5-turbo")?);
/// # Ok(()) }
/// ```
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend for the given model.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestraError::Config`] if OPENAI_API_KEY is not set.
    pub fn new(model: impl Into<String>) -> Result<Self, OrchestraError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| OrchestraError::Config("OPENAI_API_KEY not set".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: "https://api.openai.com".to_string(),
            timeout: Duration::from_secs(30),
        })
    }

    /// Override the API base URL (useful for testing against a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl BackendAdapter for OpenAiBackend {
    async fn generate(
        &self,
        prompt: &str,
        _context: &RequestContext,
    ) -> Result<String, OrchestraError> {
        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| OrchestraError::BackendInvocation {
                backend: self.model.clone(),
                message: format!("OpenAI request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OrchestraError::BackendInvocation {
                backend: self.model.clone(),
                message: format!("OpenAI API error {status}: {error_text}"),
            });
        }

        let api_response: OpenAiResponse =
            response
                .json()
                .await
                .map_err(|e| OrchestraError::BackendInvocation {
                    backend: self.model.clone(),
                    message: format!("Failed to parse response: {e}"),
                })?;

        let text = api_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| OrchestraError::BackendInvocation {
                backend: self.model.clone(),
                message: "No choices in OpenAI response".to_string(),
            })?;

        Ok(text)
    }
}

// ============================================================================
// Anthropic Backend
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

/// Anthropic API request payload
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    text: String,
}

/// Anthropic API response
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

/// Anthropic Claude messages API backend.
///
/// Requires the ANTHROPIC_API_KEY environment variable.
///
/// ## Example
///
/// ```no_run
/// use model_orchestra::AnthropicBackend;
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), model_orchestra::OrchestraError> {
/// let backend = Arc::new(
///     AnthropicBackend::new("claude-3-sonnet-20240229")?.with_max_tokens(4000),
/// );
/// # Ok(()) }
/// ```
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    timeout: Duration,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend for the given model.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestraError::Config`] if ANTHROPIC_API_KEY is not set.
    pub fn new(model: impl Into<String>) -> Result<Self, OrchestraError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| OrchestraError::Config("ANTHROPIC_API_KEY not set".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            max_tokens: 4000,
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(60),
        })
    }

    /// Set maximum tokens to generate
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the API base URL (useful for testing against a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl BackendAdapter for AnthropicBackend {
    async fn generate(
        &self,
        prompt: &str,
        _context: &RequestContext,
    ) -> Result<String, OrchestraError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| OrchestraError::BackendInvocation {
                backend: self.model.clone(),
                message: format!("Anthropic request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(OrchestraError::BackendInvocation {
                backend: self.model.clone(),
                message: format!("Anthropic API error {status}: {error_text}"),
            });
        }

        let api_response: AnthropicResponse =
            response
                .json()
                .await
                .map_err(|e| OrchestraError::BackendInvocation {
                    backend: self.model.clone(),
                    message: format!("Failed to parse response: {e}"),
                })?;

        let text = api_response
            .content
            .first()
            .map(|b| b.text.clone())
            .ok_or_else(|| OrchestraError::BackendInvocation {
                backend: self.model.clone(),
                message: "Empty content in Anthropic response".to_string(),
            })?;

        Ok(text)
    }
}
