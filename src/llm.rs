//! LLM client abstraction and retry/backoff combinator.
//!
//! Generalizes the teacher's `AskAsync`/`RetryAsk` pair in `api.rs` (there
//! bound to one vendor's `awful_aj::api::ask`) into a crate-local trait so
//! the orchestration core has no hard dependency on any one provider's SDK.
//! The structured-output method selection is grounded on
//! `original_source/src/llm/providers.py`'s `get_structured_output_method`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::LlmError;

/// One turn in a chat conversation.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Which wire mechanism the provider/model pair should use to get structured
/// JSON output back, per spec §6: "provider-selected structured-output
/// method prioritized as json_schema > function_calling > json_mode".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredOutputMethod {
    JsonSchema,
    FunctionCalling,
    JsonMode,
}

/// Pure function, no runtime reflection, grounded on
/// `original_source/src/llm/providers.py::get_structured_output_method`.
///
/// OpenAI and Azure support `json_schema` strict mode on `gpt-4o*`/`gpt-4.1*`
/// families; Anthropic and most others only support tool-call-based
/// structured output (`function_calling`); everything else falls back to
/// `json_mode` (a system-prompt instruction plus best-effort JSON parsing).
pub fn structured_output_method(provider: &str, model: &str) -> StructuredOutputMethod {
    let provider = provider.to_ascii_lowercase();
    let model = model.to_ascii_lowercase();

    let supports_json_schema = matches!(provider.as_str(), "openai" | "azure")
        && (model.starts_with("gpt-4o") || model.starts_with("gpt-4.1") || model.starts_with("o3"));
    if supports_json_schema {
        return StructuredOutputMethod::JsonSchema;
    }

    let supports_function_calling = matches!(
        provider.as_str(),
        "openai" | "azure" | "anthropic" | "mistral" | "groq" | "deepseek" | "together" | "openrouter"
    );
    if supports_function_calling {
        return StructuredOutputMethod::FunctionCalling;
    }

    StructuredOutputMethod::JsonMode
}

/// Uniform provider contract, per spec §6: `Chat(msgs)` and
/// `ChatStructured(msgs, schema)`, both returning the [`LlmError`] taxonomy.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// `schema` is a JSON Schema object describing the desired output shape;
    /// implementations use whichever [`StructuredOutputMethod`] fits their
    /// provider/model, then deserialize the result into `T`.
    async fn chat_structured(&self, messages: &[ChatMessage], schema: &Value) -> Result<Value, LlmError>;

    fn provider(&self) -> &str;
    fn model(&self) -> &str;
}

/// Convenience helper for callers that want a typed result directly.
pub async fn chat_structured_as<T: DeserializeOwned>(
    client: &dyn LlmClient,
    messages: &[ChatMessage],
    schema: &Value,
) -> Result<T, LlmError> {
    let value = client.chat_structured(messages, schema).await?;
    serde_json::from_value(value).map_err(|e| LlmError::Parse(e.to_string()))
}

/// Retry decorator around any fallible async operation, grounded on the
/// teacher's `RetryAsk<T>` in `api.rs`: exponential backoff with jitter,
/// capped at `max_delay`, logging each failed attempt at `warn!` and the
/// final exhaustion at `error!`.
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay, max_delay: Duration::from_secs(30) }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32.wrapping_shl(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let jitter_ms = rand::rng().random_range(0..250);
        capped + Duration::from_millis(jitter_ms)
    }
}

/// Run `op` under `policy`, retrying on `Err` until `max_retries` is
/// exhausted. `op` is re-created on each attempt via the closure since
/// futures can't be replayed.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = std::time::Instant::now();
    let mut last_err = None;

    for attempt in 1..=policy.max_retries.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_retries {
                    last_err = Some(e);
                    break;
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max = policy.max_retries,
                    elapsed = ?start.elapsed(),
                    delay = ?delay,
                    error = %e,
                    "operation failed; retrying"
                );
                last_err = Some(e);
                tokio::time::sleep(delay).await;
            }
        }
    }

    let e = last_err.expect("loop always assigns on non-return path");
    error!(max = policy.max_retries, elapsed = ?start.elapsed(), error = %e, "operation exhausted retries");
    Err(e)
}

/// Reference OpenAI-compatible HTTP implementation of [`LlmClient`].
///
/// Supports any endpoint that speaks the `/v1/chat/completions` wire shape
/// (OpenAI, Azure OpenAI behind a compatible proxy, and most local/hosted
/// OpenAI-compatible servers). Authentication and rate-limit/timeout errors
/// are classified into [`LlmError`] at this boundary, matching spec §6's
/// "must expose a uniform error taxonomy" requirement for provider adapters.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    provider: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl OpenAiCompatibleClient {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: api_key.into(),
            provider: provider.into(),
            model: model.into(),
            temperature: 0.3,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn messages_json(&self, messages: &[ChatMessage]) -> Value {
        let role_str = |r: ChatRole| match r {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        Value::Array(
            messages
                .iter()
                .map(|m| serde_json::json!({"role": role_str(m.role), "content": m.content}))
                .collect(),
        )
    }

    async fn post_chat(&self, body: Value) -> Result<Value, LlmError> {
        with_retry(&self.retry, || async {
            let response = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(classify_transport_error)?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimit(format!("HTTP {status}")));
            }
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(LlmError::Auth(format!("HTTP {status}")));
            }
            if !status.is_success() {
                return Err(LlmError::Other(format!("HTTP {status}")));
            }

            response.json::<Value>().await.map_err(|e| LlmError::Parse(e.to_string()))
        })
        .await
    }

    fn extract_content(response: &Value) -> Result<String, LlmError> {
        response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| LlmError::Parse("response missing choices[0].message.content".into()))
    }

    fn extract_tool_call_arguments(response: &Value) -> Result<String, LlmError> {
        response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("tool_calls"))
            .and_then(|tc| tc.get(0))
            .and_then(|tc| tc.get("function"))
            .and_then(|f| f.get("arguments"))
            .and_then(|a| a.as_str())
            .map(str::to_string)
            .ok_or_else(|| LlmError::Parse("response missing tool_calls[0].function.arguments".into()))
    }
}

fn classify_transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(e.to_string())
    } else {
        LlmError::Other(e.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": self.messages_json(messages),
            "temperature": self.temperature,
        });
        let response = self.post_chat(body).await?;
        Self::extract_content(&response)
    }

    async fn chat_structured(&self, messages: &[ChatMessage], schema: &Value) -> Result<Value, LlmError> {
        let method = structured_output_method(&self.provider, &self.model);
        let body = match method {
            StructuredOutputMethod::JsonSchema => serde_json::json!({
                "model": self.model,
                "messages": self.messages_json(messages),
                "temperature": self.temperature,
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {"name": "analysis", "schema": schema, "strict": true},
                },
            }),
            StructuredOutputMethod::FunctionCalling => serde_json::json!({
                "model": self.model,
                "messages": self.messages_json(messages),
                "temperature": self.temperature,
                "tools": [{
                    "type": "function",
                    "function": {"name": "emit_analysis", "parameters": schema},
                }],
                "tool_choice": {"type": "function", "function": {"name": "emit_analysis"}},
            }),
            StructuredOutputMethod::JsonMode => serde_json::json!({
                "model": self.model,
                "messages": self.messages_json(messages),
                "temperature": self.temperature,
                "response_format": {"type": "json_object"},
            }),
        };

        let response = self.post_chat(body).await?;
        let raw = match method {
            StructuredOutputMethod::FunctionCalling => Self::extract_tool_call_arguments(&response)?,
            StructuredOutputMethod::JsonSchema | StructuredOutputMethod::JsonMode => Self::extract_content(&response)?,
        };
        serde_json::from_str(&raw).map_err(|e| LlmError::Parse(e.to_string()))
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_output_method_prefers_json_schema_for_gpt4o() {
        assert_eq!(structured_output_method("openai", "gpt-4o-mini"), StructuredOutputMethod::JsonSchema);
    }

    #[test]
    fn structured_output_method_falls_back_to_function_calling_for_anthropic() {
        assert_eq!(
            structured_output_method("anthropic", "claude-3-5-sonnet"),
            StructuredOutputMethod::FunctionCalling
        );
    }

    #[test]
    fn structured_output_method_falls_back_to_json_mode_for_unknown_provider() {
        assert_eq!(structured_output_method("ollama", "llama3"), StructuredOutputMethod::JsonMode);
    }

    #[tokio::test]
    async fn with_retry_stops_after_first_success() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: Result<u32, String> = with_retry(&policy, || async {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn with_retry_exhausts_after_max_retries() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: Result<u32, String> = with_retry(&policy, || async {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err("boom".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
