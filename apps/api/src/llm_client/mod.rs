//! LLM Client: the single point of entry for all Claude API calls in the pipeline.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! All LLM interactions MUST go through this module.
//!
//! Each call is a single attempt. Backoff is owned by `crate::retry`, which
//! wraps the callers in `generation`.

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::{ErrorKind, PipelineError};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        let message = err.to_string();
        match err {
            LlmError::Http(e) if e.is_timeout() => PipelineError::new(ErrorKind::Timeout, message),
            LlmError::Http(e) => {
                PipelineError::new(ErrorKind::UpstreamError, format!("LLM network error: {e}"))
            }
            LlmError::Api { status, .. } => {
                let kind = match status {
                    429 => ErrorKind::RateLimited,
                    401 | 403 => ErrorKind::AuthFailed,
                    _ => ErrorKind::UpstreamError,
                };
                let err = PipelineError::new(kind, message).with_status(status);
                if kind == ErrorKind::UpstreamError {
                    err.with_recoverable(status >= 500)
                } else {
                    err
                }
            }
            LlmError::Parse(_) | LlmError::EmptyContent => {
                PipelineError::new(ErrorKind::MalformedOutput, message)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by profile extraction, fit analysis and
/// cover-letter generation.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Makes one raw call to the Claude API, returning the full response object.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            // Try to parse error message
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }

    /// Calls the LLM and returns the text response with any code fences removed.
    pub async fn call_text(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let text = strip_json_fences(text);
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text.to_string())
    }

    /// Convenience method that calls the LLM and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let text = self.call_text(prompt, system).await?;
        serde_json::from_str(&text).map_err(LlmError::Parse)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_rate_limit_maps_to_recoverable_rate_limited() {
        let err: PipelineError = LlmError::Api {
            status: 429,
            message: "slow down".to_string(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.status, Some(429));
        assert!(err.recoverable);
    }

    #[test]
    fn test_api_status_mapping() {
        let auth: PipelineError = LlmError::Api {
            status: 401,
            message: "bad key".to_string(),
        }
        .into();
        assert_eq!(auth.kind, ErrorKind::AuthFailed);
        assert!(!auth.recoverable);

        let overloaded: PipelineError = LlmError::Api {
            status: 529,
            message: "overloaded".to_string(),
        }
        .into();
        assert_eq!(overloaded.kind, ErrorKind::UpstreamError);
        assert!(overloaded.recoverable);

        let bad_request: PipelineError = LlmError::Api {
            status: 400,
            message: "prompt too long".to_string(),
        }
        .into();
        assert!(!bad_request.recoverable);
    }

    #[test]
    fn test_unparseable_output_is_malformed_and_recoverable() {
        let parse = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: PipelineError = LlmError::Parse(parse).into();
        assert_eq!(err.kind, ErrorKind::MalformedOutput);
        assert!(err.recoverable);

        let empty: PipelineError = LlmError::EmptyContent.into();
        assert_eq!(empty.kind, ErrorKind::MalformedOutput);
    }

    #[tokio::test]
    async fn test_dropped_connection_is_retryable_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let sent = reqwest::Client::new()
            .post(format!("http://{addr}/v1/messages"))
            .body("{}")
            .send()
            .await
            .unwrap_err();
        let err: PipelineError = LlmError::Http(sent).into();

        assert_eq!(err.kind, ErrorKind::UpstreamError);
        assert!(err.message.starts_with("LLM network error"));
        assert!(crate::retry::is_retryable(
            &err,
            &crate::retry::RetryPolicy::default().retryable_patterns
        ));
    }
}
