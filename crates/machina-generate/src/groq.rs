//! OpenAI-compatible chat-completions client for child generation.
//!
//! Defaults to the Groq endpoint; any compatible base URL works. Requires
//! the `GROQ_API_KEY` environment variable unless a key is passed
//! explicitly.

use crate::payload::parse_children;
use crate::prompt::{self, DEFAULT_CHILD_COUNT};
use crate::{ChildGenerator, GenerateError, GenerationRequest};
use machina_core::PartSpec;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const DEFAULT_GROQ_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "gemma2-9b-it";
const DEFAULT_TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct GroqClient {
    base_url: String,
    model: String,
    temperature: f64,
    timeout: Duration,
    /// Exact top-level arity to enforce on responses; `None` accepts any
    /// non-empty list.
    expected_children: Option<usize>,
    client: Client,
}

impl GroqClient {
    /// Build a client reading the API key from `GROQ_API_KEY`.
    pub fn new(model: &str) -> Result<Self, GenerateError> {
        let api_key = env::var("GROQ_API_KEY").map_err(|_| GenerateError::Api {
            status: 401,
            message: "GROQ_API_KEY environment variable not set".to_string(),
        })?;
        Self::with_api_key(model, &api_key)
    }

    pub fn with_api_key(model: &str, api_key: &str) -> Result<Self, GenerateError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                GenerateError::InvalidPayload(format!("invalid API key format: {e}"))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GenerateError::Network(format!("failed to create client: {e}")))?;

        Ok(Self {
            base_url: DEFAULT_GROQ_URL.to_string(),
            model: model.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(60),
            expected_children: Some(DEFAULT_CHILD_COUNT),
            client,
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_expected_children(mut self, expected: Option<usize>) -> Self {
        self.expected_children = expected;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_children(
        &self,
        request: GenerationRequest,
    ) -> Result<Vec<PartSpec>, GenerateError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt::system_prompt(&request),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt::user_prompt(&request),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(component = %request.name, depth = request.ancestry.len(), "requesting children");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout
                } else if e.is_connect() {
                    GenerateError::Network(format!("connection failed: {e}"))
                } else {
                    GenerateError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(err) => err.error.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            return Err(GenerateError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::InvalidPayload(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(GenerateError::EmptyResponse);
        }

        parse_children(&content, self.expected_children)
    }
}

impl ChildGenerator for GroqClient {
    fn generate_children(
        &self,
        request: GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PartSpec>, GenerateError>> + Send + '_>> {
        Box::pin(self.request_children(request))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let client = GroqClient::with_api_key(DEFAULT_MODEL, "test-key")
            .unwrap()
            .with_base_url("http://localhost:9999/v1/")
            .with_temperature(0.0)
            .with_expected_children(None);
        assert_eq!(client.base_url, "http://localhost:9999/v1");
        assert_eq!(client.temperature, 0.0);
        assert_eq!(client.expected_children, None);
        assert_eq!(client.model(), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_maps_to_network_error() {
        let client = GroqClient::with_api_key(DEFAULT_MODEL, "test-key")
            .unwrap()
            .with_base_url("http://127.0.0.1:1")
            .with_timeout(Duration::from_millis(200));
        let err = client
            .generate_children(GenerationRequest {
                name: "Bicycle".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Network(_) | GenerateError::Timeout
        ));
    }
}
