//! OpenAI-compatible chat-completions classifier
//!
//! One POST to `{base_url}/chat/completions` per request: the stage
//! instructions go in the system message, the record context in the user
//! message, and the first choice's content is the answer. No retries.

use crate::prompts::system_prompt;
use async_trait::async_trait;
use rar_core::{ApiConfig, Classifier, ClassifierError, ClassifyRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Longest provider error text kept in a `ClassifierError::Provider`
const MAX_ERROR_CHARS: usize = 300;

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Classifier backed by an OpenAI-compatible HTTP API
#[derive(Clone)]
pub struct OpenAiClassifier {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClassifier")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClassifier {
    /// Build a client from the `api` config section
    ///
    /// # Errors
    /// `ClassifierError::Unavailable` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClassifierError::Unavailable(format!("http client: {e}")))?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&config.base_url),
            api_key: config.key.clone(),
            model: config.model_name.clone(),
        })
    }

    /// Full chat-completions URL
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Model identifier sent with each request
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn build_request<'a>(
        &'a self,
        request: &'a ClassifyRequest,
    ) -> Result<ChatRequest<'a>, ClassifierError> {
        let instructions = system_prompt(request.stage).ok_or_else(|| {
            ClassifierError::Unavailable(format!("stage {} is not classifier-backed", request.stage))
        })?;

        Ok(ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: instructions,
                },
                ChatMessage {
                    role: "user",
                    content: &request.context,
                },
            ],
        })
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, request: &ClassifyRequest) -> Result<String, ClassifierError> {
        let body = self.build_request(request)?;
        debug!(stage = %request.stage, record = %request.record_id, "chat completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), record = %request.record_id, "provider rejected request");
            return Err(ClassifierError::Provider {
                status: status.as_u16(),
                message: provider_message(&text),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Transport(format!("malformed response: {e}")))?;
        first_content(parsed)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// `{base_url}/chat/completions`, tolerating a trailing slash
pub(crate) fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim().trim_end_matches('/'))
}

/// Content of the first choice, if non-blank
pub(crate) fn first_content(response: ChatResponse) -> Result<String, ClassifierError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(ClassifierError::EmptyResponse)
}

/// `error.message` of an OpenAI-style error body, else the raw text
pub(crate) fn provider_message(body: &str) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    message.chars().take(MAX_ERROR_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rar_core::Stage;

    fn config(base_url: &str) -> ApiConfig {
        ApiConfig {
            key: "sk-test".to_string(),
            base_url: base_url.to_string(),
            model_name: "deepseek-chat".to_string(),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(
            chat_endpoint("https://api.deepseek.com/v1"),
            "https://api.deepseek.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("http://localhost:8000/v1/ "),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn request_carries_instructions_and_context() {
        let classifier = OpenAiClassifier::new(&config("http://localhost/v1")).unwrap();
        let request = ClassifyRequest::new(Stage::Severity, "URS-1", "潜在失效后果：导致数据丢失");

        let body = serde_json::to_value(classifier.build_request(&request).unwrap()).unwrap();

        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("严重性"));
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "潜在失效后果：导致数据丢失");
    }

    #[test]
    fn matrix_stage_is_not_sent() {
        let classifier = OpenAiClassifier::new(&config("http://localhost/v1")).unwrap();
        let request = ClassifyRequest::new(Stage::RiskLevel, "URS-1", "");
        assert!(matches!(
            classifier.build_request(&request),
            Err(ClassifierError::Unavailable(_))
        ));
    }

    #[test]
    fn first_choice_content_is_the_answer() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"中"}},{"message":{"content":"高"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(response), Ok("中".to_string()));
    }

    #[test]
    fn missing_or_blank_content_is_empty_response() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"choices":[{"message":{"content":"  \n"}}]}"#,
        ] {
            let response: ChatResponse = serde_json::from_str(body).unwrap();
            assert_eq!(first_content(response), Err(ClassifierError::EmptyResponse), "{body}");
        }
    }

    #[test]
    fn provider_message_prefers_error_field() {
        assert_eq!(
            provider_message(r#"{"error":{"message":"Invalid API key","type":"auth"}}"#),
            "Invalid API key"
        );
        assert_eq!(provider_message(" Bad Gateway \n"), "Bad Gateway");
        assert_eq!(provider_message(&"x".repeat(1000)).len(), MAX_ERROR_CHARS);
    }

    #[test]
    fn debug_hides_the_key() {
        let classifier = OpenAiClassifier::new(&config("http://localhost/v1")).unwrap();
        assert!(!format!("{classifier:?}").contains("sk-test"));
        assert_eq!(classifier.name(), "deepseek-chat");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let classifier = OpenAiClassifier::new(&config("http://127.0.0.1:9/v1")).unwrap();
        let request = ClassifyRequest::new(Stage::FailureEvent, "URS-1", "系统应支持导出");

        let err = classifier.classify(&request).await.unwrap_err();
        assert!(matches!(err, ClassifierError::Transport(_)), "{err:?}");
        assert!(err.is_retryable());
    }
}
