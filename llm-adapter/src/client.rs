//! OpenAI-compatible chat-completion client (enum-dispatch, non-streaming).
//!
//! Construction validates the config; `generate_suggestions` enforces the
//! hard wall-clock deadline and retries transient failures. 401/403 are
//! surfaced immediately: retrying a bad key only burns quota.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AiError, AiResult};
use crate::normalize::parse_suggestions;
use crate::prompt::build_prompt;
use crate::types::{Suggestion, SuggestionRequest};

/// Default wall-clock deadline for one generation call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
/// Attempts per call (first try + retries) on transient errors.
pub const MAX_ATTEMPTS: u32 = 3;

/// Complete configuration for one tenant's generation calls.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// OpenAI-compatible base endpoint, e.g. "https://api.openai.com".
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_suggestions: usize,
    pub timeout: Duration,
}

impl AiConfig {
    pub fn new(endpoint: String, api_key: String, model: String, max_suggestions: usize) -> Self {
        Self {
            endpoint,
            api_key,
            model,
            max_suggestions,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Thin enum client; additional providers dispatch here.
pub enum LlmClient {
    OpenAi(OpenAiService),
}

impl LlmClient {
    pub fn from_config(cfg: AiConfig) -> AiResult<Self> {
        Ok(Self::OpenAi(OpenAiService::new(cfg)?))
    }

    /// Generates normalized suggestions for the request.
    pub async fn generate_suggestions(&self, req: &SuggestionRequest) -> AiResult<Vec<Suggestion>> {
        match self {
            Self::OpenAi(svc) => svc.generate_suggestions(req).await,
        }
    }
}

/// Concrete client for `/v1/chat/completions`.
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: AiConfig,
    url_chat: String,
}

impl OpenAiService {
    pub fn new(cfg: AiConfig) -> AiResult<Self> {
        if cfg.api_key.trim().is_empty() {
            return Err(AiError::InvalidConfig("api key must not be empty"));
        }
        if cfg.model.trim().is_empty() {
            return Err(AiError::InvalidConfig("model must not be empty"));
        }
        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AiError::InvalidConfig(
                "endpoint must start with http:// or https://",
            ));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key))
                .map_err(|_| AiError::InvalidConfig("api key is not a valid header value"))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .build()?;

        let url_chat = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));

        info!(model = %cfg.model, timeout_secs = cfg.timeout.as_secs(), "llm client ready");
        Ok(Self {
            client,
            cfg,
            url_chat,
        })
    }

    pub async fn generate_suggestions(&self, req: &SuggestionRequest) -> AiResult<Vec<Suggestion>> {
        let prompt = build_prompt(req);
        let started = Instant::now();
        let deadline = self.cfg.timeout;

        let mut last_err: Option<AiError> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let remaining = deadline.checked_sub(started.elapsed());
            let Some(remaining) = remaining else {
                return Err(last_err.unwrap_or(AiError::Timeout));
            };

            debug!(
                attempt,
                check_only = req.is_check_only(),
                prompt_chars = prompt.user.len(),
                "llm generate"
            );

            match self.call_once(&prompt.system, &prompt.user, remaining).await {
                Ok(raw) => {
                    debug!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "llm response received"
                    );
                    return parse_suggestions(&raw, self.cfg.max_suggestions);
                }
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    warn!(attempt, reason = e.reason_label(), "llm attempt failed; retrying");
                    // 1s, 2s between attempts; the deadline still rules.
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tokio::time::sleep(backoff.min(remaining)).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(AiError::Timeout))
    }

    async fn call_once(
        &self,
        system: &str,
        user: &str,
        remaining: Duration,
    ) -> AiResult<String> {
        let body = ChatCompletionRequest {
            model: &self.cfg.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat { kind: "json_object" },
        };

        // Dropping the future on deadline aborts the request and releases
        // the connection; reqwest's own timeout stays as the outer bound.
        let send = self
            .client
            .post(&self.url_chat)
            .timeout(remaining)
            .json(&body)
            .send();

        let resp = match tokio::time::timeout(remaining, send).await {
            Ok(r) => r?,
            Err(_) => return Err(AiError::Timeout),
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => AiError::Auth(status.as_u16()),
                429 => AiError::RateLimited,
                code => AiError::HttpStatus(code),
            });
        }

        let parsed: ChatCompletionResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(AiError::Empty)?;
        Ok(content)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AiConfig {
        AiConfig::new(
            "https://api.openai.com".into(),
            "test-key".into(),
            "gpt-4o-mini".into(),
            3,
        )
    }

    #[test]
    fn constructor_validates() {
        assert!(OpenAiService::new(cfg()).is_ok());

        let mut bad = cfg();
        bad.api_key = " ".into();
        assert!(matches!(
            OpenAiService::new(bad),
            Err(AiError::InvalidConfig(_))
        ));

        let mut bad = cfg();
        bad.endpoint = "ftp://nope".into();
        assert!(matches!(
            OpenAiService::new(bad),
            Err(AiError::InvalidConfig(_))
        ));
    }

    #[test]
    fn response_shape_parses() {
        let raw = r#"{"choices": [{"message": {"role": "assistant",
            "content": "{\"suggestions\": []}"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert!(parsed.choices[0].message.content.contains("suggestions"));
    }
}
