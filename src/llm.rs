use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SYSTEM_PROMPT: &str = "You are a legal assistant trained to answer only in the \
domain of Indian law. \
Respond in a warm tone, as if the user is talking to their own lawyer. \
Give accurate and concise information using IPC/BNS sections, and include helpline numbers \
or step-by-step FIR filing procedures wherever relevant. \
State the source of the information, specifically whether it comes from the provided \
database context or from general knowledge. \
Do not bold or otherwise format any text; use plain text only. \
If the question is outside law, say: 'I'm sorry, I can only assist with legal questions.'";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.0,
            max_tokens: 512,
            timeout_secs: 60,
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("environment variable {0} is not set")]
    MissingCredential(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("generation request timed out")]
    Timeout,

    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("generation service rejected the API key ({0})")]
    Unauthorized(StatusCode),

    #[error("generation service rate limit hit{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("generation service returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("generation service returned no completion text")]
    EmptyCompletion,
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

/// Produces an answer for a question, optionally grounded in retrieved text.
pub trait Generator: Send + Sync {
    fn complete(&self, question: &str, context: Option<&str>) -> Result<String, GenerationError>;
}

/// Blocking client for Groq's OpenAI-compatible chat completions API.
pub struct GroqClient {
    client: Client,
    endpoint: String,
    config: LLMConfig,
}

impl GroqClient {
    /// Reads the API key from the configured environment variable.
    pub fn from_env(config: LLMConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GenerationError::MissingCredential(config.api_key_env.clone()))?;
        Self::new(config, &api_key)
    }

    pub fn new(config: LLMConfig, api_key: &str) -> Result<Self, GenerationError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| GenerationError::Client("invalid API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| GenerationError::Client(e.to_string()))?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        Ok(GroqClient {
            client,
            endpoint,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn construct_request(&self, question: &str, context: &str) -> ChatRequest<'_> {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        }];
        if !context.trim().is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: format!("Context:\n{context}"),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: question.to_string(),
        });

        ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages,
        }
    }
}

impl Generator for GroqClient {
    fn complete(&self, question: &str, context: Option<&str>) -> Result<String, GenerationError> {
        let request = self.construct_request(question, context.unwrap_or_default());

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_failure(status, body, retry_after_secs));
        }

        let body = resp.text().map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::Transport(e.to_string())
            }
        })?;
        extract_answer(&body)
    }
}

fn classify_failure(
    status: StatusCode,
    body: String,
    retry_after_secs: Option<u64>,
) -> GenerationError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Unauthorized(status),
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited { retry_after_secs },
        _ => GenerationError::Status { status, body },
    }
}

/// Takes the first choice's text from a chat completions response body.
fn extract_answer(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(GenerationError::EmptyCompletion)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
