// Completion Provider Service
// Issues chat-completion requests with per-call timeout, retry with backoff,
// and classification of failures into retryable and terminal errors

use crate::models::TokenUsage;
use crate::services::config_store::{ApiConfig, ENV_API_KEY, ENV_API_URL};
use crate::services::token_monitor::TokenMonitor;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Missing required configuration: {field}")]
    Configuration { field: &'static str },
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("Transient server error: {message}")]
    TransientServer { status: Option<u16>, message: String },
    #[error("API error: {status} - {message}")]
    PermanentClient { status: u16, message: String },
    #[error("Invalid response format from completion API")]
    MalformedResponse { raw: String },
    #[error("Failed to encode request: {0}")]
    Encode(String),
}

impl ExecutorError {
    /// Server-side failures, dropped connections and malformed success bodies are retried.
    /// Timeouts abort immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientServer { .. } | Self::MalformedResponse { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
}

/// One outbound POST as handed to the transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub api_key: String,
    pub request_id: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// HTTP boundary of the executor. Implementations only move bytes; status
/// classification and retries live in [`RequestExecutor`].
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

pub struct HttpTransport {
    client: Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        // Per-call timeouts are applied by the executor
        let client = Client::builder().build().unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .header("Authorization", format!("Bearer {}", request.api_key))
            .header("Content-Type", "application/json")
            .header("X-Request-ID", &request.request_id)
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// Everything needed for one completion call, built per call and then discarded
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Label used for token accounting and logs
    pub label: String,
    pub endpoint: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_jitter: Duration,
}

#[derive(Debug, Clone)]
pub struct RawCompletion {
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub attempts: u32,
    pub latency_ms: i64,
}

/// Delay before retry number `attempt + 1`, without jitter: `base * 2^attempt`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

pub struct RequestExecutor {
    transport: Arc<dyn CompletionTransport>,
    api_key: String,
    base_url: String,
    settings: ApiConfig,
    token_monitor: Arc<TokenMonitor>,
}

impl RequestExecutor {
    pub fn new(settings: &ApiConfig, token_monitor: Arc<TokenMonitor>) -> Result<Self, ExecutorError> {
        Self::with_transport(settings, Arc::new(HttpTransport::new()), token_monitor)
    }

    /// Validate the API settings once; a missing key or base URL is fatal
    pub fn with_transport(
        settings: &ApiConfig,
        transport: Arc<dyn CompletionTransport>,
        token_monitor: Arc<TokenMonitor>,
    ) -> Result<Self, ExecutorError> {
        let api_key = non_blank(settings.api_key.as_deref())
            .ok_or(ExecutorError::Configuration { field: ENV_API_KEY })?;
        let base_url = non_blank(settings.base_url.as_deref())
            .ok_or(ExecutorError::Configuration { field: ENV_API_URL })?;

        Ok(Self {
            transport,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings: settings.clone(),
            token_monitor,
        })
    }

    pub fn token_monitor(&self) -> &Arc<TokenMonitor> {
        &self.token_monitor
    }

    /// Build a chat request config using the executor's timeout and retry settings
    pub fn chat_config(
        &self,
        label: &str,
        model: &str,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> RequestConfig {
        RequestConfig {
            label: label.to_string(),
            endpoint: format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH),
            model: model.to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            max_tokens,
            timeout: self.settings.timeout(),
            max_retries: self.settings.max_retries,
            retry_base_delay: self.settings.retry_base_delay(),
            retry_jitter: self.settings.retry_jitter(),
        }
    }

    pub async fn execute(&self, config: &RequestConfig) -> Result<RawCompletion, ExecutorError> {
        let body = serde_json::to_string(&ChatRequest {
            model: &config.model,
            messages: &config.messages,
            max_tokens: config.max_tokens,
        })
        .map_err(|e| ExecutorError::Encode(e.to_string()))?;

        let mut attempt: u32 = 0;
        loop {
            let request_id = Uuid::new_v4().to_string();
            match self.attempt_once(config, &body, &request_id).await {
                Ok(mut completion) => {
                    completion.attempts = attempt + 1;
                    if let Some(usage) = completion.usage {
                        self.token_monitor.record(&config.label, usage, config.max_tokens);
                    }
                    info!(
                        request_id = %request_id,
                        "[EXECUTOR] {} ok model={} attempt={} latency_ms={}",
                        config.label, config.model, completion.attempts, completion.latency_ms
                    );
                    return Ok(completion);
                }
                Err(e) if e.is_retryable() && attempt < config.max_retries => {
                    let delay = backoff_delay(config.retry_base_delay, attempt)
                        + random_jitter(config.retry_jitter);
                    warn!(
                        request_id = %request_id,
                        "[EXECUTOR] {} failed ({}), retrying ({}/{}) after {}ms",
                        config.label,
                        e,
                        attempt + 1,
                        config.max_retries,
                        delay.as_millis()
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        request_id = %request_id,
                        "[EXECUTOR] {} giving up after {} attempt(s): {}",
                        config.label,
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        config: &RequestConfig,
        body: &str,
        request_id: &str,
    ) -> Result<RawCompletion, ExecutorError> {
        debug!(request_id = %request_id, "[EXECUTOR] POST {}", config.endpoint);

        let start = Instant::now();
        let request = TransportRequest {
            url: config.endpoint.clone(),
            api_key: self.api_key.clone(),
            request_id: request_id.to_string(),
            body: body.to_string(),
        };

        let response = match tokio::time::timeout(config.timeout, self.transport.post(request)).await {
            Err(_) => {
                return Err(ExecutorError::Timeout {
                    timeout_ms: config.timeout.as_millis() as u64,
                })
            }
            Ok(Err(TransportError::Connection(message))) => {
                return Err(ExecutorError::TransientServer {
                    status: None,
                    message,
                })
            }
            Ok(Ok(response)) => response,
        };

        let latency_ms = start.elapsed().as_millis() as i64;
        debug!(
            request_id = %request_id,
            "[EXECUTOR] status={} latency_ms={}",
            response.status,
            latency_ms
        );

        match response.status {
            200..=299 => {}
            500..=599 => {
                return Err(ExecutorError::TransientServer {
                    status: Some(response.status),
                    message: response.body,
                })
            }
            status => {
                return Err(ExecutorError::PermanentClient {
                    status,
                    message: response.body,
                })
            }
        }

        let (content, usage) = parse_completion(&response.body)?;
        Ok(RawCompletion {
            content,
            usage,
            attempts: 1,
            latency_ms,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Pull `choices[0].message.content` out of a success body
fn parse_completion(body: &str) -> Result<(String, Option<TokenUsage>), ExecutorError> {
    let malformed = || ExecutorError::MalformedResponse {
        raw: body.to_string(),
    };

    let data: ChatResponse = serde_json::from_str(body).map_err(|_| malformed())?;

    let content = data
        .choices
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.clone())
        .filter(|c| !c.is_empty())
        .ok_or_else(malformed)?;

    Ok((content, data.usage))
}
