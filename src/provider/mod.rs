//! Backend client trait and the Converse wire adapter.

pub mod convert;
pub mod stream;
pub mod wire;

pub use convert::{from_converse_response, to_converse_request, ConversionContext};
pub use stream::{StreamAssembler, StreamDelta};

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::{DroverError, Result};

use wire::{ConverseRequest, ConverseResponse, ConverseStreamEvent};

/// Stream of wire events from the backend.
pub type EventStream = BoxStream<'static, Result<ConverseStreamEvent>>;

/// Backend seam: everything the engine needs from a model endpoint.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One non-streaming model call.
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse>;

    /// One streaming model call, yielding wire events in emission order.
    async fn converse_stream(&self, request: &ConverseRequest) -> Result<EventStream>;
}

const DEFAULT_BASE_URL: &str = "https://bedrock-runtime.us-east-1.amazonaws.com";
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// HTTP-backed [`ModelClient`] for Converse-shaped endpoints.
///
/// Non-streaming calls hit `POST {base}/model/{id}/converse` and are retried
/// once on a retryable failure; streaming calls hit `.../converse-stream`,
/// expect SSE `data:` lines carrying one JSON event each, and are never
/// retried.
pub struct HttpConverseClient {
    model: String,
    api_key: String,
    base_url: String,
}

impl HttpConverseClient {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn post(&self, suffix: &str, request: &ConverseRequest) -> reqwest::RequestBuilder {
        http_client()
            .post(format!("{}/model/{}/{suffix}", self.base_url, self.model))
            .bearer_auth(&self.api_key)
            .json(request)
    }

    async fn converse_once(&self, request: &ConverseRequest) -> Result<ConverseResponse> {
        let resp = self.post("converse", request).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if status != 200 {
            return Err(response_error(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ModelClient for HttpConverseClient {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse> {
        debug!(model = %self.model, "converse");

        match self.converse_once(request).await {
            Err(e) if e.is_retryable() => {
                let delay = match &e {
                    DroverError::RateLimited {
                        retry_after_ms: Some(ms),
                    } => Duration::from_millis(*ms),
                    _ => RETRY_BACKOFF,
                };
                warn!(error = %e, delay_ms = delay.as_millis() as u64, "retrying model call");
                tokio::time::sleep(delay).await;
                self.converse_once(request).await
            }
            outcome => outcome,
        }
    }

    async fn converse_stream(&self, request: &ConverseRequest) -> Result<EventStream> {
        debug!(model = %self.model, "converse_stream");

        let resp = self.post("converse-stream", request).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(response_error(status, &body));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(DroverError::Network(e));
                        break;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if let Some(data) = sse_payload(&line) {
                        // Unknown event kinds are skipped.
                        if let Ok(event) = serde_json::from_str::<ConverseStreamEvent>(data) {
                            yield Ok(event);
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Extract the JSON payload of an SSE `data:` line. Comments, blank lines and
/// the `[DONE]` sentinel carry no payload.
fn sse_payload(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    (data != "[DONE]").then_some(data)
}

fn response_error(status: u16, body: &str) -> DroverError {
    match status {
        401 | 403 => DroverError::Authentication(body.to_string()),
        429 => DroverError::RateLimited {
            retry_after_ms: retry_after_hint(body),
        },
        _ => DroverError::api(status, body),
    }
}

fn retry_after_hint(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["retry_after"].as_f64())
        .map(|s| (s * 1000.0) as u64)
}
