use crate::error::AppError;
use crate::provider::{
    ByteStream, ChatRequest, ChatResponse, Choice, CompletionProvider, ResponseMessage, Usage,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-process completion provider with scripted responses
#[derive(Clone)]
pub struct MockProvider {
    pub response_mode: MockResponseMode,
    /// Delay before each call returns
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

#[derive(Clone, Debug)]
pub enum MockResponseMode {
    /// Answer with this text; streams split it into one fragment per word
    Answer(String),
    /// 2xx with no usable answer shape
    NoAnswer,
    /// 2xx whose raw JSON body is decoded like an upstream response
    RawBody(String),
    /// Upstream rejects the call with this HTTP status
    FixedStatus(u16),
    /// Streaming body delivered verbatim as these byte chunks
    StreamBody(Vec<String>),
    /// Deliver these chunks, then fail the body read
    StreamThenError(Vec<String>),
    /// Deliver these chunks, then never yield again
    StreamThenStall(Vec<String>),
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_mode(MockResponseMode::Answer("Mock answer".to_string()))
    }

    pub fn with_mode(response_mode: MockResponseMode) -> Self {
        Self {
            response_mode,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_answer(answer: impl Into<String>) -> Self {
        Self::with_mode(MockResponseMode::Answer(answer.into()))
    }

    pub fn with_status(status: u16) -> Self {
        Self::with_mode(MockResponseMode::FixedStatus(status))
    }

    /// Stream the given raw SSE body chunks
    pub fn with_stream_body<S: Into<String>>(chunks: impl IntoIterator<Item = S>) -> Self {
        Self::with_mode(MockResponseMode::StreamBody(
            chunks.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests().pop()
    }

    async fn record(&self, request: &ChatRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn rejected(status: u16) -> AppError {
        AppError::Provider(format!("OpenRouter API error: {}", status))
    }
}

/// Encode an answer as an OpenRouter-style SSE body, one fragment per word
pub fn sse_body_for(answer: &str) -> Vec<String> {
    let mut chunks: Vec<String> = answer
        .split_inclusive(' ')
        .map(|word| {
            let event = serde_json::json!({ "choices": [{ "delta": { "content": word } }] });
            format!("data: {}\n\n", event)
        })
        .collect();
    chunks.push("data: [DONE]\n\n".to_string());
    chunks
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.record(request).await;

        match &self.response_mode {
            MockResponseMode::Answer(answer) => Ok(ChatResponse {
                id: Some("mock-completion".to_string()),
                model: Some(request.model.clone()),
                choices: vec![Some(Choice {
                    message: Some(ResponseMessage {
                        role: Some("assistant".to_string()),
                        content: Some(answer.clone()),
                    }),
                    finish_reason: Some("stop".to_string()),
                })],
                usage: Some(Usage {
                    prompt_tokens: Some(10),
                    completion_tokens: Some(5),
                    total_tokens: Some(15),
                }),
            }),
            MockResponseMode::NoAnswer => Ok(ChatResponse::default()),
            MockResponseMode::RawBody(body) => ChatResponse::from_body(body.as_bytes()),
            MockResponseMode::FixedStatus(status) => Err(Self::rejected(*status)),
            MockResponseMode::StreamBody(_)
            | MockResponseMode::StreamThenError(_)
            | MockResponseMode::StreamThenStall(_) => Err(
                AppError::Internal("MockProvider is configured for streaming only".to_string()),
            ),
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ByteStream, AppError> {
        self.record(request).await;

        let to_items = |chunks: &[String]| -> Vec<Result<Bytes, AppError>> {
            chunks
                .iter()
                .map(|chunk| Ok(Bytes::from(chunk.clone())))
                .collect()
        };

        match &self.response_mode {
            MockResponseMode::Answer(answer) => {
                Ok(stream::iter(to_items(&sse_body_for(answer))).boxed())
            }
            MockResponseMode::NoAnswer | MockResponseMode::RawBody(_) => {
                Ok(stream::iter(to_items(&["data: [DONE]\n\n".to_string()])).boxed())
            }
            MockResponseMode::FixedStatus(status) => Err(Self::rejected(*status)),
            MockResponseMode::StreamBody(chunks) => Ok(stream::iter(to_items(chunks)).boxed()),
            MockResponseMode::StreamThenError(chunks) => {
                let mut items = to_items(chunks);
                items.push(Err(AppError::Provider("connection reset".to_string())));
                Ok(stream::iter(items).boxed())
            }
            MockResponseMode::StreamThenStall(chunks) => Ok(stream::iter(to_items(chunks))
                .chain(stream::pending())
                .boxed()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
