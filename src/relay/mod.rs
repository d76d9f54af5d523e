//! AI relay: gate on the usage ledger, call the completion provider, commit usage and history

use crate::database::DatabaseManager;
use crate::database::entities::QueryRecord;
use crate::error::AppError;
use crate::metrics::track_relay_call;
use crate::provider::config::ProviderConfig;
use crate::provider::{ByteStream, ChatMessage, ChatRequest, CompletionProvider};
use crate::usage::{UsageLedger, UserPermit};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub mod prompt;
pub mod streaming;
pub mod types;


pub use prompt::build_prompt;
pub use streaming::{Decoded, SseDecoder};
pub use types::*;

/// Answer used when the provider returns no `choices[0].message.content`
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response generated";

const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Relay service trait for dependency injection and testing
#[async_trait]
pub trait RelayService: Send + Sync {
    /// Single-shot relay call
    async fn ask(&self, user_id: &str, request: AskRequest) -> Result<AskResponse, AppError>;

    /// Streaming relay call. Errors before the upstream stream opens are returned
    /// directly; afterwards events arrive on the receiver, which closes when the
    /// call has finished (including its usage and history commit).
    async fn ask_stream(
        &self,
        user_id: &str,
        request: AskRequest,
    ) -> Result<mpsc::Receiver<RelayEvent>, AppError>;
}

#[derive(Clone)]
pub struct RelayServiceImpl {
    provider: Arc<dyn CompletionProvider>,
    ledger: UsageLedger,
    database: Arc<dyn DatabaseManager>,
    config: ProviderConfig,
}

/// Everything needed to commit a call once the provider has answered
struct PendingCall {
    user_id: String,
    request: AskRequest,
    model: String,
    started: Instant,
}

enum StreamOutcome {
    Completed,
    Failed(String),
    Disconnected,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl RelayServiceImpl {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        ledger: UsageLedger,
        database: Arc<dyn DatabaseManager>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            provider,
            ledger,
            database,
            config,
        }
    }

    /// Gate the call and prepare the provider request
    async fn prepare(
        &self,
        user_id: &str,
        request: &AskRequest,
        stream: bool,
    ) -> Result<(ChatRequest, String), AppError> {
        let gate = self.ledger.check_and_consume(user_id, today()).await?;

        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| gate.tier.default_model())
            .to_string();

        let prompt = build_prompt(&request.question, request.context.as_ref());

        debug!(
            user_id = %user_id,
            tier = %gate.tier,
            daily_usage = gate.daily_usage,
            model = %model,
            stream,
            "Relay call admitted"
        );

        let chat = ChatRequest {
            model: model.clone(),
            messages: vec![
                ChatMessage::system(self.config.system_prompt.clone()),
                ChatMessage::user(prompt),
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream,
        };

        Ok((chat, model))
    }

    /// Record usage, then append the history record. Returns the elapsed milliseconds.
    async fn commit(&self, call: &PendingCall, answer: &str) -> Result<i32, AppError> {
        let response_time_ms = call.started.elapsed().as_millis().min(i32::MAX as u128) as i32;

        self.ledger.record_usage(&call.user_id).await?;

        let context = call.request.context.clone().unwrap_or_default();
        let record = QueryRecord {
            id: 0,
            user_id: call.user_id.clone(),
            question: call.request.question.clone(),
            answer: answer.to_string(),
            page_title: context.page_title,
            page_url: context.page_url,
            page_domain: context.page_domain,
            context_text: context.surrounding_text,
            selected_text: context.selected_text,
            model_used: call.model.clone(),
            response_time_ms,
            created_at: Utc::now(),
        };
        self.database.history().insert(&record).await?;

        Ok(response_time_ms)
    }

    /// Forward upstream fragments until the sentinel, EOF, an error or a disconnect
    async fn pump(
        &self,
        mut upstream: ByteStream,
        tx: &mpsc::Sender<RelayEvent>,
        answer: &mut String,
    ) -> StreamOutcome {
        let mut decoder = SseDecoder::new();
        let idle_timeout = Duration::from_secs(self.config.timeout_seconds);

        loop {
            let next = tokio::select! {
                _ = tx.closed() => return StreamOutcome::Disconnected,
                next = tokio::time::timeout(idle_timeout, upstream.next()) => next,
            };

            let decoded = match next {
                Err(_) => return StreamOutcome::Failed("upstream stream timed out".to_string()),
                Ok(Some(Err(e))) => return StreamOutcome::Failed(e.to_string()),
                Ok(Some(Ok(bytes))) => decoder.push(&bytes),
                Ok(None) => {
                    let tail = decoder.finish();
                    if let Some(outcome) = forward(tail, tx, answer).await {
                        return outcome;
                    }
                    // Upstream closed without the sentinel
                    return StreamOutcome::Completed;
                }
            };

            if let Some(outcome) = forward(decoded, tx, answer).await {
                return outcome;
            }
        }
    }

    async fn run_stream(
        self,
        upstream: ByteStream,
        tx: mpsc::Sender<RelayEvent>,
        call: PendingCall,
        permit: Option<UserPermit>,
    ) {
        let mut answer = String::new();
        let mut outcome = self.pump(upstream, &tx, &mut answer).await;
        if matches!(outcome, StreamOutcome::Completed) && tx.is_closed() {
            outcome = StreamOutcome::Disconnected;
        }

        match outcome {
            // The done marker goes out only once usage and history are stored
            StreamOutcome::Completed => match self.commit(&call, &answer).await {
                Ok(response_time_ms) => {
                    let delivered = tx.send(RelayEvent::Chunk(StreamChunk::done())).await.is_ok();
                    info!(
                        user_id = %call.user_id,
                        model = %call.model,
                        response_time_ms,
                        answer_len = answer.len(),
                        delivered,
                        "Streaming relay call completed"
                    );
                    track_relay_call("stream", "success");
                }
                Err(e) => {
                    error!(user_id = %call.user_id, error = %e, "Failed to record streaming call");
                    let _ = tx
                        .send(RelayEvent::Error("failed to record query".to_string()))
                        .await;
                    track_relay_call("stream", "commit_error");
                }
            },
            StreamOutcome::Failed(reason) => {
                warn!(user_id = %call.user_id, model = %call.model, error = %reason, "Upstream stream failed");
                let _ = tx.send(RelayEvent::Error(reason)).await;
                track_relay_call("stream", "provider_error");
            }
            StreamOutcome::Disconnected => {
                info!(user_id = %call.user_id, "Client disconnected, dropping upstream stream");
                track_relay_call("stream", "disconnected");
            }
        }

        // Sender and permit drop here, closing the caller channel
        drop(permit);
    }
}

/// Push decoded items to the caller. `Some` means the stream is over.
async fn forward(
    items: Vec<Decoded>,
    tx: &mpsc::Sender<RelayEvent>,
    answer: &mut String,
) -> Option<StreamOutcome> {
    for item in items {
        match item {
            Decoded::Done => return Some(StreamOutcome::Completed),
            Decoded::Content(content) => {
                answer.push_str(&content);
                if tx
                    .send(RelayEvent::Chunk(StreamChunk::content(content)))
                    .await
                    .is_err()
                {
                    return Some(StreamOutcome::Disconnected);
                }
            }
        }
    }
    None
}

fn gate_outcome(err: &AppError) -> &'static str {
    match err {
        AppError::QuotaExceeded { .. } => "quota_exceeded",
        AppError::Provider(_) => "provider_error",
        AppError::NotFound(_) => "no_profile",
        _ => "error",
    }
}

#[async_trait]
impl RelayService for RelayServiceImpl {
    async fn ask(&self, user_id: &str, request: AskRequest) -> Result<AskResponse, AppError> {
        let started = Instant::now();
        let _permit = self.ledger.acquire(user_id).await;

        let (chat, model) = self
            .prepare(user_id, &request, false)
            .await
            .inspect_err(|e| track_relay_call("single", gate_outcome(e)))?;

        let response = self
            .provider
            .complete(&chat)
            .await
            .inspect_err(|e| {
                warn!(user_id = %user_id, model = %model, error = %e, "Completion failed");
                track_relay_call("single", gate_outcome(e));
            })?;

        let answer = response
            .answer()
            .unwrap_or(NO_RESPONSE_PLACEHOLDER)
            .to_string();
        let tokens_used = response.total_tokens();

        let call = PendingCall {
            user_id: user_id.to_string(),
            request,
            model,
            started,
        };
        let response_time_ms = self.commit(&call, &answer).await?;

        info!(
            user_id = %user_id,
            model = %call.model,
            response_time_ms,
            tokens_used,
            "Relay call completed"
        );
        track_relay_call("single", "success");

        Ok(AskResponse {
            answer,
            model: call.model,
            response_time_ms,
            tokens_used,
        })
    }

    async fn ask_stream(
        &self,
        user_id: &str,
        request: AskRequest,
    ) -> Result<mpsc::Receiver<RelayEvent>, AppError> {
        let started = Instant::now();
        let permit = self.ledger.acquire(user_id).await;

        let (chat, model) = self
            .prepare(user_id, &request, true)
            .await
            .inspect_err(|e| track_relay_call("stream", gate_outcome(e)))?;

        let upstream = self.provider.stream(&chat).await.inspect_err(|e| {
            warn!(user_id = %user_id, model = %model, error = %e, "Failed to open stream");
            track_relay_call("stream", gate_outcome(e));
        })?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let call = PendingCall {
            user_id: user_id.to_string(),
            request,
            model,
            started,
        };

        tokio::spawn(self.clone().run_stream(upstream, tx, call, permit));

        Ok(rx)
    }
}
