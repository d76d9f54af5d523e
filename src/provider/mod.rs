//! Completion provider abstraction and OpenRouter wire types

pub mod config;
pub mod mock;
pub mod openrouter;

use crate::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

pub use mock::{MockProvider, MockResponseMode};
pub use openrouter::OpenRouterProvider;

/// Raw upstream body of a streaming completion (SSE bytes)
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, AppError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// Single-shot completion body. Every field is optional so that unexpected
/// shapes surface as a missing answer rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Option<Choice>>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Kept as free text; upstream may report roles outside [`Role`]
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Decode a 2xx completion body.
    ///
    /// Any JSON body is accepted: when it does not match the expected shape the
    /// result carries no answer. Only a body that is not JSON at all is an error.
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| AppError::Provider(format!("Invalid completion response: {}", e)))?;

        Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Unexpected completion response shape");
            Self::default()
        }))
    }

    /// `choices[0].message.content`, if present and non-empty
    pub fn answer(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(Option::as_ref)
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .filter(|content| !content.is_empty())
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.usage.as_ref().and_then(|usage| usage.total_tokens)
    }
}

/// One `data:` payload of a streaming completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseStreamEvent {
    #[serde(default)]
    pub choices: Vec<ChoiceDelta>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChoiceDelta {
    #[serde(default)]
    pub delta: ResponseMessageDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMessageDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ResponseStreamEvent {
    /// `choices[0].delta.content`
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}

/// Completion provider trait for dependency injection and testing
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// One synchronous completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError>;

    /// Open a streaming completion and hand back the raw SSE body
    async fn stream(&self, request: &ChatRequest) -> Result<ByteStream, AppError>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "openai/gpt-3.5-turbo".to_string(),
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
            temperature: 0.7,
            max_tokens: 1000,
            stream: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_answer_extraction() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"42"}}],"usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#,
        )
        .unwrap();
        assert_eq!(response.answer(), Some("42"));
        assert_eq!(response.total_tokens(), Some(4));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.answer(), None);

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":""}}]}"#).unwrap();
        assert_eq!(blank.answer(), None);

        let bare: ChatResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.answer(), None);
        assert_eq!(bare.total_tokens(), None);
    }

    #[test]
    fn test_loose_response_shapes_decode() {
        let tool_role =
            ChatResponse::from_body(br#"{"choices":[{"message":{"role":"tool","content":"hello"}}]}"#)
                .unwrap();
        assert_eq!(tool_role.answer(), Some("hello"));

        let null_choice = ChatResponse::from_body(br#"{"choices":[null]}"#).unwrap();
        assert_eq!(null_choice.answer(), None);

        let null_usage = ChatResponse::from_body(
            br#"{"choices":[{"message":{"content":"hi"}}],"usage":{"total_tokens":null}}"#,
        )
        .unwrap();
        assert_eq!(null_usage.answer(), Some("hi"));
        assert_eq!(null_usage.total_tokens(), None);

        // Wrong types anywhere fall back to an empty response
        let mangled = ChatResponse::from_body(br#"{"choices":{"message":"nope"}}"#).unwrap();
        assert_eq!(mangled.answer(), None);

        assert!(matches!(
            ChatResponse::from_body(b"<html>bad gateway</html>"),
            Err(AppError::Provider(_))
        ));
    }

    #[test]
    fn test_stream_event_content() {
        let event: ResponseStreamEvent =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(event.content(), Some("Hi"));

        let role_only: ResponseStreamEvent =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(role_only.content(), None);
    }
}
