use serde::{Deserialize, Serialize};

/// Page context captured by the extension alongside a question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskContext {
    #[serde(default)]
    pub page_title: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub page_domain: Option<String>,
    #[serde(default)]
    pub selected_text: Option<String>,
    #[serde(default)]
    pub surrounding_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub context: Option<AskContext>,
    /// Explicit model override; the tier default applies otherwise
    #[serde(default)]
    pub model: Option<String>,
    /// Accepted for compatibility; the route decides the delivery mode
    #[serde(default)]
    pub stream: Option<bool>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: AskContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub model: String,
    pub response_time_ms: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
}

/// One downstream streaming message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
}

impl StreamChunk {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            content: String::new(),
            done: true,
        }
    }
}

/// What the relay pushes to the caller channel of a streaming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Chunk(StreamChunk),
    /// Upstream failed after the stream opened; the channel closes right after
    Error(String),
}
