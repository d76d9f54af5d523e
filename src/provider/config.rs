use serde::{Deserialize, Serialize};

/// Completion provider (OpenRouter) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Sent as `HTTP-Referer` to identify the calling application
    #[serde(default = "default_referer")]
    pub referer: String,
    /// Sent as `X-Title`
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Whole-request timeout for single-shot calls; connect and idle timeout for streams
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_referer() -> String {
    "https://peekai.app".to_string()
}

fn default_title() -> String {
    "PeekAI Browser Extension".to_string()
}

fn default_system_prompt() -> String {
    "You are PeekAI, a helpful AI assistant that provides accurate, contextual answers to \
     questions about web content. Be concise but thorough, and format your responses clearly \
     with markdown when appropriate."
        .to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            referer: default_referer(),
            title: default_title(),
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}
