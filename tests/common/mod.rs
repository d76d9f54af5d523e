#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::NaiveDate;
use peekai_backend::{
    Config, Server,
    auth::IdentityClaims,
    database::entities::ProfileRecord,
    provider::{CompletionProvider, MockProvider},
    usage::tier::Tier,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";

/// In-process server with in-memory SQLite and a scripted completion provider
pub struct TestHarness {
    pub server: Server,
    pub app: Router,
    pub provider: MockProvider,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::build(Config::default(), MockProvider::new()).await
    }

    pub async fn with_provider(provider: MockProvider) -> Self {
        Self::build(Config::default(), provider).await
    }

    pub async fn build(mut config: Config, provider: MockProvider) -> Self {
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        config.jwt.secret = TEST_SECRET.to_string();
        config.metrics.enabled = false;
        config.logging.log_request = false;

        let shared: Arc<dyn CompletionProvider> = Arc::new(provider.clone());
        let server = Server::new_with_provider(config, shared).await.unwrap();
        server.database.migrate().await.unwrap();
        let app = server.create_app();

        Self {
            server,
            app,
            provider,
        }
    }

    pub fn token(&self, user_id: &str) -> String {
        let claims = IdentityClaims::new(user_id, Some(format!("{}@example.com", user_id)), 3600);
        self.server.jwt_service.create_token(&claims).unwrap()
    }

    pub async fn create_profile(&self, user_id: &str, tier: Tier) -> ProfileRecord {
        self.server
            .database
            .profiles()
            .create(&ProfileRecord::new(
                user_id,
                format!("{}@example.com", user_id),
                tier,
            ))
            .await
            .unwrap()
    }

    /// Insert a profile with preset counters
    pub async fn create_profile_with_usage(
        &self,
        user_id: &str,
        tier: Tier,
        daily: i32,
        monthly: i32,
        last_reset_date: NaiveDate,
    ) -> ProfileRecord {
        self.server
            .database
            .profiles()
            .create(
                &ProfileRecord::new(user_id, format!("{}@example.com", user_id), tier)
                    .with_usage(daily, monthly, last_reset_date),
            )
            .await
            .unwrap()
    }

    pub async fn profile(&self, user_id: &str) -> ProfileRecord {
        self.server
            .database
            .profiles()
            .find_by_id(user_id)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn history_count(&self, user_id: &str) -> u64 {
        self.server.database.history().count(user_id).await.unwrap()
    }

    /// Send a request as `user_id` (anonymous when `None`) and return status and raw body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header("Authorization", format!("Bearer {}", self.token(user_id)));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// Like [`Self::send`] but parses a JSON body (`Null` when empty)
    pub async fn send_json(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, text) = self.send(method, uri, user_id, body).await;
        let json = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (status, json)
    }
}

/// `data:` payloads of an SSE body, with the event name if one was set
pub fn sse_events(body: &str) -> Vec<(Option<String>, Value)> {
    let mut events = Vec::new();
    for block in body.split("\n\n") {
        let mut name = None;
        let mut data = String::new();
        for line in block.lines() {
            if let Some(value) = line.strip_prefix("event:") {
                name = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                data.push_str(value.trim_start());
            }
        }
        if !data.is_empty() {
            events.push((name, serde_json::from_str(&data).unwrap()));
        }
    }
    events
}
