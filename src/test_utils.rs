use crate::{
    auth::jwt::IdentityClaims,
    config::Config,
    database::entities::ProfileRecord,
    provider::{CompletionProvider, MockProvider},
    server::Server,
    usage::tier::Tier,
};
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "test-secret";

/// Test server builder: in-memory SQLite, mock completion provider, metrics off
pub struct TestServerBuilder {
    config: Config,
    jwt_secret: String,
    provider: Arc<dyn CompletionProvider>,
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestServerBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            jwt_secret: TEST_JWT_SECRET.to_string(),
            provider: Arc::new(MockProvider::new()),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub async fn build(self) -> Server {
        let mut config = self.config;
        config.database.url = "sqlite::memory:".to_string();
        // Every pooled connection to `sqlite::memory:` would be a separate database
        config.database.max_connections = 1;
        config.jwt.secret = self.jwt_secret;
        config.jwt.algorithm = "HS256".to_string();
        config.metrics.enabled = false;

        let server = Server::new_with_provider(config, self.provider)
            .await
            .unwrap();
        server.database.migrate().await.unwrap();
        server
    }
}

/// Bearer token for `user_id` signed with the server's secret
pub fn token_for(server: &Server, user_id: &str) -> String {
    let claims = IdentityClaims::new(user_id, Some(format!("{}@example.com", user_id)), 3600);
    server.jwt_service.create_token(&claims).unwrap()
}

/// Insert a profile for `user_id` on `tier`
pub async fn create_profile(server: &Server, user_id: &str, tier: Tier) -> ProfileRecord {
    server
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
