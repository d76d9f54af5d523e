//! Component health reporting for `GET /health`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

pub const SERVICE_NAME: &str = "peekai-backend";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl HealthCheckResult {
    fn build(status: HealthStatus, message: Option<String>, details: Option<serde_json::Value>) -> Self {
        Self {
            status,
            message,
            details,
            duration_ms: None,
        }
    }

    pub fn healthy() -> Self {
        Self::build(HealthStatus::Healthy, None, None)
    }

    pub fn healthy_with_details(details: serde_json::Value) -> Self {
        Self::build(HealthStatus::Healthy, None, Some(details))
    }

    pub fn degraded(message: String) -> Self {
        Self::build(HealthStatus::Degraded, Some(message), None)
    }

    pub fn degraded_with_details(message: String, details: serde_json::Value) -> Self {
        Self::build(HealthStatus::Degraded, Some(message), Some(details))
    }

    pub fn unhealthy(message: String) -> Self {
        Self::build(HealthStatus::Unhealthy, Some(message), None)
    }

    pub fn unhealthy_with_details(message: String, details: serde_json::Value) -> Self {
        Self::build(HealthStatus::Unhealthy, Some(message), Some(details))
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// One component that can report its own health
#[async_trait]
pub trait HealthChecker: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> HealthCheckResult;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub checks: BTreeMap<String, HealthCheckResult>,
}

/// Registry of component checkers
#[derive(Default)]
pub struct HealthService {
    checkers: RwLock<Vec<Arc<dyn HealthChecker>>>,
}

impl HealthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a checker, replacing any earlier one with the same name
    pub async fn register(&self, checker: Arc<dyn HealthChecker>) {
        let mut checkers = self.checkers.write().await;
        checkers.retain(|existing| existing.name() != checker.name());
        checkers.push(checker);
    }

    pub async fn registered(&self) -> Vec<String> {
        self.checkers
            .read()
            .await
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Run every check, or only the one named by `filter`.
    /// The overall status is the worst component status.
    pub async fn check_health(&self, filter: Option<&str>) -> HealthReport {
        let checkers = self.checkers.read().await;
        let mut checks = BTreeMap::new();

        for checker in checkers
            .iter()
            .filter(|c| filter.is_none_or(|name| name == "all" || c.name() == name))
        {
            let started = Instant::now();
            let result = checker.check().await;
            checks.insert(
                checker.name().to_string(),
                result.with_duration(started.elapsed().as_millis() as u64),
            );
        }

        let status = checks
            .values()
            .map(|result| result.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        HealthReport {
            status,
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            checks,
        }
    }
}
