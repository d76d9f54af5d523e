use crate::error::AppError;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(payload)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))
    }

    pub fn object_str(&self, field: &str) -> Option<&str> {
        self.data
            .object
            .get(field)
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
    }
}

fn invalid() -> AppError {
    AppError::BadRequest("Invalid webhook signature".to_string())
}

/// Check a `t=<unix>,v1=<hex>` signature header against the raw payload.
///
/// Any `v1` entry may match; the timestamp must be within `tolerance` seconds of `now`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: i64,
    now: i64,
) -> Result<(), AppError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(invalid)?;
    if now.abs_diff(timestamp) > tolerance.unsigned_abs() {
        return Err(AppError::BadRequest(
            "Webhook signature timestamp outside tolerance".to_string(),
        ));
    }

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("Invalid webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(invalid())
}

/// Build a signature header for `payload` (used by tests and local tooling)
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}
