use serde::{Deserialize, Serialize};

/// Stripe billing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub secret_key: String,
    /// Webhook signing secret; signature checks are skipped when empty
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_student_pro_price_id")]
    pub student_pro_price_id: String,
    #[serde(default = "default_premium_price_id")]
    pub premium_price_id: String,
    #[serde(default = "default_success_url")]
    pub success_url: String,
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
    #[serde(default = "default_return_url")]
    pub portal_return_url: String,
    /// Accepted age of a signed webhook, in seconds
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_seconds: i64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_student_pro_price_id() -> String {
    "price_student_pro".to_string()
}

fn default_premium_price_id() -> String {
    "price_premium".to_string()
}

fn default_success_url() -> String {
    "https://peekai.app/billing/success".to_string()
}

fn default_cancel_url() -> String {
    "https://peekai.app/billing/cancel".to_string()
}

fn default_return_url() -> String {
    "https://peekai.app/account".to_string()
}

fn default_signature_tolerance() -> i64 {
    300
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            secret_key: String::new(),
            webhook_secret: String::new(),
            student_pro_price_id: default_student_pro_price_id(),
            premium_price_id: default_premium_price_id(),
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            portal_return_url: default_return_url(),
            signature_tolerance_seconds: default_signature_tolerance(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}
