use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Serialise each user's gate, provider call and commit so the daily limit is never exceeded
    #[serde(default)]
    pub strict_limits: bool,
    /// Zero the monthly counter on the first reset of a new calendar month
    #[serde(default)]
    pub monthly_reset: bool,
}
