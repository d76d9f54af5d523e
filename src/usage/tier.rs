use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription level controlling call limits and the default model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    StudentPro,
    Premium,
}

/// Daily and monthly call allowance for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLimits {
    pub daily: i32,
    pub monthly: i32,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::StudentPro, Tier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::StudentPro => "student_pro",
            Tier::Premium => "premium",
        }
    }

    /// Parse a stored tier value. Unknown values fall back to `Free`.
    pub fn parse_lossy(value: &str) -> Self {
        match value {
            "student_pro" => Tier::StudentPro,
            "premium" => Tier::Premium,
            "free" => Tier::Free,
            other => {
                tracing::warn!(tier = %other, "Unrecognised tier value, treating as free");
                Tier::Free
            }
        }
    }

    pub fn limits(&self) -> TierLimits {
        match self {
            Tier::Free => TierLimits {
                daily: 10,
                monthly: 300,
            },
            Tier::StudentPro => TierLimits {
                daily: 200,
                monthly: 6000,
            },
            Tier::Premium => TierLimits {
                daily: 1000,
                monthly: 30000,
            },
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Tier::Free => "openai/gpt-3.5-turbo",
            Tier::StudentPro => "openai/gpt-4-turbo",
            Tier::Premium => "anthropic/claude-3-opus",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn limits_for(tier: Tier) -> TierLimits {
    tier.limits()
}

pub fn default_model(tier: Tier) -> &'static str {
    tier.default_model()
}
