use serde::{Deserialize, Serialize};

/// Settings for validating access tokens issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Shared signing secret (or PEM/JWK public key for asymmetric algorithms)
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    /// Expected `aud` claim; `None` disables audience validation
    #[serde(default = "default_jwt_audience")]
    pub audience: Option<String>,
}

fn default_jwt_secret() -> String {
    "your-jwt-secret".to_string()
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_jwt_audience() -> Option<String> {
    Some("authenticated".to_string())
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            algorithm: default_jwt_algorithm(),
            audience: default_jwt_audience(),
        }
    }
}
