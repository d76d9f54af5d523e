use crate::auth::config::JwtConfig;
use crate::error::AppError;
use crate::health::{HealthCheckResult, HealthChecker};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, jwk::Jwk,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

pub fn parse_algorithm(alg: &str) -> Result<Algorithm, AppError> {
    Algorithm::from_str(alg)
        .map_err(|_| AppError::BadRequest(format!("Unsupported JWT algorithm: {}", alg)))
}

fn create_decoding_key(key_data: &str, algorithm: Algorithm) -> Result<DecodingKey, AppError> {
    // JWK documents are accepted for any algorithm
    if key_data.trim_start().starts_with('{') {
        let jwk: Jwk = serde_json::from_str(key_data)
            .map_err(|_| AppError::Unauthorized("Invalid JWK format".to_string()))?;

        return DecodingKey::from_jwk(&jwk)
            .map_err(|_| AppError::Unauthorized("Invalid JWK key".to_string()));
    }

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(DecodingKey::from_secret(key_data.as_ref()))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(key_data.as_bytes())
            .map_err(|_| AppError::Unauthorized("Invalid RSA key format".to_string())),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(key_data.as_bytes())
            .map_err(|_| AppError::Unauthorized("Invalid EC key format".to_string())),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(key_data.as_bytes())
            .map_err(|_| AppError::Unauthorized("Invalid EdDSA key format".to_string())),
    }
}

/// Only symmetric keys can mint tokens; asymmetric setups are validate-only.
fn create_encoding_key(key_data: &str, algorithm: Algorithm) -> Option<EncodingKey> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Some(EncodingKey::from_secret(key_data.as_ref()))
        }
        _ => None,
    }
}

/// Claims carried by an identity-provider access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Identity-provider user id
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub iat: usize,
    pub exp: usize,
}

impl IdentityClaims {
    pub fn new(user_id: impl Into<String>, email: Option<String>, expires_in_seconds: u64) -> Self {
        let now = Utc::now().timestamp() as usize;
        Self {
            sub: user_id.into(),
            email,
            aud: Some("authenticated".to_string()),
            iat: now,
            exp: now + expires_in_seconds as usize,
        }
    }

    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as usize;
        self.exp <= now
    }
}

/// JWT service trait for dependency injection and testing
#[async_trait]
pub trait JwtService: Send + Sync {
    /// Mint a token from claims (symmetric algorithms only)
    fn create_token(&self, claims: &IdentityClaims) -> Result<String, AppError>;

    /// Validate a bearer token and return its claims
    fn validate_token(&self, token: &str) -> Result<IdentityClaims, AppError>;

    fn algorithm(&self) -> Algorithm;
}

#[derive(Clone)]
pub struct JwtServiceImpl {
    algorithm: Algorithm,
    audience: Option<String>,
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
}

impl JwtServiceImpl {
    pub fn new(config: &JwtConfig) -> Result<Self, AppError> {
        let algorithm = parse_algorithm(&config.algorithm)?;
        let decoding_key = create_decoding_key(&config.secret, algorithm)?;

        Ok(Self {
            algorithm,
            audience: config.audience.clone(),
            encoding_key: create_encoding_key(&config.secret, algorithm),
            decoding_key,
        })
    }

    pub fn health_checker(&self) -> Arc<JwtHealthChecker> {
        Arc::new(JwtHealthChecker {
            service: self.clone(),
        })
    }
}

#[async_trait]
impl JwtService for JwtServiceImpl {
    fn create_token(&self, claims: &IdentityClaims) -> Result<String, AppError> {
        let key = self.encoding_key.as_ref().ok_or_else(|| {
            AppError::Internal("Token creation requires a symmetric algorithm".to_string())
        })?;
        encode(&Header::new(self.algorithm), claims, key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn validate_token(&self, token: &str) -> Result<IdentityClaims, AppError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let token_data = decode::<IdentityClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(token_data.claims)
    }

    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

pub struct JwtHealthChecker {
    service: JwtServiceImpl,
}

#[async_trait]
impl HealthChecker for JwtHealthChecker {
    fn name(&self) -> &str {
        "jwt"
    }

    async fn check(&self) -> HealthCheckResult {
        // Asymmetric setups cannot self-sign, so only report the configuration
        if self.service.encoding_key.is_none() {
            return HealthCheckResult::healthy_with_details(serde_json::json!({
                "algorithm": format!("{:?}", self.service.algorithm),
                "mode": "validate-only"
            }));
        }

        let probe = IdentityClaims::new("health-check", None, 60);
        let result = self
            .service
            .create_token(&probe)
            .and_then(|token| self.service.validate_token(&token));

        match result {
            Ok(claims) if claims.sub == probe.sub => {
                HealthCheckResult::healthy_with_details(serde_json::json!({
                    "algorithm": format!("{:?}", self.service.algorithm),
                    "token_roundtrip": "success"
                }))
            }
            Ok(_) => HealthCheckResult::unhealthy("Token validation returned incorrect claims".to_string()),
            Err(err) => HealthCheckResult::unhealthy_with_details(
                "JWT self-check failed".to_string(),
                serde_json::json!({ "error": err.to_string() }),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hs256_config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_algorithm_valid() {
        assert!(parse_algorithm("HS256").is_ok());
        assert!(parse_algorithm("RS256").is_ok());
        assert!(parse_algorithm("ES256").is_ok());
        assert!(parse_algorithm("EdDSA").is_ok());
    }

    #[test]
    fn test_parse_algorithm_invalid() {
        assert!(parse_algorithm("hs256").is_err());
        assert!(parse_algorithm("HS999").is_err());
        assert!(parse_algorithm("").is_err());
    }

    #[test]
    fn test_create_decoding_key_jwk_format() {
        let jwk_json = r#"{
            "kty": "oct",
            "alg": "HS256",
            "k": "dGVzdC1zZWNyZXQ"
        }"#;
        assert!(create_decoding_key(jwk_json, Algorithm::HS256).is_ok());
        assert!(create_decoding_key(r#"{"invalid": "jwk"}"#, Algorithm::HS256).is_err());
    }

    #[test]
    fn test_token_roundtrip() {
        let service = JwtServiceImpl::new(&hs256_config("test-secret")).unwrap();
        let claims = IdentityClaims::new("user-1", Some("a@example.com".to_string()), 3600);

        let token = service.create_token(&claims).unwrap();
        let validated = service.validate_token(&token).unwrap();

        assert_eq!(validated.sub, "user-1");
        assert_eq!(validated.email.as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_token_with_wrong_secret_rejected() {
        let issuer = JwtServiceImpl::new(&hs256_config("secret-a")).unwrap();
        let verifier = JwtServiceImpl::new(&hs256_config("secret-b")).unwrap();
        let token = issuer
            .create_token(&IdentityClaims::new("user-1", None, 3600))
            .unwrap();

        assert!(matches!(
            verifier.validate_token(&token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_audience_mismatch_rejected() {
        let service = JwtServiceImpl::new(&hs256_config("test-secret")).unwrap();
        let mut claims = IdentityClaims::new("user-1", None, 3600);
        claims.aud = Some("anon".to_string());
        let token = service.create_token(&claims).unwrap();

        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = JwtServiceImpl::new(&hs256_config("test-secret")).unwrap();
        let mut claims = IdentityClaims::new("user-1", None, 3600);
        claims.exp = (Utc::now().timestamp() - 3600) as usize;
        assert!(claims.is_expired());

        let token = service.create_token(&claims).unwrap();
        assert!(service.validate_token(&token).is_err());
    }
}
