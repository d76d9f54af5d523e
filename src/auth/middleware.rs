use crate::error::AppError;
use crate::metrics::track_jwt_validation;
use crate::server::Server;
use crate::utils::RequestIdExt;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};

/// Caller identity resolved from the bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization format".to_string()))
}

/// Validate the identity-provider bearer token and attach [`AuthUser`] to the request
pub async fn auth_middleware(
    State(server): State<Server>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let request_id = request.extensions().request_id();
    let token = bearer_token(&request)?;

    let claims = match server.jwt_service.validate_token(token) {
        Ok(claims) => {
            track_jwt_validation(true);
            claims
        }
        Err(e) => {
            track_jwt_validation(false);
            debug!(request_id = %request_id, error = %e, "Rejected bearer token");
            return Err(e);
        }
    };

    trace!(request_id = %request_id, user_id = %claims.sub, "Authenticated request");

    let user = AuthUser {
        user_id: claims.sub,
        email: claims.email,
    };
    request.extensions_mut().insert(user.clone());

    let mut response = next.run(request).await;
    // Lets outer layers (the request logger) attribute the call
    response.extensions_mut().insert(user);
    Ok(response)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Missing user authentication".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::IdentityClaims;
    use crate::test_utils::TestServerBuilder;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    async fn whoami(user: AuthUser) -> String {
        format!("{}:{}", user.user_id, user.email.unwrap_or_default())
    }

    async fn app() -> (Server, Router) {
        let server = TestServerBuilder::new().build().await;
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(server.clone(), auth_middleware));
        (server, app)
    }

    async fn call(app: Router, authorization: Option<String>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_valid_token_exposes_identity() {
        let (server, app) = app().await;
        let claims = IdentityClaims::new("user-1", Some("a@example.com".to_string()), 3600);
        let token = server.jwt_service.create_token(&claims).unwrap();

        let (status, body) = call(app, Some(format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user-1:a@example.com");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let (_, app) = app().await;
        let (status, _) = call(app, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_is_unauthorized() {
        let (_, app) = app().await;
        let (status, _) = call(app, Some("Basic dXNlcjpwYXNz".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_and_expired_tokens_are_unauthorized() {
        let (server, app) = app().await;
        let (status, _) = call(app.clone(), Some("Bearer not.a.jwt".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut claims = IdentityClaims::new("user-1", None, 3600);
        claims.exp = claims.iat.saturating_sub(60);
        let expired = server.jwt_service.create_token(&claims).unwrap();
        let (status, _) = call(app, Some(format!("Bearer {}", expired))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
