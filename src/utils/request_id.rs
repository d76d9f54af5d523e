use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request correlation id, echoed back in `X-Request-ID`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reuse a caller-supplied id when it is a valid UUID
    fn from_request(request: &Request) -> Self {
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Self)
            .unwrap_or_else(Self::new)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag the request with a [`RequestId`] and run it inside a span carrying that id
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::from_request(&request);
    request.extensions_mut().insert(request_id);

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path()
    );
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

/// Extension trait to read the request id from request extensions
pub trait RequestIdExt {
    fn request_id(&self) -> RequestId;
}

impl RequestIdExt for axum::http::Extensions {
    fn request_id(&self) -> RequestId {
        self.get::<RequestId>().copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        extract::Extension,
        http::{Request as HttpRequest, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    async fn echo(Extension(request_id): Extension<RequestId>) -> String {
        request_id.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/echo", get(echo))
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    #[tokio::test]
    async fn test_generates_id_when_absent() {
        let response = app()
            .oneshot(HttpRequest::get("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let header = response.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(header).is_ok());
    }

    #[tokio::test]
    async fn test_preserves_valid_incoming_id() {
        let existing = Uuid::new_v4();
        let response = app()
            .oneshot(
                HttpRequest::get("/echo")
                    .header("X-Request-ID", existing.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-request-id").unwrap(),
            existing.to_string().as_str()
        );
    }

    #[tokio::test]
    async fn test_replaces_malformed_incoming_id() {
        let response = app()
            .oneshot(
                HttpRequest::get("/echo")
                    .header("X-Request-ID", "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let header = response.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert_ne!(header, "not-a-uuid");
        assert!(Uuid::parse_str(header).is_ok());
    }
}
