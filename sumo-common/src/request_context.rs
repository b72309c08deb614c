use std::net::IpAddr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use uuid::Uuid;

/// Per-request identity attached by the `extract_context` middleware,
/// used for access logging and error correlation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| RequestContext {
                request_id: Uuid::new_v4(),
                client_ip: None,
                user_agent: None,
                received_at: Utc::now(),
            }))
    }
}

pub mod middleware {
    use super::*;
    use axum::extract::Request;
    use axum::middleware::Next;
    use axum::response::Response;

    pub async fn extract_context(mut req: Request, next: Next) -> Response {
        let ctx = create_context(req.headers());
        req.extensions_mut().insert(ctx);
        next.run(req).await
    }

    pub fn create_context(headers: &HeaderMap) -> RequestContext {
        RequestContext {
            request_id: extract_or_generate_request_id(headers),
            client_ip: get_source_ip(headers),
            user_agent: headers
                .get(http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
            received_at: Utc::now(),
        }
    }
}

pub fn extract_or_generate_request_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

/// Best-effort client IP from `X-Forwarded-For`, falling back to `X-Real-IP`.
pub fn get_source_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .and_then(|ip| ip.parse().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|ip| ip.parse().ok())
        })
}
