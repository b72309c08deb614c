//! Bearer-token authentication: a tenant's token resolves to its row via
//! a state-store lookup, same shape however the header arrives (`Bearer
//! <token>` or a bare token, per §6).

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use sumo_types::Tenant;

use crate::app::App;
use crate::error::ApiError;

fn extract_token(parts: &Parts) -> Option<String> {
    let raw = parts.headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() { None } else { Some(token.to_string()) }
}

/// The tenant that owns the bearer token on the request. Every tenant- and
/// job-scoped route extracts this instead of trusting a path parameter.
pub struct AuthenticatedTenant(pub Tenant);

impl FromRequestParts<App> for AuthenticatedTenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or_else(|| ApiError::unauthenticated("missing bearer token"))?;
        let State(app) = State::<App>::from_request_parts(parts, state).await.expect("App is always extractable");
        let tenant = sumo_store::get_tenant_by_token(&app.pool, &token)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::unauthenticated("unknown API token"))?;
        Ok(AuthenticatedTenant(tenant))
    }
}

/// Gate on the operator's single shared `ADMIN_TOKEN` (§6: token issuance
/// beyond an opaque bearer lookup is out of scope, so admin auth is just
/// this static secret).
pub struct AdminAuth;

impl FromRequestParts<App> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or_else(|| ApiError::unauthenticated("missing bearer token"))?;
        let State(app) = State::<App>::from_request_parts(parts, state).await.expect("App is always extractable");
        if token != app.admin_token {
            return Err(ApiError::unauthenticated("invalid admin token"));
        }
        Ok(AdminAuth)
    }
}
