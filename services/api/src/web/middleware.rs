//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use cim_analyzer_core::AnalysisError;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::web::state::AppState;

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware that verifies the bearer token and resolves the caller.
///
/// If valid, materializes the user and inserts an `AuthenticatedUser` into the
/// request extensions for handlers to use. Otherwise returns 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the bearer token
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| {
            AnalysisError::Unauthenticated("Missing or invalid Authorization header".to_string())
        })?;

    // 2. Verify it
    let user = state.verifier.verify(token).await.map_err(|e| {
        warn!(error = %e, "Rejected bearer token");
        AnalysisError::Unauthenticated(e.to_string())
    })?;

    // 3. Make sure the user row exists before anything references it
    state.db.get_or_create_user(&user.user_id).await?;
    debug!(user_id = %user.user_id, "Authenticated request");

    // 4. Insert the identity into request extensions
    req.extensions_mut().insert(user);

    // 5. Continue to the handler
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc.def"), None);
    }
}
