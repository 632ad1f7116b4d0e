use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::{models::AuthenticatedUser, server::AppState};

/// Resolves the user id set by the authentication gateway into an
/// [`AuthenticatedUser`] extension. Requests without a usable header pass
/// through anonymously and are rejected by the resource layer.
pub async fn identity_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = state.config.server.user_id_header.as_str();
    let user = request
        .headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|id| AuthenticatedUser { id });

    match user {
        Some(user) => {
            debug!(user_id = user.id, "Resolved request identity");
            request.extensions_mut().insert(user);
        }
        None => debug!(header = %header, "Request carries no user identity"),
    }

    next.run(request).await
}
