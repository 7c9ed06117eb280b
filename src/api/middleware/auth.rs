use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    api::state::AppState,
    domain::User,
    error::{AppError, Result},
};

#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;

    let user = state
        .service_context
        .auth_service
        .authenticate(token)
        .await?;

    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}

/// Like [`require_auth`], but lets anonymous requests through without a
/// `CurrentUser`.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        if let Ok(user) = state.service_context.auth_service.authenticate(token).await {
            request.extensions_mut().insert(CurrentUser { user });
        }
    }

    next.run(request).await
}
