use axum::extract::{Extension, State};

use crate::app::AppState;
use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::auth_service::AuthSession;

/// GET /auth/me - The authenticated user
pub async fn me(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<User> {
    let user = state.services.auth.user(auth.user_id).await?;
    Ok(ApiResponse::success(user))
}

/// POST /auth/refresh - Fresh token for the authenticated user
pub async fn refresh(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<AuthSession> {
    let session = state.services.auth.refresh(auth.user_id).await?;
    Ok(ApiResponse::success(session))
}
