// handlers/public/auth.rs - POST /auth/register, POST /auth/login

use axum::extract::State;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::services::auth_service::{AuthSession, LoginInput, RegisterInput};

/// POST /auth/register - Create an account and return a session token
pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> ApiResult<AuthSession> {
    let session = state.services.auth.register(input).await?;
    Ok(ApiResponse::created(session))
}

/// POST /auth/login - Exchange e-mail and password for a token
pub async fn login(State(state): State<AppState>, JsonBody(input): JsonBody<LoginInput>) -> ApiResult<AuthSession> {
    let session = state.services.auth.login(input).await?;
    Ok(ApiResponse::success(session))
}
