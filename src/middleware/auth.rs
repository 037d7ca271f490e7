use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

const MISSING_TOKEN: &str = "Token de autenticação não fornecido";
const MALFORMED_HEADER: &str = "Formato do header Authorization inválido";

/// Authenticated caller, inserted into request extensions by [`jwt_auth_middleware`]
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

/// Verify the bearer token and confirm its user still exists.
///
/// Every failure is a 401 with the same `{"error"}` shape.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let user = state.services.auth.current_user(token).await?;

    tracing::debug!(user_id = %user.id, "Authenticated request");
    request.extensions_mut().insert(AuthUser {
        user_id: user.id,
        email: user.email,
    });

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized(MISSING_TOKEN))?
        .to_str()
        .map_err(|_| ApiError::unauthorized(MALFORMED_HEADER))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized(MALFORMED_HEADER))?
        .trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized(MISSING_TOKEN));
    }
    Ok(token)
}
