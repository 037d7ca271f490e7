use axum::extract::{Extension, Path, State};

use super::CompanyScope;
use crate::app::AppState;
use crate::database::models::RecurringTransaction;
use crate::middleware::{ApiQuery, ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::recurring_service::{ProcessInput, ProcessReport, RecurringInput};

/// GET /recurring?companyId=
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(scope): ApiQuery<CompanyScope>,
) -> ApiResult<Vec<RecurringTransaction>> {
    let rules = state.services.recurring.list(auth.user_id, scope.company_id()?).await?;
    Ok(ApiResponse::success(rules))
}

/// POST /recurring
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(input): JsonBody<RecurringInput>,
) -> ApiResult<RecurringTransaction> {
    let rule = state.services.recurring.create(auth.user_id, input).await?;
    Ok(ApiResponse::created(rule))
}

/// GET /recurring/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<RecurringTransaction> {
    let rule = state.services.recurring.get(auth.user_id, &id).await?;
    Ok(ApiResponse::success(rule))
}

/// PUT /recurring/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<RecurringInput>,
) -> ApiResult<RecurringTransaction> {
    let rule = state.services.recurring.update(auth.user_id, &id, input).await?;
    Ok(ApiResponse::success(rule))
}

/// DELETE /recurring/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.services.recurring.delete(auth.user_id, &id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /recurring/process - Generate one company's transactions for a period.
/// Safe to repeat: already generated entries are skipped.
pub async fn process(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(input): JsonBody<ProcessInput>,
) -> ApiResult<ProcessReport> {
    let report = state.services.recurring.process_for_period(auth.user_id, input).await?;
    Ok(ApiResponse::success(report))
}
