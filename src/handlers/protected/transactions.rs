use axum::extract::{Extension, Path, State};

use crate::app::AppState;
use crate::database::models::Transaction;
use crate::middleware::{ApiQuery, ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::transaction_service::{TransactionInput, TransactionQuery, TransactionSummary};
use crate::services::{PageParams, Paginated};

/// GET /transactions?companyId=&month=&year=&status=&category=&page=&limit=
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<TransactionQuery>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Paginated<Transaction>> {
    let page = page.resolve(&state.config.api);
    let result = state.services.transactions.list(auth.user_id, &query, page).await?;
    Ok(ApiResponse::success(result))
}

/// GET /transactions/summary - Paid/open totals split by income and expense
pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> ApiResult<TransactionSummary> {
    let summary = state.services.transactions.summary(auth.user_id, &query).await?;
    Ok(ApiResponse::success(summary))
}

/// POST /transactions
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(input): JsonBody<TransactionInput>,
) -> ApiResult<Transaction> {
    let tx = state.services.transactions.create(auth.user_id, input).await?;
    Ok(ApiResponse::created(tx))
}

/// GET /transactions/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let tx = state.services.transactions.get(auth.user_id, &id).await?;
    Ok(ApiResponse::success(tx))
}

/// PUT /transactions/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<TransactionInput>,
) -> ApiResult<Transaction> {
    let tx = state.services.transactions.update(auth.user_id, &id, input).await?;
    Ok(ApiResponse::success(tx))
}

/// DELETE /transactions/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.services.transactions.delete(auth.user_id, &id).await?;
    Ok(ApiResponse::no_content())
}

/// PATCH /transactions/:id/toggle-status - ABERTO <-> PAGO
pub async fn toggle_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let tx = state.services.transactions.toggle_status(auth.user_id, &id).await?;
    Ok(ApiResponse::success(tx))
}
