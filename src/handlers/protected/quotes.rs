use axum::extract::{Extension, Path, State};

use crate::app::AppState;
use crate::database::models::Quote;
use crate::middleware::{ApiQuery, ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::quote_service::{QuoteComparison, QuoteInput, QuoteQuery, QuoteStatusInput};
use crate::services::{PageParams, Paginated};

/// GET /quotes?companyId=&status=&page=&limit=
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<QuoteQuery>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ApiResult<Paginated<Quote>> {
    let page = page.resolve(&state.config.api);
    let result = state.services.quotes.list(auth.user_id, &query, page).await?;
    Ok(ApiResponse::success(result))
}

/// POST /quotes - New DRAFT, optionally prefilled from `templateId`
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(input): JsonBody<QuoteInput>,
) -> ApiResult<Quote> {
    let quote = state.services.quotes.create(auth.user_id, input).await?;
    Ok(ApiResponse::created(quote))
}

/// GET /quotes/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Quote> {
    let quote = state.services.quotes.get(auth.user_id, &id).await?;
    Ok(ApiResponse::success(quote))
}

/// PUT /quotes/:id - Rejected with 422 once the quote is EXECUTED
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<QuoteInput>,
) -> ApiResult<Quote> {
    let quote = state.services.quotes.update(auth.user_id, &id, input).await?;
    Ok(ApiResponse::success(quote))
}

/// DELETE /quotes/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.services.quotes.delete(auth.user_id, &id).await?;
    Ok(ApiResponse::no_content())
}

/// PATCH /quotes/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<QuoteStatusInput>,
) -> ApiResult<Quote> {
    let quote = state.services.quotes.update_status(auth.user_id, &id, input).await?;
    Ok(ApiResponse::success(quote))
}

/// POST /quotes/:id/duplicate
pub async fn duplicate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Quote> {
    let quote = state.services.quotes.duplicate(auth.user_id, &id).await?;
    Ok(ApiResponse::created(quote))
}

/// GET /quotes/:id/comparison - Quoted vs executed, per category
pub async fn comparison(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<QuoteComparison> {
    let report = state.services.quotes.comparison(auth.user_id, &id).await?;
    Ok(ApiResponse::success(report))
}
