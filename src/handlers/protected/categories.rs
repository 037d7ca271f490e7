use axum::extract::{Extension, Path, State};

use super::CompanyScope;
use crate::app::AppState;
use crate::database::models::Category;
use crate::middleware::{ApiQuery, ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::category_service::CategoryInput;

/// GET /categories?companyId=&type=
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(scope): ApiQuery<CompanyScope>,
) -> ApiResult<Vec<Category>> {
    let categories = state
        .services
        .categories
        .list(auth.user_id, scope.company_id()?, scope.kind.as_deref())
        .await?;
    Ok(ApiResponse::success(categories))
}

/// POST /categories
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(input): JsonBody<CategoryInput>,
) -> ApiResult<Category> {
    let category = state.services.categories.create(auth.user_id, input).await?;
    Ok(ApiResponse::created(category))
}

/// GET /categories/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Category> {
    let category = state.services.categories.get(auth.user_id, &id).await?;
    Ok(ApiResponse::success(category))
}

/// PUT /categories/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<CategoryInput>,
) -> ApiResult<Category> {
    let category = state.services.categories.update(auth.user_id, &id, input).await?;
    Ok(ApiResponse::success(category))
}

/// DELETE /categories/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.services.categories.delete(auth.user_id, &id).await?;
    Ok(ApiResponse::no_content())
}
