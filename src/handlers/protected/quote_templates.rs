use axum::extract::{Extension, Path, State};

use super::CompanyScope;
use crate::app::AppState;
use crate::database::models::QuoteTemplate;
use crate::middleware::{ApiQuery, ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::quote_template_service::QuoteTemplateInput;

/// GET /quote-templates?companyId=
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(scope): ApiQuery<CompanyScope>,
) -> ApiResult<Vec<QuoteTemplate>> {
    let templates = state
        .services
        .quote_templates
        .list(auth.user_id, scope.company_id()?)
        .await?;
    Ok(ApiResponse::success(templates))
}

/// POST /quote-templates
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(input): JsonBody<QuoteTemplateInput>,
) -> ApiResult<QuoteTemplate> {
    let template = state.services.quote_templates.create(auth.user_id, input).await?;
    Ok(ApiResponse::created(template))
}

/// GET /quote-templates/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<QuoteTemplate> {
    let template = state.services.quote_templates.get(auth.user_id, &id).await?;
    Ok(ApiResponse::success(template))
}

/// DELETE /quote-templates/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.services.quote_templates.delete(auth.user_id, &id).await?;
    Ok(ApiResponse::no_content())
}
