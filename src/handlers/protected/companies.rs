use axum::extract::{Extension, Path, State};

use crate::app::AppState;
use crate::database::models::Company;
use crate::database::CascadeReport;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::cnpj::{self, CnpjInfo};
use crate::services::company_service::CompanyInput;

/// GET /companies - Companies owned by the caller
pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Vec<Company>> {
    let companies = state.services.companies.list(auth.user_id).await?;
    Ok(ApiResponse::success(companies))
}

/// POST /companies
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    JsonBody(input): JsonBody<CompanyInput>,
) -> ApiResult<Company> {
    let company = state.services.companies.create(auth.user_id, input).await?;
    Ok(ApiResponse::created(company))
}

/// GET /companies/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Company> {
    let company = state.services.companies.get(auth.user_id, &id).await?;
    Ok(ApiResponse::success(company))
}

/// PUT /companies/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<CompanyInput>,
) -> ApiResult<Company> {
    let company = state.services.companies.update(auth.user_id, &id, input).await?;
    Ok(ApiResponse::success(company))
}

/// DELETE /companies/:id - Removes the company and everything it owns.
/// Responds with the number of records removed per collection.
pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<CascadeReport> {
    let report = state.services.companies.delete(auth.user_id, &id).await?;
    Ok(ApiResponse::success(report))
}

/// GET /companies/cnpj/:cnpj - Registry data to prefill a company form
pub async fn cnpj_lookup(State(state): State<AppState>, Path(raw): Path<String>) -> ApiResult<CnpjInfo> {
    let info = cnpj::lookup(state.services.cnpj.as_ref(), &raw).await?;
    Ok(ApiResponse::success(info))
}
