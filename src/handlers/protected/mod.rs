// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every route here sits behind `jwt_auth_middleware`, which puts an
// `AuthUser` in the request extensions. Ownership of the addressed records is
// checked by the services, not here.

pub mod auth;
pub mod categories;
pub mod companies;
pub mod quote_templates;
pub mod quotes;
pub mod recurring;
pub mod transactions;

use serde::Deserialize;

use crate::error::ApiError;
use crate::validation::{rules, FieldError};

/// `?companyId=` for company-scoped list endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyScope {
    pub company_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl CompanyScope {
    pub fn company_id(&self) -> Result<&str, ApiError> {
        self.company_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ApiError::Validation(vec![FieldError::new("companyId", rules::required_message("companyId"))])
            })
    }
}
