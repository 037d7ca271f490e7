use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Ownership, ServiceError, ServiceResult};
use crate::database::models::Company;
use crate::database::{CascadeReport, Store};
use crate::validation::{rules, ValidationErrors, Validator};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInput {
    pub name: Option<String>,
    pub cnpj: Option<String>,
    pub legal_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

struct CompanyFields {
    name: String,
    cnpj: Option<String>,
    legal_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
}

fn validate(input: &CompanyInput) -> Result<CompanyFields, ValidationErrors> {
    let mut v = Validator::new();
    let name = v.require_text(input.name.as_deref(), 100, "name");
    let legal_name = v.optional_text(input.legal_name.as_deref(), 200, "legalName");
    let phone = v.optional_text(input.phone.as_deref(), 20, "phone");
    let address = v.optional_text(input.address.as_deref(), 300, "address");

    let cnpj = match input.cnpj.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => {
            let normalized = rules::normalize_cnpj(raw);
            if normalized.is_none() {
                v.check(rules::cnpj(raw, "cnpj"));
            }
            normalized
        }
        None => None,
    };

    let email = match input.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => {
            let email = raw.to_lowercase();
            v.check(rules::email(&email, "email")).then_some(email)
        }
        None => None,
    };

    v.finish()?;
    Ok(CompanyFields {
        name,
        cnpj,
        legal_name,
        email,
        phone,
        address,
    })
}

#[derive(Clone)]
pub struct CompanyService {
    store: Arc<dyn Store>,
    ownership: Ownership,
}

impl CompanyService {
    pub fn new(store: Arc<dyn Store>, ownership: Ownership) -> Self {
        Self { store, ownership }
    }

    pub async fn create(&self, user_id: Uuid, input: CompanyInput) -> ServiceResult<Company> {
        let fields = validate(&input)?;
        let now = Utc::now();
        let company = Company {
            id: Uuid::new_v4(),
            user_id,
            name: fields.name,
            cnpj: fields.cnpj,
            legal_name: fields.legal_name,
            email: fields.email,
            phone: fields.phone,
            address: fields.address,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_company(&company).await?;
        info!(company_id = %company.id, %user_id, "Created company");
        Ok(company)
    }

    pub async fn list(&self, user_id: Uuid) -> ServiceResult<Vec<Company>> {
        Ok(self.store.list_companies_by_user(user_id).await?)
    }

    pub async fn get(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<Company> {
        self.ownership.company(user_id, raw_id).await
    }

    /// Replace the editable fields. The owner never changes.
    pub async fn update(&self, user_id: Uuid, raw_id: &str, input: CompanyInput) -> ServiceResult<Company> {
        let mut company = self.ownership.company(user_id, raw_id).await?;
        let fields = validate(&input)?;

        company.name = fields.name;
        company.cnpj = fields.cnpj;
        company.legal_name = fields.legal_name;
        company.email = fields.email;
        company.phone = fields.phone;
        company.address = fields.address;
        company.updated_at = Utc::now();

        self.store.update_company(&company).await?;
        Ok(company)
    }

    /// Delete the company and every record it owns
    pub async fn delete(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<CascadeReport> {
        let company = self.ownership.company(user_id, raw_id).await?;
        match self.store.cascade_delete_company(company.id).await {
            Ok(report) => {
                info!(company_id = %company.id, steps = report.steps.len(), "Deleted company and its records");
                Ok(report)
            }
            Err(failure) => {
                warn!(company_id = %company.id, %failure, "Company delete left records behind");
                Err(ServiceError::CascadeIncomplete(failure))
            }
        }
    }
}
