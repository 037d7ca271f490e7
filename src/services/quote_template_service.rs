use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::quote_service::{build_items, QuoteItemInput};
use super::{Ownership, ServiceError, ServiceResult};
use crate::database::models::QuoteTemplate;
use crate::database::Store;
use crate::validation::{rules, Validator};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTemplateInput {
    pub company_id: Option<String>,
    pub name: Option<String>,
    pub items: Option<Vec<QuoteItemInput>>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct QuoteTemplateService {
    store: Arc<dyn Store>,
    ownership: Ownership,
}

impl QuoteTemplateService {
    pub fn new(store: Arc<dyn Store>, ownership: Ownership) -> Self {
        Self { store, ownership }
    }

    pub async fn create(&self, user_id: Uuid, input: QuoteTemplateInput) -> ServiceResult<QuoteTemplate> {
        let raw_company = input
            .company_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError::invalid_field("companyId", rules::required_message("companyId")))?;
        let company = self.ownership.company(user_id, raw_company).await?;
        let categories: HashSet<Uuid> = self
            .store
            .list_categories(company.id, None)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let mut v = Validator::new();
        let name = v.require_text(input.name.as_deref(), 100, "name");
        let notes = v.optional_text(input.notes.as_deref(), 1000, "notes");
        let inputs = input.items.as_deref().unwrap_or_default();
        if inputs.is_empty() {
            v.push("items", "O modelo precisa de pelo menos um item");
        }
        let items = build_items(inputs, &categories, &mut v);
        v.finish()?;

        let now = Utc::now();
        let template = QuoteTemplate {
            id: Uuid::new_v4(),
            company_id: company.id,
            name,
            items,
            notes,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_quote_template(&template).await?;
        Ok(template)
    }

    pub async fn list(&self, user_id: Uuid, raw_company_id: &str) -> ServiceResult<Vec<QuoteTemplate>> {
        let company = self.ownership.company(user_id, raw_company_id).await?;
        Ok(self.store.list_quote_templates(company.id).await?)
    }

    pub async fn get(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<QuoteTemplate> {
        let (template, _) = self.ownership.resolve::<QuoteTemplate>(user_id, raw_id).await?;
        Ok(template)
    }

    pub async fn delete(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<()> {
        let (template, _) = self.ownership.resolve::<QuoteTemplate>(user_id, raw_id).await?;
        if !self.store.delete_quote_template(template.id).await? {
            return Err(ServiceError::NotFound("Modelo de orçamento não encontrado".to_string()));
        }
        Ok(())
    }
}
