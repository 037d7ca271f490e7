use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{Ownership, ServiceError, ServiceResult};
use crate::database::models::Category;
use crate::database::Store;
use crate::types::CategoryType;
use crate::validation::{rules, Lenient, ValidationErrors, Validator};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub company_id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub color: Option<String>,
    pub budget: Option<Lenient<Decimal>>,
}

struct CategoryFields {
    name: String,
    kind: CategoryType,
    color: String,
    budget: Decimal,
}

/// Placeholders returned alongside recorded errors never reach the store:
/// callers always run `Validator::finish` before using the fields.
fn validate(input: &CategoryInput, v: &mut Validator) -> CategoryFields {
    let name = v.require_text(input.name.as_deref(), 50, "name");
    let kind = v.require_enum::<CategoryType>(input.kind.as_deref(), "type", rules::category_type);

    let color = input.color.as_deref().map(str::trim).unwrap_or_default().to_string();
    if v.check(rules::required(&color, "color")) {
        v.check(rules::hex_color(&color, "color"));
    }

    let budget = v.typed(input.budget.as_ref(), "budget").unwrap_or_default();
    if !v.has_error_for("budget") {
        v.check(rules::non_negative(budget, "budget"));
    }

    CategoryFields {
        name,
        kind: kind.unwrap_or(CategoryType::Expense),
        color,
        budget,
    }
}

#[derive(Clone)]
pub struct CategoryService {
    store: Arc<dyn Store>,
    ownership: Ownership,
}

impl CategoryService {
    pub fn new(store: Arc<dyn Store>, ownership: Ownership) -> Self {
        Self { store, ownership }
    }

    pub async fn create(&self, user_id: Uuid, input: CategoryInput) -> ServiceResult<Category> {
        let company = match input.company_id.as_deref() {
            Some(raw) => Some(self.ownership.company(user_id, raw).await?),
            None => None,
        };

        let mut v = Validator::new();
        let company_id = v.require(company.map(|c| c.id), "companyId");
        let fields = validate(&input, &mut v);
        v.finish()?;

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            company_id,
            name: fields.name,
            kind: fields.kind,
            color: fields.color,
            budget: fields.budget,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_category(&category).await?;
        Ok(category)
    }

    /// Categories of one company, optionally only one type
    pub async fn list(&self, user_id: Uuid, raw_company_id: &str, kind: Option<&str>) -> ServiceResult<Vec<Category>> {
        let company = self.ownership.company(user_id, raw_company_id).await?;
        let kind = match kind.map(str::trim).filter(|k| !k.is_empty()) {
            Some(raw) => {
                rules::category_type(raw, "type").map_err(ValidationErrors::single)?;
                raw.parse::<CategoryType>().ok()
            }
            None => None,
        };
        Ok(self.store.list_categories(company.id, kind).await?)
    }

    pub async fn get(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<Category> {
        let (category, _) = self.ownership.resolve::<Category>(user_id, raw_id).await?;
        Ok(category)
    }

    pub async fn update(&self, user_id: Uuid, raw_id: &str, input: CategoryInput) -> ServiceResult<Category> {
        let (mut category, _) = self.ownership.resolve::<Category>(user_id, raw_id).await?;

        let mut v = Validator::new();
        let fields = validate(&input, &mut v);
        v.finish()?;

        category.name = fields.name;
        category.kind = fields.kind;
        category.color = fields.color;
        category.budget = fields.budget;
        category.updated_at = Utc::now();

        self.store.update_category(&category).await?;
        Ok(category)
    }

    pub async fn delete(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<()> {
        let (category, _) = self.ownership.resolve::<Category>(user_id, raw_id).await?;
        if !self.store.delete_category(category.id).await? {
            return Err(ServiceError::NotFound("Categoria não encontrada".to_string()));
        }
        Ok(())
    }
}
