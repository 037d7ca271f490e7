use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{Ownership, PageRequest, Paginated, ServiceError, ServiceResult};
use crate::database::models::{Company, Transaction};
use crate::database::{Store, TransactionFilter};
use crate::types::{CategoryType, TransactionStatus};
use crate::validation::{rules, sanitize, Lenient, Validator};

pub const MIN_YEAR: i64 = 2000;
pub const MAX_YEAR: i64 = 2100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub company_id: Option<String>,
    pub month: Option<String>,
    pub year: Option<Lenient<i64>>,
    pub amount: Option<Lenient<Decimal>>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub quote_id: Option<String>,
}

/// List filters, all optional except the company
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub company_id: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub paid: Decimal,
    pub open: Decimal,
    pub total: Decimal,
}

impl Totals {
    fn add(&mut self, status: TransactionStatus, amount: Decimal) {
        match status {
            TransactionStatus::Pago => self.paid += amount,
            TransactionStatus::Aberto => self.open += amount,
        }
        self.total += amount;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub company_id: Uuid,
    pub month: Option<String>,
    pub year: Option<i32>,
    pub income: Totals,
    pub expense: Totals,
    pub balance: Decimal,
    pub count: u64,
}

struct TransactionFields {
    month: String,
    year: i32,
    amount: Decimal,
    category: String,
    status: Option<TransactionStatus>,
    description: Option<String>,
}

fn validate(input: &TransactionInput, v: &mut Validator) -> TransactionFields {
    let month = input.month.as_deref().map(str::trim).unwrap_or_default().to_string();
    if v.check(rules::required(&month, "month")) {
        v.check(rules::month(&month, "month"));
    }

    let year = v.typed(input.year.as_ref(), "year");
    if let Some(year) = year {
        v.check(rules::numeric_range(year, MIN_YEAR, MAX_YEAR, "year"));
    }
    let year = v.require(year, "year");

    let amount = v.typed(input.amount.as_ref(), "amount");
    let amount = v.require_positive(amount, "amount");
    let category = v.require_text(input.category.as_deref(), 50, "category");

    let status = match input.status.as_deref() {
        Some(raw) => v.require_enum::<TransactionStatus>(Some(raw), "status", rules::transaction_status),
        None => None,
    };
    let description = v.optional_text(input.description.as_deref(), 200, "description");

    TransactionFields {
        month,
        year: i32::try_from(year).unwrap_or_default(),
        amount,
        category,
        status,
        description,
    }
}

#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn Store>,
    ownership: Ownership,
}

impl TransactionService {
    pub fn new(store: Arc<dyn Store>, ownership: Ownership) -> Self {
        Self { store, ownership }
    }

    pub async fn create(&self, user_id: Uuid, input: TransactionInput) -> ServiceResult<Transaction> {
        let company = match input.company_id.as_deref() {
            Some(raw) => Some(self.ownership.company(user_id, raw).await?),
            None => None,
        };

        let mut v = Validator::new();
        let company_id = v.require(company.as_ref().map(|c| c.id), "companyId");
        let fields = validate(&input, &mut v);
        let quote_id = match &company {
            Some(company) => self.linked_quote(company, input.quote_id.as_deref(), &mut v).await?,
            None => None,
        };
        v.finish()?;

        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            company_id,
            month: fields.month,
            year: fields.year,
            amount: fields.amount,
            category: fields.category,
            status: fields.status.unwrap_or(TransactionStatus::Aberto),
            description: fields.description,
            recurring_id: None,
            quote_id,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_transaction(&tx).await?;
        Ok(tx)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        query: &TransactionQuery,
        page: PageRequest,
    ) -> ServiceResult<Paginated<Transaction>> {
        let filter = self.filter(user_id, query).await?;
        let (rows, total) = self.store.list_transactions(&filter, Some(page.window())).await?;
        Ok(page.paginate(rows, total))
    }

    pub async fn get(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<Transaction> {
        let (tx, _) = self.ownership.resolve::<Transaction>(user_id, raw_id).await?;
        Ok(tx)
    }

    /// Replace the editable fields. A missing status keeps the current one.
    pub async fn update(&self, user_id: Uuid, raw_id: &str, input: TransactionInput) -> ServiceResult<Transaction> {
        let (mut tx, company) = self.ownership.resolve::<Transaction>(user_id, raw_id).await?;

        let mut v = Validator::new();
        let fields = validate(&input, &mut v);
        let quote_id = self.linked_quote(&company, input.quote_id.as_deref(), &mut v).await?;
        v.finish()?;

        tx.month = fields.month;
        tx.year = fields.year;
        tx.amount = fields.amount;
        tx.category = fields.category;
        tx.status = fields.status.unwrap_or(tx.status);
        tx.description = fields.description;
        tx.quote_id = quote_id;
        tx.updated_at = Utc::now();

        self.store.update_transaction(&tx).await?;
        Ok(tx)
    }

    pub async fn delete(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<()> {
        let (tx, _) = self.ownership.resolve::<Transaction>(user_id, raw_id).await?;
        if !self.store.delete_transaction(tx.id).await? {
            return Err(ServiceError::NotFound("Transação não encontrada".to_string()));
        }
        Ok(())
    }

    /// Flip PAGO and ABERTO in a single store write
    pub async fn toggle_status(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<Transaction> {
        let (tx, _) = self.ownership.resolve::<Transaction>(user_id, raw_id).await?;
        self.store
            .toggle_transaction_status(tx.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Transação não encontrada".to_string()))
    }

    /// Income and expense totals for a company, optionally one period.
    ///
    /// A transaction's side is taken from the company category with the same
    /// name (case-insensitive); unknown categories count as expense.
    pub async fn summary(&self, user_id: Uuid, query: &TransactionQuery) -> ServiceResult<TransactionSummary> {
        let filter = self.filter(user_id, query).await?;
        let (rows, total) = self.store.list_transactions(&filter, None).await?;

        let kinds: HashMap<String, CategoryType> = self
            .store
            .list_categories(filter.company_id, None)
            .await?
            .into_iter()
            .map(|c| (c.name.to_lowercase(), c.kind))
            .collect();

        let mut income = Totals::default();
        let mut expense = Totals::default();
        for tx in &rows {
            match kinds.get(&tx.category.to_lowercase()) {
                Some(CategoryType::Income) => income.add(tx.status, tx.amount),
                _ => expense.add(tx.status, tx.amount),
            }
        }

        Ok(TransactionSummary {
            company_id: filter.company_id,
            month: filter.month,
            year: filter.year,
            balance: income.total - expense.total,
            income,
            expense,
            count: total,
        })
    }

    async fn filter(&self, user_id: Uuid, query: &TransactionQuery) -> ServiceResult<TransactionFilter> {
        let raw_company = query
            .company_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError::invalid_field("companyId", rules::required_message("companyId")))?;
        let company = self.ownership.company(user_id, raw_company).await?;

        let mut v = Validator::new();
        let mut filter = TransactionFilter::for_company(company.id);

        if let Some(month) = non_blank(query.month.as_deref()) {
            if v.check(rules::month(month, "month")) {
                filter.month = Some(month.to_string());
            }
        }
        if let Some(year) = non_blank(query.year.as_deref()) {
            match year.parse::<i64>() {
                Ok(parsed) if v.check(rules::numeric_range(parsed, MIN_YEAR, MAX_YEAR, "year")) => {
                    filter.year = i32::try_from(parsed).ok();
                }
                Ok(_) => {}
                Err(_) => v.push("year", format!("year deve estar entre {MIN_YEAR} e {MAX_YEAR}")),
            }
        }
        if let Some(status) = non_blank(query.status.as_deref()) {
            if v.check(rules::transaction_status(status, "status")) {
                filter.status = status.parse().ok();
            }
        }
        if let Some(category) = non_blank(query.category.as_deref()) {
            filter.category = Some(sanitize(category));
        }

        v.finish()?;
        Ok(filter)
    }

    /// Resolve an optional `quoteId` that must belong to the same company
    async fn linked_quote(&self, company: &Company, raw: Option<&str>, v: &mut Validator) -> ServiceResult<Option<Uuid>> {
        let Some(raw) = non_blank(raw) else {
            return Ok(None);
        };
        let Ok(quote_id) = Ownership::parse_id(raw) else {
            v.push("quoteId", "quoteId inválido");
            return Ok(None);
        };
        match self.store.find_quote(quote_id).await? {
            Some(quote) if quote.company_id == company.id => Ok(Some(quote.id)),
            _ => {
                v.push("quoteId", "Orçamento não encontrado para esta empresa");
                Ok(None)
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
