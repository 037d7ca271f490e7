//! Persistence seam shared by every domain service.
//!
//! Services only ever talk to `dyn Store`. Two implementations exist:
//! [`PgStore`](super::postgres::PgStore) for real deployments and
//! [`MemoryStore`](super::memory::MemoryStore) for tests and `serve --memory`.
//! Both enforce the same uniqueness rules so that behaviour observed in tests
//! matches production.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use super::models::{Category, Company, Quote, QuoteTemplate, RecurringTransaction, Transaction, User};
use crate::types::{CategoryType, QuoteStatus, TransactionStatus};

/// Constraint guarding user e-mail uniqueness
pub const USERS_EMAIL_KEY: &str = "users_email_key";
/// Constraint guarding one generated transaction per (company, description, month, year)
pub const TRANSACTIONS_RECURRING_KEY: &str = "transactions_recurring_period_key";
/// Constraint guarding quote number uniqueness within a company
pub const QUOTES_NUMBER_KEY: &str = "quotes_company_number_key";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to decode stored row: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation(name) if name == constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::ColumnDecode { index, source } => StoreError::Decode(format!("column {index}: {source}")),
            sqlx::Error::Decode(source) => StoreError::Decode(source.to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::UniqueViolation(db.constraint().unwrap_or_default().to_string())
            }
            other => StoreError::Sqlx(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Offset pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

/// Criteria for listing transactions of one company
#[derive(Debug, Clone)]
pub struct TransactionFilter {
    pub company_id: Uuid,
    pub month: Option<String>,
    pub year: Option<i32>,
    pub status: Option<TransactionStatus>,
    pub category: Option<String>,
    pub quote_id: Option<Uuid>,
}

impl TransactionFilter {
    pub fn for_company(company_id: Uuid) -> Self {
        Self {
            company_id,
            month: None,
            year: None,
            status: None,
            category: None,
            quote_id: None,
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        tx.company_id == self.company_id
            && self.month.as_ref().map_or(true, |m| &tx.month == m)
            && self.year.map_or(true, |y| tx.year == y)
            && self.status.map_or(true, |s| tx.status == s)
            && self.category.as_ref().map_or(true, |c| &tx.category == c)
            && self.quote_id.map_or(true, |q| tx.quote_id == Some(q))
    }
}

/// One step of a company cascade delete, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CascadeStep {
    Transactions,
    Categories,
    RecurringTransactions,
    QuoteItems,
    Quotes,
    QuoteTemplates,
    Company,
}

impl CascadeStep {
    /// Child collections, removed before the company row itself
    pub const CHILDREN: [CascadeStep; 6] = [
        CascadeStep::Transactions,
        CascadeStep::Categories,
        CascadeStep::RecurringTransactions,
        CascadeStep::QuoteItems,
        CascadeStep::Quotes,
        CascadeStep::QuoteTemplates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeStep::Transactions => "transactions",
            CascadeStep::Categories => "categories",
            CascadeStep::RecurringTransactions => "recurringTransactions",
            CascadeStep::QuoteItems => "quoteItems",
            CascadeStep::Quotes => "quotes",
            CascadeStep::QuoteTemplates => "quoteTemplates",
            CascadeStep::Company => "company",
        }
    }
}

impl fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: CascadeStep,
    pub deleted: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub steps: Vec<StepOutcome>,
}

impl CascadeReport {
    pub fn deleted(&self, step: CascadeStep) -> u64 {
        self.steps.iter().filter(|s| s.step == step).map(|s| s.deleted).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedStep {
    pub step: CascadeStep,
    pub error: String,
}

/// A cascade that could not finish. The company row is never removed while
/// any of its children failed to delete, so the tree stays reachable and the
/// delete can be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeFailure {
    pub completed: Vec<StepOutcome>,
    pub failed: Vec<FailedStep>,
}

impl CascadeFailure {
    /// Steps that did not run to completion, the company row included
    pub fn incomplete_steps(&self) -> Vec<CascadeStep> {
        let mut steps: Vec<CascadeStep> = self.failed.iter().map(|f| f.step).collect();
        if !steps.contains(&CascadeStep::Company) {
            steps.push(CascadeStep::Company);
        }
        steps
    }
}

impl fmt::Display for CascadeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed: Vec<&str> = self.failed.iter().map(|s| s.step.as_str()).collect();
        write!(f, "cascade delete incomplete, failed steps: {}", failed.join(", "))
    }
}

impl std::error::Error for CascadeFailure {}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // Users
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    // Companies
    async fn insert_company(&self, company: &Company) -> StoreResult<()>;
    async fn find_company(&self, id: Uuid) -> StoreResult<Option<Company>>;
    async fn list_companies_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Company>>;
    async fn update_company(&self, company: &Company) -> StoreResult<()>;

    /// Run a single cascade step, returning how many records it removed
    async fn delete_company_step(&self, step: CascadeStep, company_id: Uuid) -> StoreResult<u64>;

    /// Delete a company and everything it owns.
    ///
    /// The default attempts every child step even after a failure, then
    /// removes the company row only when all children are gone. Stores with
    /// multi-table transactions should override this with an atomic version.
    async fn cascade_delete_company(&self, company_id: Uuid) -> Result<CascadeReport, CascadeFailure> {
        let mut completed = Vec::new();
        let mut failed = Vec::new();

        for step in CascadeStep::CHILDREN {
            match self.delete_company_step(step, company_id).await {
                Ok(deleted) => completed.push(StepOutcome { step, deleted }),
                Err(err) => {
                    error!(%company_id, step = step.as_str(), error = %err, "Cascade step failed");
                    failed.push(FailedStep {
                        step,
                        error: err.to_string(),
                    });
                }
            }
        }

        if !failed.is_empty() {
            return Err(CascadeFailure { completed, failed });
        }

        match self.delete_company_step(CascadeStep::Company, company_id).await {
            Ok(deleted) => completed.push(StepOutcome {
                step: CascadeStep::Company,
                deleted,
            }),
            Err(err) => {
                error!(%company_id, error = %err, "Company row delete failed after children were removed");
                failed.push(FailedStep {
                    step: CascadeStep::Company,
                    error: err.to_string(),
                });
                return Err(CascadeFailure { completed, failed });
            }
        }

        info!(%company_id, "Company cascade delete completed");
        Ok(CascadeReport { steps: completed })
    }

    // Categories
    async fn insert_category(&self, category: &Category) -> StoreResult<()>;
    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    async fn list_categories(&self, company_id: Uuid, kind: Option<CategoryType>) -> StoreResult<Vec<Category>>;
    async fn update_category(&self, category: &Category) -> StoreResult<()>;
    async fn delete_category(&self, id: Uuid) -> StoreResult<bool>;

    // Transactions
    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()>;
    async fn find_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>>;
    /// Matching transactions (newest year first) and the total match count
    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<Transaction>, u64)>;
    async fn update_transaction(&self, tx: &Transaction) -> StoreResult<()>;
    async fn delete_transaction(&self, id: Uuid) -> StoreResult<bool>;
    /// Flip PAGO/ABERTO in one atomic write
    async fn toggle_transaction_status(&self, id: Uuid) -> StoreResult<Option<Transaction>>;
    async fn transaction_exists(&self, company_id: Uuid, description: &str, month: &str, year: i32) -> StoreResult<bool>;

    // Recurring rules
    async fn insert_recurring(&self, rule: &RecurringTransaction) -> StoreResult<()>;
    async fn find_recurring(&self, id: Uuid) -> StoreResult<Option<RecurringTransaction>>;
    async fn list_recurring(&self, company_id: Uuid) -> StoreResult<Vec<RecurringTransaction>>;
    async fn update_recurring(&self, rule: &RecurringTransaction) -> StoreResult<()>;
    async fn delete_recurring(&self, id: Uuid) -> StoreResult<bool>;
    /// Active rules across all companies whose day falls in `from_day..=to_day`
    async fn list_recurring_due(&self, from_day: i32, to_day: i32) -> StoreResult<Vec<RecurringTransaction>>;

    // Quotes
    /// Atomically reserve the next sequence number for (company, year)
    async fn next_quote_sequence(&self, company_id: Uuid, year: i32) -> StoreResult<i32>;
    async fn insert_quote(&self, quote: &Quote) -> StoreResult<()>;
    async fn find_quote(&self, id: Uuid) -> StoreResult<Option<Quote>>;
    async fn list_quotes(
        &self,
        company_id: Uuid,
        status: Option<QuoteStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Quote>, u64)>;
    async fn update_quote(&self, quote: &Quote) -> StoreResult<()>;
    async fn delete_quote(&self, id: Uuid) -> StoreResult<bool>;

    // Quote templates
    async fn insert_quote_template(&self, template: &QuoteTemplate) -> StoreResult<()>;
    async fn find_quote_template(&self, id: Uuid) -> StoreResult<Option<QuoteTemplate>>;
    async fn list_quote_templates(&self, company_id: Uuid) -> StoreResult<Vec<QuoteTemplate>>;
    async fn delete_quote_template(&self, id: Uuid) -> StoreResult<bool>;
}
