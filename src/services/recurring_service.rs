use chrono::{Datelike, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::transaction_service::{MAX_YEAR, MIN_YEAR};
use super::{Ownership, ServiceError, ServiceResult};
use crate::database::models::{RecurringTransaction, Transaction};
use crate::database::store::TRANSACTIONS_RECURRING_KEY;
use crate::database::{Store, StoreResult};
use crate::types::{month_name, CategoryType, TransactionStatus};
use crate::validation::{rules, Lenient, Validator};

/// Rules materialized concurrently by the daily batch
const BATCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringInput {
    pub company_id: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Lenient<Decimal>>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub day_of_month: Option<Lenient<i64>>,
    pub active: Option<Lenient<bool>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInput {
    pub company_id: Option<String>,
    pub month: Option<String>,
    pub year: Option<Lenient<i64>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReport {
    pub month: String,
    pub year: i32,
    pub created: usize,
    pub skipped: usize,
    pub transactions: Vec<Transaction>,
}

/// Outcome of one run over every company's due rules
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub date: NaiveDate,
    pub month: String,
    pub year: i32,
    pub rules: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Materialized {
    Created(Transaction),
    Skipped,
}

struct RecurringFields {
    description: String,
    amount: Decimal,
    category: String,
    kind: CategoryType,
    day_of_month: i32,
    active: Option<bool>,
}

fn validate(input: &RecurringInput, v: &mut Validator) -> RecurringFields {
    let description = v.require_text(input.description.as_deref(), 200, "description");
    let amount = v.typed(input.amount.as_ref(), "amount");
    let amount = v.require_positive(amount, "amount");
    let category = v.require_text(input.category.as_deref(), 50, "category");
    let kind = match input.kind.as_deref() {
        Some(raw) => v.require_enum::<CategoryType>(Some(raw), "type", rules::category_type),
        None => None,
    };
    let day = v.typed(input.day_of_month.as_ref(), "dayOfMonth");
    if let Some(day) = day {
        v.check(rules::day_of_month(day, "dayOfMonth"));
    }
    let day = v.require(day, "dayOfMonth");
    let active = v.typed(input.active.as_ref(), "active");

    RecurringFields {
        description,
        amount,
        category,
        kind: kind.unwrap_or(CategoryType::Expense),
        day_of_month: i32::try_from(day).unwrap_or_default(),
        active,
    }
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.month() != date.month())
}

#[derive(Clone)]
pub struct RecurringService {
    store: Arc<dyn Store>,
    ownership: Ownership,
}

impl RecurringService {
    pub fn new(store: Arc<dyn Store>, ownership: Ownership) -> Self {
        Self { store, ownership }
    }

    pub async fn create(&self, user_id: Uuid, input: RecurringInput) -> ServiceResult<RecurringTransaction> {
        let company = match input.company_id.as_deref() {
            Some(raw) => Some(self.ownership.company(user_id, raw).await?),
            None => None,
        };

        let mut v = Validator::new();
        let company_id = v.require(company.map(|c| c.id), "companyId");
        let fields = validate(&input, &mut v);
        v.finish()?;

        let now = Utc::now();
        let rule = RecurringTransaction {
            id: Uuid::new_v4(),
            company_id,
            description: fields.description,
            amount: fields.amount,
            category: fields.category,
            kind: fields.kind,
            day_of_month: fields.day_of_month,
            active: fields.active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_recurring(&rule).await?;
        Ok(rule)
    }

    pub async fn list(&self, user_id: Uuid, raw_company_id: &str) -> ServiceResult<Vec<RecurringTransaction>> {
        let company = self.ownership.company(user_id, raw_company_id).await?;
        Ok(self.store.list_recurring(company.id).await?)
    }

    pub async fn get(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<RecurringTransaction> {
        let (rule, _) = self.ownership.resolve::<RecurringTransaction>(user_id, raw_id).await?;
        Ok(rule)
    }

    pub async fn update(&self, user_id: Uuid, raw_id: &str, input: RecurringInput) -> ServiceResult<RecurringTransaction> {
        let (mut rule, _) = self.ownership.resolve::<RecurringTransaction>(user_id, raw_id).await?;

        let mut v = Validator::new();
        let fields = validate(&input, &mut v);
        v.finish()?;

        rule.description = fields.description;
        rule.amount = fields.amount;
        rule.category = fields.category;
        if input.kind.is_some() {
            rule.kind = fields.kind;
        }
        rule.day_of_month = fields.day_of_month;
        rule.active = fields.active.unwrap_or(rule.active);
        rule.updated_at = Utc::now();

        self.store.update_recurring(&rule).await?;
        Ok(rule)
    }

    /// Transactions already generated from the rule are kept
    pub async fn delete(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<()> {
        let (rule, _) = self.ownership.resolve::<RecurringTransaction>(user_id, raw_id).await?;
        if !self.store.delete_recurring(rule.id).await? {
            return Err(ServiceError::NotFound("Transação recorrente não encontrada".to_string()));
        }
        Ok(())
    }

    /// Generate this period's transaction for every active rule of a company.
    ///
    /// Rules whose transaction already exists are skipped, so running the same
    /// period twice creates nothing the second time. Defaults to the current
    /// month and year.
    pub async fn process_for_period(&self, user_id: Uuid, input: ProcessInput) -> ServiceResult<ProcessReport> {
        let raw_company = input
            .company_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError::invalid_field("companyId", rules::required_message("companyId")))?;
        let company = self.ownership.company(user_id, raw_company).await?;

        let today = Utc::now().date_naive();
        let mut v = Validator::new();
        let month = match input.month.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            Some(month) => {
                v.check(rules::calendar_month(month, "month"));
                month.to_string()
            }
            None => month_name(today.month()).unwrap_or_default().to_string(),
        };
        let year = match &input.year {
            Some(_) => v.typed(input.year.as_ref(), "year").unwrap_or_default(),
            None => i64::from(today.year()),
        };
        if !v.has_error_for("year") {
            v.check(rules::numeric_range(year, MIN_YEAR, MAX_YEAR, "year"));
        }
        v.finish()?;
        let year = i32::try_from(year).unwrap_or_default();

        let rules = self.store.list_recurring(company.id).await?;
        let mut report = ProcessReport {
            month: month.clone(),
            year,
            created: 0,
            skipped: 0,
            transactions: Vec::new(),
        };
        for rule in rules.iter().filter(|r| r.active) {
            match self.materialize(rule, &month, year).await? {
                Materialized::Created(tx) => {
                    report.created += 1;
                    report.transactions.push(tx);
                }
                Materialized::Skipped => report.skipped += 1,
            }
        }

        info!(
            company_id = %company.id,
            %month,
            year,
            created = report.created,
            skipped = report.skipped,
            "Processed recurring transactions"
        );
        Ok(report)
    }

    /// Materialize every active rule due on `date`, across all companies.
    ///
    /// On the last day of a month, rules scheduled for later days (29-31)
    /// are due as well. A failing rule is logged and counted; it does not stop
    /// the batch.
    pub async fn process_all_due(&self, date: NaiveDate) -> ServiceResult<BatchReport> {
        let day = i32::try_from(date.day()).unwrap_or(1);
        let to_day = if is_last_day_of_month(date) { 31 } else { day };
        let month = month_name(date.month()).unwrap_or_default().to_string();
        let year = date.year();

        let due = self.store.list_recurring_due(day, to_day).await?;
        let outcomes: Vec<(Uuid, StoreResult<Materialized>)> = stream::iter(due.iter())
            .map(|rule| {
                let month = month.as_str();
                async move { (rule.id, self.materialize(rule, month, year).await) }
            })
            .buffer_unordered(BATCH_CONCURRENCY)
            .collect()
            .await;

        let mut report = BatchReport {
            date,
            month,
            year,
            rules: due.len(),
            created: 0,
            skipped: 0,
            failed: 0,
        };
        for (rule_id, outcome) in outcomes {
            match outcome {
                Ok(Materialized::Created(_)) => report.created += 1,
                Ok(Materialized::Skipped) => report.skipped += 1,
                Err(err) => {
                    error!(%rule_id, error = %err, "Failed to materialize recurring transaction");
                    report.failed += 1;
                }
            }
        }

        info!(
            %date,
            rules = report.rules,
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            "Processed due recurring transactions"
        );
        Ok(report)
    }

    async fn materialize(&self, rule: &RecurringTransaction, month: &str, year: i32) -> StoreResult<Materialized> {
        // Fast path; the unique index is what actually guarantees one row
        if self
            .store
            .transaction_exists(rule.company_id, &rule.description, month, year)
            .await?
        {
            return Ok(Materialized::Skipped);
        }

        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            company_id: rule.company_id,
            month: month.to_string(),
            year,
            amount: rule.amount,
            category: rule.category.clone(),
            status: TransactionStatus::Aberto,
            description: Some(rule.description.clone()),
            recurring_id: Some(rule.id),
            quote_id: None,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_transaction(&tx).await {
            Ok(()) => Ok(Materialized::Created(tx)),
            Err(err) if err.is_unique_violation(TRANSACTIONS_RECURRING_KEY) => Ok(Materialized::Skipped),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TransactionFilter;
    use crate::testing::TestContext;

    fn process(company_id: Uuid, month: &str) -> ProcessInput {
        ProcessInput {
            company_id: Some(company_id.to_string()),
            month: Some(month.to_string()),
            year: Some(2025_i64.into()),
        }
    }

    #[tokio::test]
    async fn second_run_for_the_same_period_creates_nothing() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        ctx.recurring(alice.id, company.id, "Internet", 10).await;
        ctx.recurring(alice.id, company.id, "Aluguel", 5).await;
        ctx.recurring(alice.id, company.id, "Contador", 20).await;
        let service = &ctx.services.recurring;

        let first = service.process_for_period(alice.id, process(company.id, "Março")).await.unwrap();
        assert_eq!(first.created, 3);
        assert_eq!(first.skipped, 0);
        assert!(first.transactions.iter().all(|t| t.status == TransactionStatus::Aberto));

        let second = service.process_for_period(alice.id, process(company.id, "Março")).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 3);

        let mut filter = TransactionFilter::for_company(company.id);
        filter.month = Some("Março".to_string());
        let (_, total) = ctx.store.list_transactions(&filter, None).await.unwrap();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn inactive_rules_are_ignored() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        let rule = ctx.recurring(alice.id, company.id, "Internet", 10).await;
        ctx.services
            .recurring
            .update(
                alice.id,
                &rule.id.to_string(),
                RecurringInput {
                    description: Some(rule.description.clone()),
                    amount: Some(rule.amount.into()),
                    category: Some(rule.category.clone()),
                    day_of_month: Some(10_i64.into()),
                    active: Some(false.into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let report = ctx
            .services
            .recurring
            .process_for_period(alice.id, process(company.id, "Abril"))
            .await
            .unwrap();
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn concurrent_runs_never_double_create() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        ctx.recurring(alice.id, company.id, "Internet", 10).await;
        let service = &ctx.services.recurring;

        let (a, b) = tokio::join!(
            service.process_for_period(alice.id, process(company.id, "Maio")),
            service.process_for_period(alice.id, process(company.id, "Maio")),
        );
        assert_eq!(a.unwrap().created + b.unwrap().created, 1);
    }

    #[tokio::test]
    async fn invalid_rule_fields_are_reported() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        let err = ctx
            .services
            .recurring
            .create(
                alice.id,
                RecurringInput {
                    company_id: Some(company.id.to_string()),
                    description: Some("d".repeat(201)),
                    amount: Some(Decimal::ZERO.into()),
                    category: None,
                    kind: None,
                    day_of_month: Some(32_i64.into()),
                    active: None,
                },
            )
            .await
            .unwrap_err();
        let ServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        for field in ["description", "amount", "category", "dayOfMonth"] {
            assert!(errors.has_field(field), "missing error for {field}");
        }
    }

    #[tokio::test]
    async fn daily_batch_picks_due_rules_across_companies() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let (bob, _) = ctx.register("bob@example.com").await;
        let a = ctx.company(alice.id, "Alice Co").await;
        let b = ctx.company(bob.id, "Bob Co").await;
        ctx.recurring(alice.id, a.id, "Internet", 10).await;
        ctx.recurring(bob.id, b.id, "Luz", 10).await;
        ctx.recurring(bob.id, b.id, "Água", 11).await;

        let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let report = ctx.services.recurring.process_all_due(date).await.unwrap();
        assert_eq!(report.rules, 2);
        assert_eq!(report.created, 2);
        assert_eq!(report.month, "Junho");

        let again = ctx.services.recurring.process_all_due(date).await.unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.skipped, 2);
    }

    #[tokio::test]
    async fn last_day_of_short_month_includes_later_days() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        ctx.recurring(alice.id, company.id, "Fatura", 30).await;
        ctx.recurring(alice.id, company.id, "Aluguel", 28).await;

        let date = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        let report = ctx.services.recurring.process_all_due(date).await.unwrap();
        assert_eq!(report.created, 2);
    }

    #[test]
    fn detects_last_day_of_month() {
        assert!(is_last_day_of_month(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!is_last_day_of_month(NaiveDate::from_ymd_opt(2025, 1, 30).unwrap()));
        assert!(is_last_day_of_month(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
    }
}
