use async_trait::async_trait;
use sqlx::{Executor, FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use super::models::{Category, Company, Quote, QuoteItem, QuoteTemplate, RecurringTransaction, Transaction, User};
use super::store::{
    CascadeFailure, CascadeReport, CascadeStep, FailedStep, Page, StepOutcome, Store, StoreError, StoreResult,
    TransactionFilter,
};
use crate::types::{CategoryType, QuoteStatus};

const SCHEMA: &str = include_str!("schema.sql");

const TRANSACTION_COLUMNS: &str =
    "id, company_id, month, year, amount, category, status, description, recurring_id, quote_id, created_at, updated_at";

const QUOTE_COLUMNS: &str = "id, company_id, number, year, sequence, client_name, client_email, client_phone, \
     client_document, subtotal, discount, total, status, notes, valid_until, created_at, updated_at";

#[derive(FromRow)]
struct QuoteItemRow {
    quote_id: Uuid,
    #[sqlx(flatten)]
    item: QuoteItem,
}

/// Statements for one cascade step. The row count of the last statement is
/// the step's reported count.
fn step_statements(step: CascadeStep) -> &'static [&'static str] {
    match step {
        CascadeStep::Transactions => &["DELETE FROM transactions WHERE company_id = $1"],
        CascadeStep::Categories => &["DELETE FROM categories WHERE company_id = $1"],
        CascadeStep::RecurringTransactions => &["DELETE FROM recurring_transactions WHERE company_id = $1"],
        CascadeStep::QuoteItems => {
            &["DELETE FROM quote_items WHERE quote_id IN (SELECT id FROM quotes WHERE company_id = $1)"]
        }
        CascadeStep::Quotes => &["DELETE FROM quotes WHERE company_id = $1"],
        CascadeStep::QuoteTemplates => &["DELETE FROM quote_templates WHERE company_id = $1"],
        CascadeStep::Company => &[
            "DELETE FROM quote_counters WHERE company_id = $1",
            "DELETE FROM companies WHERE id = $1",
        ],
    }
}

fn push_transaction_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a TransactionFilter) {
    qb.push(" WHERE company_id = ").push_bind(filter.company_id);
    if let Some(month) = &filter.month {
        qb.push(" AND month = ").push_bind(month.as_str());
    }
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(year);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(quote_id) = filter.quote_id {
        qb.push(" AND quote_id = ").push_bind(quote_id);
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn affected_one(rows: u64) -> StoreResult<()> {
    if rows == 0 {
        Err(StoreError::NotFound)
    } else {
        Ok(())
    }
}

/// Postgres-backed store. Every call is bounded by the configured operation
/// timeout; a call that runs out of time is abandoned and its transaction,
/// if any, rolls back when dropped.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    op_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    /// Apply the bundled schema. Safe to run repeatedly.
    pub async fn migrate(&self) -> StoreResult<()> {
        self.bounded(self.pool.execute(SCHEMA)).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    async fn bounded<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        }
    }

    async fn load_items(&self, quote_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<QuoteItem>>> {
        let rows: Vec<QuoteItemRow> = self
            .bounded(
                sqlx::query_as(
                    "SELECT quote_id, id, description, quantity, unit_price, total, category_id \
                     FROM quote_items WHERE quote_id = ANY($1) ORDER BY quote_id, position",
                )
                .bind(quote_ids)
                .fetch_all(&self.pool),
            )
            .await?;

        let mut items: HashMap<Uuid, Vec<QuoteItem>> = HashMap::new();
        for row in rows {
            items.entry(row.quote_id).or_default().push(row.item);
        }
        Ok(items)
    }

    async fn write_quote(&self, quote: &Quote, insert: bool) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if insert {
            sqlx::query(&format!(
                "INSERT INTO quotes ({QUOTE_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
            ))
            .bind(quote.id)
            .bind(quote.company_id)
            .bind(&quote.number)
            .bind(quote.year)
            .bind(quote.sequence)
            .bind(&quote.client_name)
            .bind(&quote.client_email)
            .bind(&quote.client_phone)
            .bind(&quote.client_document)
            .bind(quote.subtotal)
            .bind(quote.discount)
            .bind(quote.total)
            .bind(quote.status.as_str())
            .bind(&quote.notes)
            .bind(quote.valid_until)
            .bind(quote.created_at)
            .bind(quote.updated_at)
            .execute(&mut *tx)
            .await?;
        } else {
            let updated = sqlx::query(
                "UPDATE quotes SET client_name = $2, client_email = $3, client_phone = $4, client_document = $5, \
                 subtotal = $6, discount = $7, total = $8, status = $9, notes = $10, valid_until = $11, updated_at = $12 \
                 WHERE id = $1",
            )
            .bind(quote.id)
            .bind(&quote.client_name)
            .bind(&quote.client_email)
            .bind(&quote.client_phone)
            .bind(&quote.client_document)
            .bind(quote.subtotal)
            .bind(quote.discount)
            .bind(quote.total)
            .bind(quote.status.as_str())
            .bind(&quote.notes)
            .bind(quote.valid_until)
            .bind(quote.updated_at)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(sqlx::Error::RowNotFound);
            }
            sqlx::query("DELETE FROM quote_items WHERE quote_id = $1")
                .bind(quote.id)
                .execute(&mut *tx)
                .await?;
        }

        for (position, item) in quote.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quote_items (id, quote_id, position, description, quantity, unit_price, total, category_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(item.id)
            .bind(quote.id)
            .bind(position as i32)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total)
            .bind(item.category_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    async fn cascade_in_transaction(&self, company_id: Uuid) -> Result<Vec<StepOutcome>, (CascadeStep, sqlx::Error)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| (CascadeStep::Transactions, e))?;
        let mut outcomes = Vec::new();

        for step in CascadeStep::CHILDREN.into_iter().chain([CascadeStep::Company]) {
            let mut deleted = 0;
            for statement in step_statements(step) {
                deleted = sqlx::query(statement)
                    .bind(company_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| (step, e))?
                    .rows_affected();
            }
            outcomes.push(StepOutcome { step, deleted });
        }

        tx.commit().await.map_err(|e| (CascadeStep::Company, e))?;
        Ok(outcomes)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        self.bounded(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.bounded(
            sqlx::query("INSERT INTO users (id, name, email, password_hash, created_at) VALUES ($1, $2, $3, $4, $5)")
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.created_at)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.bounded(
            sqlx::query_as("SELECT id, name, email, password_hash, created_at FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.bounded(
            sqlx::query_as("SELECT id, name, email, password_hash, created_at FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn insert_company(&self, company: &Company) -> StoreResult<()> {
        self.bounded(
            sqlx::query(
                "INSERT INTO companies (id, user_id, name, cnpj, legal_name, email, phone, address, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(company.id)
            .bind(company.user_id)
            .bind(&company.name)
            .bind(&company.cnpj)
            .bind(&company.legal_name)
            .bind(&company.email)
            .bind(&company.phone)
            .bind(&company.address)
            .bind(company.created_at)
            .bind(company.updated_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_company(&self, id: Uuid) -> StoreResult<Option<Company>> {
        self.bounded(
            sqlx::query_as("SELECT * FROM companies WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_companies_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Company>> {
        self.bounded(
            sqlx::query_as("SELECT * FROM companies WHERE user_id = $1 ORDER BY name, created_at")
                .bind(user_id)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn update_company(&self, company: &Company) -> StoreResult<()> {
        // user_id is deliberately absent: ownership never changes
        let result = self
            .bounded(
                sqlx::query(
                    "UPDATE companies SET name = $2, cnpj = $3, legal_name = $4, email = $5, phone = $6, \
                     address = $7, updated_at = $8 WHERE id = $1",
                )
                .bind(company.id)
                .bind(&company.name)
                .bind(&company.cnpj)
                .bind(&company.legal_name)
                .bind(&company.email)
                .bind(&company.phone)
                .bind(&company.address)
                .bind(company.updated_at)
                .execute(&self.pool),
            )
            .await?;
        affected_one(result.rows_affected())
    }

    async fn delete_company_step(&self, step: CascadeStep, company_id: Uuid) -> StoreResult<u64> {
        let mut deleted = 0;
        for statement in step_statements(step) {
            deleted = self
                .bounded(sqlx::query(statement).bind(company_id).execute(&self.pool))
                .await?
                .rows_affected();
        }
        Ok(deleted)
    }

    async fn cascade_delete_company(&self, company_id: Uuid) -> Result<CascadeReport, CascadeFailure> {
        let outcome = match tokio::time::timeout(self.op_timeout, self.cascade_in_transaction(company_id)).await {
            Ok(Ok(steps)) => Ok(steps),
            Ok(Err((step, err))) => Err((step, StoreError::from(err))),
            Err(_) => Err((CascadeStep::Transactions, StoreError::Timeout(self.op_timeout))),
        };

        match outcome {
            Ok(steps) => {
                info!(%company_id, "Company cascade delete committed");
                Ok(CascadeReport { steps })
            }
            Err((step, err)) => {
                // The transaction rolled back, so nothing was removed
                error!(%company_id, step = step.as_str(), error = %err, "Company cascade delete rolled back");
                Err(CascadeFailure {
                    completed: Vec::new(),
                    failed: vec![FailedStep {
                        step,
                        error: err.to_string(),
                    }],
                })
            }
        }
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        self.bounded(
            sqlx::query(
                "INSERT INTO categories (id, company_id, name, type, color, budget, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(category.id)
            .bind(category.company_id)
            .bind(&category.name)
            .bind(category.kind.as_str())
            .bind(&category.color)
            .bind(category.budget)
            .bind(category.created_at)
            .bind(category.updated_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        self.bounded(
            sqlx::query_as("SELECT * FROM categories WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_categories(&self, company_id: Uuid, kind: Option<CategoryType>) -> StoreResult<Vec<Category>> {
        self.bounded(
            sqlx::query_as(
                "SELECT * FROM categories WHERE company_id = $1 AND ($2::text IS NULL OR type = $2) ORDER BY name",
            )
            .bind(company_id)
            .bind(kind.map(|k| k.as_str()))
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn update_category(&self, category: &Category) -> StoreResult<()> {
        let result = self
            .bounded(
                sqlx::query(
                    "UPDATE categories SET name = $2, type = $3, color = $4, budget = $5, updated_at = $6 WHERE id = $1",
                )
                .bind(category.id)
                .bind(&category.name)
                .bind(category.kind.as_str())
                .bind(&category.color)
                .bind(category.budget)
                .bind(category.updated_at)
                .execute(&self.pool),
            )
            .await?;
        affected_one(result.rows_affected())
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        let result = self
            .bounded(sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&self.pool))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        self.bounded(
            sqlx::query(&format!(
                "INSERT INTO transactions ({TRANSACTION_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
            ))
            .bind(tx.id)
            .bind(tx.company_id)
            .bind(&tx.month)
            .bind(tx.year)
            .bind(tx.amount)
            .bind(&tx.category)
            .bind(tx.status.as_str())
            .bind(&tx.description)
            .bind(tx.recurring_id)
            .bind(tx.quote_id)
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        self.bounded(
            sqlx::query_as(&format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<Transaction>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions");
        push_transaction_filter(&mut count, filter);
        let total: i64 = self
            .bounded(count.build_query_scalar().fetch_one(&self.pool))
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {TRANSACTION_COLUMNS} FROM transactions"));
        push_transaction_filter(&mut select, filter);
        select.push(" ORDER BY year DESC, created_at DESC, id");
        if let Some(page) = page {
            select.push(" LIMIT ").push_bind(to_i64(page.limit));
            select.push(" OFFSET ").push_bind(to_i64(page.offset));
        }
        let rows = self
            .bounded(select.build_query_as::<Transaction>().fetch_all(&self.pool))
            .await?;

        Ok((rows, u64::try_from(total).unwrap_or_default()))
    }

    async fn update_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        let result = self
            .bounded(
                sqlx::query(
                    "UPDATE transactions SET month = $2, year = $3, amount = $4, category = $5, status = $6, \
                     description = $7, quote_id = $8, updated_at = $9 WHERE id = $1",
                )
                .bind(tx.id)
                .bind(&tx.month)
                .bind(tx.year)
                .bind(tx.amount)
                .bind(&tx.category)
                .bind(tx.status.as_str())
                .bind(&tx.description)
                .bind(tx.quote_id)
                .bind(tx.updated_at)
                .execute(&self.pool),
            )
            .await?;
        affected_one(result.rows_affected())
    }

    async fn delete_transaction(&self, id: Uuid) -> StoreResult<bool> {
        let result = self
            .bounded(sqlx::query("DELETE FROM transactions WHERE id = $1").bind(id).execute(&self.pool))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_transaction_status(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        self.bounded(
            sqlx::query_as(&format!(
                "UPDATE transactions \
                 SET status = CASE status WHEN 'PAGO' THEN 'ABERTO' ELSE 'PAGO' END, updated_at = now() \
                 WHERE id = $1 RETURNING {TRANSACTION_COLUMNS}"
            ))
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    async fn transaction_exists(&self, company_id: Uuid, description: &str, month: &str, year: i32) -> StoreResult<bool> {
        self.bounded(
            sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM transactions \
                 WHERE company_id = $1 AND description = $2 AND month = $3 AND year = $4)",
            )
            .bind(company_id)
            .bind(description)
            .bind(month)
            .bind(year)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn insert_recurring(&self, rule: &RecurringTransaction) -> StoreResult<()> {
        self.bounded(
            sqlx::query(
                "INSERT INTO recurring_transactions \
                 (id, company_id, description, amount, category, type, day_of_month, active, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(rule.id)
            .bind(rule.company_id)
            .bind(&rule.description)
            .bind(rule.amount)
            .bind(&rule.category)
            .bind(rule.kind.as_str())
            .bind(rule.day_of_month)
            .bind(rule.active)
            .bind(rule.created_at)
            .bind(rule.updated_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_recurring(&self, id: Uuid) -> StoreResult<Option<RecurringTransaction>> {
        self.bounded(
            sqlx::query_as("SELECT * FROM recurring_transactions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_recurring(&self, company_id: Uuid) -> StoreResult<Vec<RecurringTransaction>> {
        self.bounded(
            sqlx::query_as(
                "SELECT * FROM recurring_transactions WHERE company_id = $1 ORDER BY day_of_month, description",
            )
            .bind(company_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn update_recurring(&self, rule: &RecurringTransaction) -> StoreResult<()> {
        let result = self
            .bounded(
                sqlx::query(
                    "UPDATE recurring_transactions SET description = $2, amount = $3, category = $4, type = $5, \
                     day_of_month = $6, active = $7, updated_at = $8 WHERE id = $1",
                )
                .bind(rule.id)
                .bind(&rule.description)
                .bind(rule.amount)
                .bind(&rule.category)
                .bind(rule.kind.as_str())
                .bind(rule.day_of_month)
                .bind(rule.active)
                .bind(rule.updated_at)
                .execute(&self.pool),
            )
            .await?;
        affected_one(result.rows_affected())
    }

    async fn delete_recurring(&self, id: Uuid) -> StoreResult<bool> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM recurring_transactions WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_recurring_due(&self, from_day: i32, to_day: i32) -> StoreResult<Vec<RecurringTransaction>> {
        self.bounded(
            sqlx::query_as(
                "SELECT * FROM recurring_transactions \
                 WHERE active AND day_of_month BETWEEN $1 AND $2 ORDER BY company_id, description",
            )
            .bind(from_day)
            .bind(to_day)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn next_quote_sequence(&self, company_id: Uuid, year: i32) -> StoreResult<i32> {
        // The counter row is seeded from existing quotes the first time a
        // (company, year) pair is seen; the upsert holds the row lock so
        // concurrent callers on any instance get distinct values.
        self.bounded(
            sqlx::query_scalar(
                "INSERT INTO quote_counters (company_id, year, last_sequence) \
                 VALUES ($1, $2, COALESCE((SELECT MAX(sequence) FROM quotes WHERE company_id = $1 AND year = $2), 0) + 1) \
                 ON CONFLICT (company_id, year) DO UPDATE SET last_sequence = quote_counters.last_sequence + 1 \
                 RETURNING last_sequence",
            )
            .bind(company_id)
            .bind(year)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn insert_quote(&self, quote: &Quote) -> StoreResult<()> {
        self.bounded(self.write_quote(quote, true)).await
    }

    async fn find_quote(&self, id: Uuid) -> StoreResult<Option<Quote>> {
        let quote: Option<Quote> = self
            .bounded(
                sqlx::query_as(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = $1"))
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        match quote {
            Some(mut quote) => {
                quote.items = self.load_items(&[quote.id]).await?.remove(&quote.id).unwrap_or_default();
                Ok(Some(quote))
            }
            None => Ok(None),
        }
    }

    async fn list_quotes(
        &self,
        company_id: Uuid,
        status: Option<QuoteStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Quote>, u64)> {
        let status = status.map(|s| s.as_str());
        let total: i64 = self
            .bounded(
                sqlx::query_scalar("SELECT COUNT(*) FROM quotes WHERE company_id = $1 AND ($2::text IS NULL OR status = $2)")
                    .bind(company_id)
                    .bind(status)
                    .fetch_one(&self.pool),
            )
            .await?;

        let mut quotes: Vec<Quote> = self
            .bounded(
                sqlx::query_as(&format!(
                    "SELECT {QUOTE_COLUMNS} FROM quotes WHERE company_id = $1 AND ($2::text IS NULL OR status = $2) \
                     ORDER BY year DESC, sequence DESC LIMIT $3 OFFSET $4"
                ))
                .bind(company_id)
                .bind(status)
                .bind(to_i64(page.limit))
                .bind(to_i64(page.offset))
                .fetch_all(&self.pool),
            )
            .await?;

        let ids: Vec<Uuid> = quotes.iter().map(|q| q.id).collect();
        let mut items = self.load_items(&ids).await?;
        for quote in &mut quotes {
            quote.items = items.remove(&quote.id).unwrap_or_default();
        }

        Ok((quotes, u64::try_from(total).unwrap_or_default()))
    }

    async fn update_quote(&self, quote: &Quote) -> StoreResult<()> {
        self.bounded(self.write_quote(quote, false)).await
    }

    async fn delete_quote(&self, id: Uuid) -> StoreResult<bool> {
        let delete = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM quote_items WHERE quote_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            let result = sqlx::query("DELETE FROM quotes WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(result.rows_affected() > 0)
        };
        self.bounded(delete).await
    }

    async fn insert_quote_template(&self, template: &QuoteTemplate) -> StoreResult<()> {
        self.bounded(
            sqlx::query(
                "INSERT INTO quote_templates (id, company_id, name, items, notes, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(template.id)
            .bind(template.company_id)
            .bind(&template.name)
            .bind(sqlx::types::Json(&template.items))
            .bind(&template.notes)
            .bind(template.created_at)
            .bind(template.updated_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn find_quote_template(&self, id: Uuid) -> StoreResult<Option<QuoteTemplate>> {
        self.bounded(
            sqlx::query_as("SELECT * FROM quote_templates WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_quote_templates(&self, company_id: Uuid) -> StoreResult<Vec<QuoteTemplate>> {
        self.bounded(
            sqlx::query_as("SELECT * FROM quote_templates WHERE company_id = $1 ORDER BY name")
                .bind(company_id)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn delete_quote_template(&self, id: Uuid) -> StoreResult<bool> {
        let result = self
            .bounded(
                sqlx::query("DELETE FROM quote_templates WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_cascade_step_has_sql() {
        for step in CascadeStep::CHILDREN.into_iter().chain([CascadeStep::Company]) {
            assert!(!step_statements(step).is_empty());
        }
    }

    #[test]
    fn company_row_is_deleted_last() {
        let statements = step_statements(CascadeStep::Company);
        assert!(statements.last().unwrap().starts_with("DELETE FROM companies"));
    }

    #[test]
    fn schema_declares_the_uniqueness_guards() {
        assert!(SCHEMA.contains("CONSTRAINT users_email_key UNIQUE (email)"));
        assert!(SCHEMA.contains("CONSTRAINT quotes_company_number_key UNIQUE (company_id, number)"));
        assert!(SCHEMA.contains("UNIQUE INDEX IF NOT EXISTS transactions_recurring_period_key"));
    }
}
