use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{Category, Company, Quote, QuoteTemplate, RecurringTransaction, Transaction, User};
use super::store::{
    CascadeStep, Page, Store, StoreError, StoreResult, TransactionFilter, QUOTES_NUMBER_KEY,
    TRANSACTIONS_RECURRING_KEY, USERS_EMAIL_KEY,
};
use crate::types::{CategoryType, QuoteStatus};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    companies: HashMap<Uuid, Company>,
    categories: HashMap<Uuid, Category>,
    transactions: HashMap<Uuid, Transaction>,
    recurring: HashMap<Uuid, RecurringTransaction>,
    quotes: HashMap<Uuid, Quote>,
    quote_counters: HashMap<(Uuid, i32), i32>,
    templates: HashMap<Uuid, QuoteTemplate>,
}

/// Process-local store behind a single `RwLock`.
///
/// Every method takes the lock once, so each call is atomic with respect to
/// the others, which is what the Postgres store gets from single statements.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    failing_steps: std::sync::Mutex<Vec<CascadeStep>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future run of `step` fail
    #[cfg(test)]
    pub fn fail_cascade_step(&self, step: CascadeStep) {
        if let Ok(mut steps) = self.failing_steps.lock() {
            steps.push(step);
        }
    }

    #[cfg(test)]
    fn injected_failure(&self, step: CascadeStep) -> StoreResult<()> {
        let failing = self.failing_steps.lock().map(|s| s.contains(&step)).unwrap_or(false);
        if failing {
            return Err(StoreError::Timeout(std::time::Duration::ZERO));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn injected_failure(&self, _step: CascadeStep) -> StoreResult<()> {
        Ok(())
    }
}

fn paginate<T>(rows: Vec<T>, page: Option<Page>) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let rows = match page {
        Some(page) => rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect(),
        None => rows,
    };
    (rows, total)
}

fn remove_where<T>(map: &mut HashMap<Uuid, T>, keep: impl Fn(&T) -> bool) -> u64 {
    let before = map.len();
    map.retain(|_, value| keep(value));
    (before - map.len()) as u64
}

fn replace<T: Clone>(map: &mut HashMap<Uuid, T>, id: Uuid, value: &T) -> StoreResult<()> {
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = value.clone();
            Ok(())
        }
        None => Err(StoreError::NotFound),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(USERS_EMAIL_KEY.to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_company(&self, company: &Company) -> StoreResult<()> {
        self.tables.write().await.companies.insert(company.id, company.clone());
        Ok(())
    }

    async fn find_company(&self, id: Uuid) -> StoreResult<Option<Company>> {
        Ok(self.tables.read().await.companies.get(&id).cloned())
    }

    async fn list_companies_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Company>> {
        let tables = self.tables.read().await;
        let mut companies: Vec<Company> = tables
            .companies
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        companies.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_at.cmp(&b.created_at)));
        Ok(companies)
    }

    async fn update_company(&self, company: &Company) -> StoreResult<()> {
        replace(&mut self.tables.write().await.companies, company.id, company)
    }

    async fn delete_company_step(&self, step: CascadeStep, company_id: Uuid) -> StoreResult<u64> {
        self.injected_failure(step)?;
        let mut tables = self.tables.write().await;
        let deleted = match step {
            CascadeStep::Transactions => remove_where(&mut tables.transactions, |t| t.company_id != company_id),
            CascadeStep::Categories => remove_where(&mut tables.categories, |c| c.company_id != company_id),
            CascadeStep::RecurringTransactions => remove_where(&mut tables.recurring, |r| r.company_id != company_id),
            CascadeStep::QuoteItems => tables
                .quotes
                .values_mut()
                .filter(|q| q.company_id == company_id)
                .map(|q| std::mem::take(&mut q.items).len() as u64)
                .sum(),
            CascadeStep::Quotes => remove_where(&mut tables.quotes, |q| q.company_id != company_id),
            CascadeStep::QuoteTemplates => remove_where(&mut tables.templates, |t| t.company_id != company_id),
            CascadeStep::Company => {
                tables.quote_counters.retain(|(owner, _), _| *owner != company_id);
                u64::from(tables.companies.remove(&company_id).is_some())
            }
        };
        Ok(deleted)
    }

    async fn insert_category(&self, category: &Category) -> StoreResult<()> {
        self.tables.write().await.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self, company_id: Uuid, kind: Option<CategoryType>) -> StoreResult<Vec<Category>> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| c.company_id == company_id && kind.map_or(true, |k| c.kind == k))
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn update_category(&self, category: &Category) -> StoreResult<()> {
        replace(&mut self.tables.write().await.categories, category.id, category)
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.categories.remove(&id).is_some())
    }

    async fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tx.recurring_id.is_some() {
            let duplicate = tables.transactions.values().any(|t| {
                t.recurring_id.is_some()
                    && t.company_id == tx.company_id
                    && t.description == tx.description
                    && t.month == tx.month
                    && t.year == tx.year
            });
            if duplicate {
                return Err(StoreError::UniqueViolation(TRANSACTIONS_RECURRING_KEY.to_string()));
            }
        }
        tables.transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn find_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        Ok(self.tables.read().await.transactions.get(&id).cloned())
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> StoreResult<(Vec<Transaction>, u64)> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.year
                .cmp(&a.year)
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(paginate(rows, page))
    }

    async fn update_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        replace(&mut self.tables.write().await.transactions, tx.id, tx)
    }

    async fn delete_transaction(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.transactions.remove(&id).is_some())
    }

    async fn toggle_transaction_status(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        let mut tables = self.tables.write().await;
        Ok(tables.transactions.get_mut(&id).map(|tx| {
            tx.status = tx.status.toggled();
            tx.updated_at = Utc::now();
            tx.clone()
        }))
    }

    async fn transaction_exists(&self, company_id: Uuid, description: &str, month: &str, year: i32) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.transactions.values().any(|t| {
            t.company_id == company_id
                && t.description.as_deref() == Some(description)
                && t.month == month
                && t.year == year
        }))
    }

    async fn insert_recurring(&self, rule: &RecurringTransaction) -> StoreResult<()> {
        self.tables.write().await.recurring.insert(rule.id, rule.clone());
        Ok(())
    }

    async fn find_recurring(&self, id: Uuid) -> StoreResult<Option<RecurringTransaction>> {
        Ok(self.tables.read().await.recurring.get(&id).cloned())
    }

    async fn list_recurring(&self, company_id: Uuid) -> StoreResult<Vec<RecurringTransaction>> {
        let tables = self.tables.read().await;
        let mut rules: Vec<RecurringTransaction> = tables
            .recurring
            .values()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.day_of_month.cmp(&b.day_of_month).then(a.description.cmp(&b.description)));
        Ok(rules)
    }

    async fn update_recurring(&self, rule: &RecurringTransaction) -> StoreResult<()> {
        replace(&mut self.tables.write().await.recurring, rule.id, rule)
    }

    async fn delete_recurring(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.recurring.remove(&id).is_some();
        if removed {
            for tx in tables.transactions.values_mut().filter(|t| t.recurring_id == Some(id)) {
                tx.recurring_id = None;
            }
        }
        Ok(removed)
    }

    async fn list_recurring_due(&self, from_day: i32, to_day: i32) -> StoreResult<Vec<RecurringTransaction>> {
        let tables = self.tables.read().await;
        let mut rules: Vec<RecurringTransaction> = tables
            .recurring
            .values()
            .filter(|r| r.active && (from_day..=to_day).contains(&r.day_of_month))
            .cloned()
            .collect();
        rules.sort_by(|a, b| a.company_id.cmp(&b.company_id).then(a.description.cmp(&b.description)));
        Ok(rules)
    }

    async fn next_quote_sequence(&self, company_id: Uuid, year: i32) -> StoreResult<i32> {
        let mut tables = self.tables.write().await;
        let seed = tables
            .quotes
            .values()
            .filter(|q| q.company_id == company_id && q.year == year)
            .map(|q| q.sequence)
            .max()
            .unwrap_or(0);
        let counter = tables.quote_counters.entry((company_id, year)).or_insert(seed);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_quote(&self, quote: &Quote) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .quotes
            .values()
            .any(|q| q.company_id == quote.company_id && q.number == quote.number)
        {
            return Err(StoreError::UniqueViolation(QUOTES_NUMBER_KEY.to_string()));
        }
        tables.quotes.insert(quote.id, quote.clone());
        Ok(())
    }

    async fn find_quote(&self, id: Uuid) -> StoreResult<Option<Quote>> {
        Ok(self.tables.read().await.quotes.get(&id).cloned())
    }

    async fn list_quotes(
        &self,
        company_id: Uuid,
        status: Option<QuoteStatus>,
        page: Page,
    ) -> StoreResult<(Vec<Quote>, u64)> {
        let tables = self.tables.read().await;
        let mut quotes: Vec<Quote> = tables
            .quotes
            .values()
            .filter(|q| q.company_id == company_id && status.map_or(true, |s| q.status == s))
            .cloned()
            .collect();
        quotes.sort_by(|a, b| b.year.cmp(&a.year).then(b.sequence.cmp(&a.sequence)));
        Ok(paginate(quotes, Some(page)))
    }

    async fn update_quote(&self, quote: &Quote) -> StoreResult<()> {
        replace(&mut self.tables.write().await.quotes, quote.id, quote)
    }

    async fn delete_quote(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.quotes.remove(&id).is_some();
        if removed {
            for tx in tables.transactions.values_mut().filter(|t| t.quote_id == Some(id)) {
                tx.quote_id = None;
            }
        }
        Ok(removed)
    }

    async fn insert_quote_template(&self, template: &QuoteTemplate) -> StoreResult<()> {
        self.tables.write().await.templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn find_quote_template(&self, id: Uuid) -> StoreResult<Option<QuoteTemplate>> {
        Ok(self.tables.read().await.templates.get(&id).cloned())
    }

    async fn list_quote_templates(&self, company_id: Uuid) -> StoreResult<Vec<QuoteTemplate>> {
        let tables = self.tables.read().await;
        let mut templates: Vec<QuoteTemplate> = tables
            .templates
            .values()
            .filter(|t| t.company_id == company_id)
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn delete_quote_template(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.templates.remove(&id).is_some())
    }
}
