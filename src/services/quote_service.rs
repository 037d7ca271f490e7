use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Ownership, PageRequest, Paginated, ServiceError, ServiceResult};
use crate::database::models::{Company, Quote, QuoteItem, QuoteTemplate};
use crate::database::store::QUOTES_NUMBER_KEY;
use crate::database::{Store, TransactionFilter};
use crate::types::QuoteStatus;
use crate::validation::{rules, Lenient, ValidationErrors, Validator};

/// Attempts at reserving a number before giving up on a create
const NUMBER_ATTEMPTS: usize = 3;

const EXECUTED_IS_FINAL: &str = "Orçamento executado não pode ser alterado";
const UNCATEGORIZED: &str = "Sem categoria";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteItemInput {
    pub description: Option<String>,
    pub quantity: Option<Lenient<Decimal>>,
    pub unit_price: Option<Lenient<Decimal>>,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInput {
    pub company_id: Option<String>,
    pub template_id: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub client_document: Option<String>,
    pub items: Option<Vec<QuoteItemInput>>,
    pub discount: Option<Lenient<Decimal>>,
    pub notes: Option<String>,
    pub valid_until: Option<Lenient<NaiveDate>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteStatusInput {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    pub company_id: Option<String>,
    pub status: Option<String>,
}

/// Quoted against executed amounts for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub category: String,
    pub quoted: Decimal,
    pub executed: Decimal,
    /// `executed - quoted`; positive means over budget
    pub difference: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteComparison {
    pub quote_id: Uuid,
    pub number: String,
    pub rows: Vec<ComparisonRow>,
    pub quoted_total: Decimal,
    pub executed_total: Decimal,
    pub difference: Decimal,
}

/// Numbers keep three digits, so a company gets at most this many quotes a year
pub const MAX_QUOTE_SEQUENCE: i32 = 999;

pub(crate) fn format_number(year: i32, sequence: i32) -> String {
    format!("ORC-{year}-{sequence:03}")
}

pub(crate) fn line_total(quantity: Decimal, unit_price: Decimal) -> Decimal {
    (quantity * unit_price).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate item inputs and compute their totals.
///
/// `categories` holds the IDs of the company's categories; an item tagged with
/// anything else is rejected. Field names are indexed (`items[1].quantity`).
pub(crate) fn build_items(inputs: &[QuoteItemInput], categories: &HashSet<Uuid>, v: &mut Validator) -> Vec<QuoteItem> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let field = |name: &str| format!("items[{i}].{name}");
            let description = v.require_text(input.description.as_deref(), 200, &field("description"));
            let quantity = v.typed(input.quantity.as_ref(), &field("quantity"));
            let quantity = v.require_positive(quantity, &field("quantity"));
            let unit_price = v.typed(input.unit_price.as_ref(), &field("unitPrice"));
            if let Some(price) = unit_price {
                v.check(rules::non_negative(price, &field("unitPrice")));
            }
            let unit_price = v.require(unit_price, &field("unitPrice"));

            let category_id = match input.category_id.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                Some(raw) => match Uuid::parse_str(raw) {
                    Ok(id) if categories.contains(&id) => Some(id),
                    _ => {
                        v.push(field("categoryId"), "Categoria não encontrada nesta empresa");
                        None
                    }
                },
                None => None,
            };

            QuoteItem {
                id: Uuid::new_v4(),
                description,
                quantity,
                unit_price,
                total: line_total(quantity, unit_price),
                category_id,
            }
        })
        .collect()
}

/// Same items under fresh IDs
pub(crate) fn copy_items(items: &[QuoteItem]) -> Vec<QuoteItem> {
    items
        .iter()
        .map(|item| QuoteItem {
            id: Uuid::new_v4(),
            ..item.clone()
        })
        .collect()
}

struct QuoteFields {
    client_name: String,
    client_email: Option<String>,
    client_phone: Option<String>,
    client_document: Option<String>,
    items: Vec<QuoteItem>,
    subtotal: Decimal,
    discount: Decimal,
    notes: Option<String>,
    valid_until: Option<NaiveDate>,
}

/// Validate everything but the items' source. `items` is `None` when the
/// caller already has them (from a template).
fn validate(
    input: &QuoteInput,
    items: Option<Vec<QuoteItem>>,
    categories: &HashSet<Uuid>,
    v: &mut Validator,
) -> QuoteFields {
    let client_name = v.require_text(input.client_name.as_deref(), 100, "clientName");
    let client_phone = v.optional_text(input.client_phone.as_deref(), 20, "clientPhone");
    let client_document = v.optional_text(input.client_document.as_deref(), 20, "clientDocument");
    let notes = v.optional_text(input.notes.as_deref(), 1000, "notes");

    let client_email = match input.client_email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => {
            let email = raw.to_lowercase();
            v.check(rules::email(&email, "clientEmail")).then_some(email)
        }
        None => None,
    };

    let items = match items {
        Some(items) => items,
        None => {
            let inputs = input.items.as_deref().unwrap_or_default();
            if inputs.is_empty() {
                v.push("items", "O orçamento precisa de pelo menos um item");
            }
            build_items(inputs, categories, v)
        }
    };

    let subtotal: Decimal = items.iter().map(|item| item.total).sum();
    let discount = v.typed(input.discount.as_ref(), "discount").unwrap_or_default();
    if !v.has_error_for("discount") && v.check(rules::non_negative(discount, "discount")) && discount > subtotal {
        v.push("discount", "O desconto não pode ser maior que o subtotal");
    }

    let valid_until = v.typed(input.valid_until.as_ref(), "validUntil");

    QuoteFields {
        client_name,
        client_email,
        client_phone,
        client_document,
        items,
        subtotal,
        discount,
        notes,
        valid_until,
    }
}

#[derive(Clone)]
pub struct QuoteService {
    store: Arc<dyn Store>,
    ownership: Ownership,
}

impl QuoteService {
    pub fn new(store: Arc<dyn Store>, ownership: Ownership) -> Self {
        Self { store, ownership }
    }

    /// Create a DRAFT quote numbered within the current year.
    ///
    /// With `templateId` and no `items`, the template's items (and notes, when
    /// none are given) are copied in.
    pub async fn create(&self, user_id: Uuid, input: QuoteInput) -> ServiceResult<Quote> {
        let raw_company = input
            .company_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError::invalid_field("companyId", rules::required_message("companyId")))?;
        let company = self.ownership.company(user_id, raw_company).await?;
        let template = self.template(user_id, &company, input.template_id.as_deref()).await?;

        let has_items = input.items.as_ref().is_some_and(|items| !items.is_empty());
        let template_items = template
            .as_ref()
            .filter(|_| !has_items)
            .map(|t| copy_items(&t.items));

        let categories = self.category_ids(&company).await?;
        let mut v = Validator::new();
        let mut fields = validate(&input, template_items, &categories, &mut v);
        v.finish()?;
        if fields.notes.is_none() {
            fields.notes = template.and_then(|t| t.notes);
        }

        let now = Utc::now();
        let mut quote = Quote {
            id: Uuid::new_v4(),
            company_id: company.id,
            number: String::new(),
            year: now.year(),
            sequence: 0,
            client_name: fields.client_name,
            client_email: fields.client_email,
            client_phone: fields.client_phone,
            client_document: fields.client_document,
            items: fields.items,
            subtotal: fields.subtotal,
            discount: fields.discount,
            total: fields.subtotal - fields.discount,
            status: QuoteStatus::Draft,
            notes: fields.notes,
            valid_until: fields.valid_until,
            created_at: now,
            updated_at: now,
        };
        self.insert_numbered(&mut quote).await?;
        Ok(quote)
    }

    pub async fn list(&self, user_id: Uuid, query: &QuoteQuery, page: PageRequest) -> ServiceResult<Paginated<Quote>> {
        let raw_company = query
            .company_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError::invalid_field("companyId", rules::required_message("companyId")))?;
        let company = self.ownership.company(user_id, raw_company).await?;

        let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                rules::quote_status(raw, "status").map_err(ValidationErrors::single)?;
                raw.parse::<QuoteStatus>().ok()
            }
            None => None,
        };

        let (rows, total) = self.store.list_quotes(company.id, status, page.window()).await?;
        Ok(page.paginate(rows, total))
    }

    pub async fn get(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<Quote> {
        let (quote, _) = self.ownership.resolve::<Quote>(user_id, raw_id).await?;
        Ok(quote)
    }

    /// Replace client fields, items and discount. Number, status and company
    /// stay as they are. Executed quotes are read-only.
    pub async fn update(&self, user_id: Uuid, raw_id: &str, input: QuoteInput) -> ServiceResult<Quote> {
        let (mut quote, company) = self.ownership.resolve::<Quote>(user_id, raw_id).await?;
        if quote.status.is_terminal() {
            return Err(ServiceError::ImmutableState(EXECUTED_IS_FINAL.to_string()));
        }

        let categories = self.category_ids(&company).await?;
        let mut v = Validator::new();
        let fields = validate(&input, None, &categories, &mut v);
        v.finish()?;

        quote.client_name = fields.client_name;
        quote.client_email = fields.client_email;
        quote.client_phone = fields.client_phone;
        quote.client_document = fields.client_document;
        quote.items = fields.items;
        quote.subtotal = fields.subtotal;
        quote.discount = fields.discount;
        quote.total = fields.subtotal - fields.discount;
        quote.notes = fields.notes;
        quote.valid_until = fields.valid_until;
        quote.updated_at = Utc::now();

        self.store.update_quote(&quote).await?;
        Ok(quote)
    }

    pub async fn update_status(&self, user_id: Uuid, raw_id: &str, input: QuoteStatusInput) -> ServiceResult<Quote> {
        let (mut quote, _) = self.ownership.resolve::<Quote>(user_id, raw_id).await?;

        let mut v = Validator::new();
        let next = v.require_enum::<QuoteStatus>(input.status.as_deref(), "status", rules::quote_status);
        v.finish()?;
        let Some(next) = next else {
            return Err(ServiceError::invalid_field("status", rules::required_message("status")));
        };

        if quote.status == next {
            return Ok(quote);
        }
        if quote.status.is_terminal() {
            return Err(ServiceError::ImmutableState(EXECUTED_IS_FINAL.to_string()));
        }
        if !quote.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition {
                from: quote.status,
                to: next,
            });
        }

        info!(quote_id = %quote.id, from = %quote.status, to = %next, "Quote status changed");
        quote.status = next;
        quote.updated_at = Utc::now();
        self.store.update_quote(&quote).await?;
        Ok(quote)
    }

    /// New DRAFT with the same client and items, numbered in the current year
    pub async fn duplicate(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<Quote> {
        let (source, _) = self.ownership.resolve::<Quote>(user_id, raw_id).await?;

        let now = Utc::now();
        let mut quote = Quote {
            id: Uuid::new_v4(),
            number: String::new(),
            year: now.year(),
            sequence: 0,
            items: copy_items(&source.items),
            status: QuoteStatus::Draft,
            valid_until: None,
            created_at: now,
            updated_at: now,
            ..source
        };
        self.insert_numbered(&mut quote).await?;
        Ok(quote)
    }

    /// Per category: what the quote promised against what was actually booked.
    ///
    /// Executed amounts are the company's transactions linked to this quote,
    /// grouped by category name. Items without a category fall under
    /// "Sem categoria".
    pub async fn comparison(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<QuoteComparison> {
        let (quote, company) = self.ownership.resolve::<Quote>(user_id, raw_id).await?;

        let names: HashMap<Uuid, String> = self
            .store
            .list_categories(company.id, None)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut totals: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
        for item in &quote.items {
            let category = item
                .category_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            totals.entry(category).or_default().0 += item.total;
        }

        let mut filter = TransactionFilter::for_company(company.id);
        filter.quote_id = Some(quote.id);
        let (linked, _) = self.store.list_transactions(&filter, None).await?;
        for tx in &linked {
            totals.entry(tx.category.clone()).or_default().1 += tx.amount;
        }

        let rows: Vec<ComparisonRow> = totals
            .into_iter()
            .map(|(category, (quoted, executed))| ComparisonRow {
                category,
                quoted,
                executed,
                difference: executed - quoted,
            })
            .collect();
        let quoted_total: Decimal = rows.iter().map(|r| r.quoted).sum();
        let executed_total: Decimal = rows.iter().map(|r| r.executed).sum();

        Ok(QuoteComparison {
            quote_id: quote.id,
            number: quote.number,
            rows,
            quoted_total,
            executed_total,
            difference: executed_total - quoted_total,
        })
    }

    /// Linked transactions keep their amounts but lose the link
    pub async fn delete(&self, user_id: Uuid, raw_id: &str) -> ServiceResult<()> {
        let (quote, _) = self.ownership.resolve::<Quote>(user_id, raw_id).await?;
        if !self.store.delete_quote(quote.id).await? {
            return Err(ServiceError::NotFound("Orçamento não encontrado".to_string()));
        }
        Ok(())
    }

    async fn insert_numbered(&self, quote: &mut Quote) -> ServiceResult<()> {
        for _ in 0..NUMBER_ATTEMPTS {
            let sequence = self.store.next_quote_sequence(quote.company_id, quote.year).await?;
            if sequence > MAX_QUOTE_SEQUENCE {
                warn!(company_id = %quote.company_id, year = quote.year, "Quote numbering exhausted for the year");
                return Err(ServiceError::Conflict(format!(
                    "Limite de {MAX_QUOTE_SEQUENCE} orçamentos em {} atingido",
                    quote.year
                )));
            }
            quote.sequence = sequence;
            quote.number = format_number(quote.year, sequence);

            match self.store.insert_quote(quote).await {
                Ok(()) => {
                    info!(quote_id = %quote.id, number = %quote.number, "Created quote");
                    return Ok(());
                }
                Err(err) if err.is_unique_violation(QUOTES_NUMBER_KEY) => {
                    warn!(company_id = %quote.company_id, number = %quote.number, "Quote number taken, reserving another");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ServiceError::Conflict(
            "Não foi possível gerar o número do orçamento".to_string(),
        ))
    }

    async fn template(&self, user_id: Uuid, company: &Company, raw: Option<&str>) -> ServiceResult<Option<QuoteTemplate>> {
        let Some(raw) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let (template, owner) = self.ownership.resolve::<QuoteTemplate>(user_id, raw).await?;
        if owner.id != company.id {
            return Err(ServiceError::invalid_field(
                "templateId",
                "Modelo pertence a outra empresa",
            ));
        }
        Ok(Some(template))
    }

    async fn category_ids(&self, company: &Company) -> ServiceResult<HashSet<Uuid>> {
        Ok(self
            .store
            .list_categories(company.id, None)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transaction_service::TransactionInput;
    use crate::testing::TestContext;

    fn item(description: &str, quantity: i64, unit_price: Decimal) -> QuoteItemInput {
        QuoteItemInput {
            description: Some(description.to_string()),
            quantity: Some(Decimal::from(quantity).into()),
            unit_price: Some(unit_price.into()),
            category_id: None,
        }
    }

    fn input(company_id: Uuid) -> QuoteInput {
        QuoteInput {
            company_id: Some(company_id.to_string()),
            client_name: Some("Cliente Exemplo".to_string()),
            items: Some(vec![
                item("Instalação", 2, Decimal::new(15050, 2)),
                item("Cabo", 3, Decimal::new(1999, 2)),
            ]),
            discount: Some(Decimal::from(10).into()),
            ..Default::default()
        }
    }

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(format_number(2025, 1), "ORC-2025-001");
        assert_eq!(format_number(2025, 42), "ORC-2025-042");
        assert_eq!(format_number(2025, MAX_QUOTE_SEQUENCE), "ORC-2025-999");
    }

    #[test]
    fn line_totals_round_to_cents() {
        assert_eq!(line_total(Decimal::new(3, 0), Decimal::new(3333, 3)), Decimal::new(1000, 2));
        assert_eq!(line_total(Decimal::new(15, 1), Decimal::new(1005, 2)), Decimal::new(1508, 2));
    }

    #[tokio::test]
    async fn create_computes_totals_and_numbers_sequentially() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        let quotes = &ctx.services.quotes;

        let first = quotes.create(alice.id, input(company.id)).await.unwrap();
        assert_eq!(first.status, QuoteStatus::Draft);
        assert_eq!(first.subtotal, Decimal::new(36097, 2));
        assert_eq!(first.total, Decimal::new(35097, 2));
        assert_eq!(first.items[0].total, Decimal::new(30100, 2));

        let year = Utc::now().year();
        let numbers: Vec<String> = {
            let mut numbers = vec![first.number];
            for _ in 0..3 {
                numbers.push(quotes.create(alice.id, input(company.id)).await.unwrap().number);
            }
            numbers
        };
        let expected: Vec<String> = (1..=4).map(|seq| format_number(year, seq)).collect();
        assert_eq!(numbers, expected);
    }

    #[tokio::test]
    async fn numbering_stops_after_the_last_three_digit_number() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        let year = Utc::now().year();
        for _ in 1..MAX_QUOTE_SEQUENCE {
            ctx.store.next_quote_sequence(company.id, year).await.unwrap();
        }

        let last = ctx.services.quotes.create(alice.id, input(company.id)).await.unwrap();
        assert_eq!(last.number, format!("ORC-{year}-999"));

        let err = ctx.services.quotes.create(alice.id, input(company.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn numbering_is_scoped_per_company() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let a = ctx.company(alice.id, "A").await;
        let b = ctx.company(alice.id, "B").await;

        let qa = ctx.services.quotes.create(alice.id, input(a.id)).await.unwrap();
        let qb = ctx.services.quotes.create(alice.id, input(b.id)).await.unwrap();
        assert_eq!(qa.sequence, 1);
        assert_eq!(qb.sequence, 1);
    }

    #[tokio::test]
    async fn concurrent_creates_never_share_a_number() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;

        let creates = (0..10).map(|_| ctx.services.quotes.create(alice.id, input(company.id)));
        let results = futures::future::join_all(creates).await;
        let mut sequences: Vec<i32> = results.into_iter().map(|r| r.unwrap().sequence).collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn discount_cannot_exceed_subtotal() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;

        let err = ctx
            .services
            .quotes
            .create(
                alice.id,
                QuoteInput {
                    discount: Some(Decimal::from(10_000).into()),
                    ..input(company.id)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(e) if e.has_field("discount")));
    }

    #[tokio::test]
    async fn item_errors_are_indexed() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;

        let err = ctx
            .services
            .quotes
            .create(
                alice.id,
                QuoteInput {
                    items: Some(vec![
                        item("Ok", 1, Decimal::ONE),
                        QuoteItemInput {
                            description: None,
                            quantity: Some(Decimal::ZERO.into()),
                            unit_price: Some(Decimal::from(-1).into()),
                            category_id: Some(Uuid::new_v4().to_string()),
                        },
                    ]),
                    discount: None,
                    ..input(company.id)
                },
            )
            .await
            .unwrap_err();
        let ServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        for field in [
            "items[1].description",
            "items[1].quantity",
            "items[1].unitPrice",
            "items[1].categoryId",
        ] {
            assert!(errors.has_field(field), "missing error for {field}");
        }
        assert!(!errors.has_field("items[0].description"));
    }

    #[tokio::test]
    async fn executed_quotes_are_immutable() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        let quotes = &ctx.services.quotes;
        let quote = quotes.create(alice.id, input(company.id)).await.unwrap();
        let id = quote.id.to_string();

        let status = |s: &str| QuoteStatusInput {
            status: Some(s.to_string()),
        };
        let err = quotes.update_status(alice.id, &id, status("EXECUTED")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidTransition {
                from: QuoteStatus::Draft,
                to: QuoteStatus::Executed
            }
        ));

        quotes.update_status(alice.id, &id, status("SENT")).await.unwrap();
        let updated = quotes.update(alice.id, &id, input(company.id)).await.unwrap();
        assert_eq!(updated.number, quote.number);
        quotes.update_status(alice.id, &id, status("APPROVED")).await.unwrap();
        quotes.update_status(alice.id, &id, status("EXECUTED")).await.unwrap();

        let err = quotes.update(alice.id, &id, input(company.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::ImmutableState(_)));
        let err = quotes.update_status(alice.id, &id, status("DRAFT")).await.unwrap_err();
        assert!(matches!(err, ServiceError::ImmutableState(_)));
    }

    #[tokio::test]
    async fn duplicate_is_a_fresh_draft() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        let quotes = &ctx.services.quotes;
        let original = quotes.create(alice.id, input(company.id)).await.unwrap();
        quotes
            .update_status(
                alice.id,
                &original.id.to_string(),
                QuoteStatusInput {
                    status: Some("SENT".to_string()),
                },
            )
            .await
            .unwrap();

        let copy = quotes.duplicate(alice.id, &original.id.to_string()).await.unwrap();
        assert_ne!(copy.id, original.id);
        assert_ne!(copy.number, original.number);
        assert_eq!(copy.status, QuoteStatus::Draft);
        assert_eq!(copy.client_name, original.client_name);
        assert_eq!(copy.total, original.total);
        assert_eq!(copy.items.len(), original.items.len());
        assert!(copy.items.iter().zip(&original.items).all(|(a, b)| a.id != b.id));
    }

    #[tokio::test]
    async fn comparison_groups_by_category() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        let material = ctx.category(alice.id, company.id, "Material").await;

        let quote = ctx
            .services
            .quotes
            .create(
                alice.id,
                QuoteInput {
                    items: Some(vec![
                        QuoteItemInput {
                            category_id: Some(material.id.to_string()),
                            ..item("Cabo", 10, Decimal::from(20))
                        },
                        item("Visita", 1, Decimal::from(50)),
                    ]),
                    discount: None,
                    ..input(company.id)
                },
            )
            .await
            .unwrap();

        ctx.services
            .transactions
            .create(
                alice.id,
                TransactionInput {
                    company_id: Some(company.id.to_string()),
                    month: Some("Março".to_string()),
                    year: Some(2025_i64.into()),
                    amount: Some(Decimal::from(230).into()),
                    category: Some("Material".to_string()),
                    quote_id: Some(quote.id.to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let report = ctx
            .services
            .quotes
            .comparison(alice.id, &quote.id.to_string())
            .await
            .unwrap();
        let material_row = report.rows.iter().find(|r| r.category == "Material").unwrap();
        assert_eq!(material_row.quoted, Decimal::from(200));
        assert_eq!(material_row.executed, Decimal::from(230));
        assert_eq!(material_row.difference, Decimal::from(30));
        let other = report.rows.iter().find(|r| r.category == UNCATEGORIZED).unwrap();
        assert_eq!(other.executed, Decimal::ZERO);
        assert_eq!(report.quoted_total, Decimal::from(250));
        assert_eq!(report.executed_total, Decimal::from(230));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_rejects_unknown_status() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        let quotes = &ctx.services.quotes;
        let sent = quotes.create(alice.id, input(company.id)).await.unwrap();
        quotes.create(alice.id, input(company.id)).await.unwrap();
        quotes
            .update_status(
                alice.id,
                &sent.id.to_string(),
                QuoteStatusInput {
                    status: Some("SENT".to_string()),
                },
            )
            .await
            .unwrap();

        let query = |status: Option<&str>| QuoteQuery {
            company_id: Some(company.id.to_string()),
            status: status.map(str::to_string),
        };
        let all = quotes.list(alice.id, &query(None), PageRequest::default()).await.unwrap();
        assert_eq!(all.pagination.total, 2);
        let only_sent = quotes.list(alice.id, &query(Some("SENT")), PageRequest::default()).await.unwrap();
        assert_eq!(only_sent.data.len(), 1);
        assert_eq!(only_sent.data[0].id, sent.id);

        let err = quotes
            .list(alice.id, &query(Some("LOST")), PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn other_users_cannot_touch_quotes() {
        let ctx = TestContext::new();
        let (alice, _) = ctx.register("alice@example.com").await;
        let (bob, _) = ctx.register("bob@example.com").await;
        let company = ctx.company(alice.id, "Alice Co").await;
        let quote = ctx.quote(alice.id, company.id).await;
        let id = quote.id.to_string();

        let err = ctx.services.quotes.duplicate(bob.id, &id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = ctx.services.quotes.delete(bob.id, &id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = ctx.services.quotes.create(bob.id, input(company.id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}
