use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::QuoteStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuoteItem {
    pub id: Uuid,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// quantity × unit_price, rounded to cents
    pub total: Decimal,
    pub category_id: Option<Uuid>,
}

/// A numbered estimate sent to a client.
///
/// `number` is `ORC-<year>-<sequence>` and unique per company. Once the
/// status reaches `Executed` the quote can no longer be edited.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: Uuid,
    pub company_id: Uuid,
    pub number: String,
    pub year: i32,
    pub sequence: i32,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub client_document: Option<String>,
    #[sqlx(skip)]
    pub items: Vec<QuoteItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    #[sqlx(try_from = "String")]
    pub status: QuoteStatus,
    pub notes: Option<String>,
    pub valid_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reusable item list for new quotes
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTemplate {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub items: Vec<QuoteItem>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
