use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::TransactionStatus;

/// A single income or expense entry for one month of one company.
///
/// `category` is free text matched by name against the company's categories.
/// Rows generated from a recurring rule carry `recurring_id`; rows booked
/// against a quote carry `quote_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub company_id: Uuid,
    pub month: String,
    pub year: i32,
    pub amount: Decimal,
    pub category: String,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub recurring_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
