/// Shared domain enums used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Portuguese month names accepted on transactions, in calendar order
pub const MONTHS: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// Pseudo-month for yearly accumulated entries
pub const ACCUMULATED: &str = "Acumulado";

/// Month name for a 1-based calendar month number
pub fn month_name(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month).ok()?.checked_sub(1)?;
    MONTHS.get(index).copied()
}

/// Whether `value` is one of the twelve calendar months (excludes "Acumulado")
pub fn is_calendar_month(value: &str) -> bool {
    MONTHS.contains(&value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pago,
    Aberto,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pago => "PAGO",
            TransactionStatus::Aberto => "ABERTO",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            TransactionStatus::Pago => TransactionStatus::Aberto,
            TransactionStatus::Aberto => TransactionStatus::Pago,
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAGO" => Ok(TransactionStatus::Pago),
            "ABERTO" => Ok(TransactionStatus::Aberto),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CategoryType {
    Expense,
    Income,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Expense => "EXPENSE",
            CategoryType::Income => "INCOME",
        }
    }
}

impl FromStr for CategoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXPENSE" => Ok(CategoryType::Expense),
            "INCOME" => Ok(CategoryType::Income),
            other => Err(format!("unknown category type: {other}")),
        }
    }
}

impl TryFrom<String> for CategoryType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quote lifecycle.
///
/// `Draft` may move to `Sent`, `Approved` or `Rejected` (and back between
/// those), only `Approved` may become `Executed`, and `Executed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Executed,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 5] = [
        QuoteStatus::Draft,
        QuoteStatus::Sent,
        QuoteStatus::Approved,
        QuoteStatus::Rejected,
        QuoteStatus::Executed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::Sent => "SENT",
            QuoteStatus::Approved => "APPROVED",
            QuoteStatus::Rejected => "REJECTED",
            QuoteStatus::Executed => "EXECUTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteStatus::Executed)
    }

    /// Whether a quote currently in `self` may move to `next`
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        match (self, next) {
            (QuoteStatus::Executed, _) => false,
            (QuoteStatus::Approved, QuoteStatus::Executed) => true,
            (_, QuoteStatus::Executed) => false,
            _ => true,
        }
    }
}

impl FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuoteStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown quote status: {s}"))
    }
}

impl TryFrom<String> for QuoteStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
