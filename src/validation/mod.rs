//! Field validation and input sanitization.
//!
//! Every check in [`rules`] is a pure function returning a [`Check`]: either
//! `Ok(())` or a [`FieldError`] naming the offending field. Checks never panic
//! and never short-circuit a request on their own; the [`Validator`] collector
//! runs all of them and reports every violation at once.
//!
//! Free text is handled twice: obviously malicious payloads are rejected with
//! a field error, and whatever is accepted is passed through
//! [`sanitize::sanitize`] before it is persisted.

pub mod rules;
pub mod sanitize;

use rust_decimal::Decimal;
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use sanitize::sanitize;

/// A single field-level violation, as returned to API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Outcome of one check
pub type Check = Result<(), FieldError>;

/// The full list of violations for one request. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn single(error: FieldError) -> Self {
        Self(vec![error])
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.0
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.iter().map(|e| e.field.as_str()).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A scalar request field that never fails deserialization.
///
/// Numbers sent as strings (`"2025"`, `"12.50"`) are accepted. Anything else
/// that does not fit is kept as [`Lenient::Invalid`] so the [`Validator`] can
/// report it next to every other field error instead of rejecting the whole
/// body up front.
#[derive(Debug, Clone, PartialEq)]
pub enum Lenient<T> {
    Valid(T),
    Invalid(String),
}

impl<T> From<T> for Lenient<T> {
    fn from(value: T) -> Self {
        Lenient::Valid(value)
    }
}

impl<'de, T> Deserialize<'de> for Lenient<T>
where
    T: DeserializeOwned + FromStr,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if let Ok(value) = serde_json::from_value::<T>(raw.clone()) {
            return Ok(Lenient::Valid(value));
        }
        let parsed = match &raw {
            Value::String(text) => text.trim().parse::<T>().ok(),
            _ => None,
        };
        Ok(parsed.map_or_else(|| Lenient::Invalid(raw.to_string()), Lenient::Valid))
    }
}

/// Accumulates check results for one request.
///
/// The `require*` helpers record a "required" error when the value is
/// missing and hand back a placeholder so the caller can keep checking the
/// remaining fields. Placeholders never escape: [`Validator::finish`] fails
/// whenever any error was recorded.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a check; returns whether it passed
    pub fn check(&mut self, result: Check) -> bool {
        match result {
            Ok(()) => true,
            Err(error) => {
                self.errors.push(error);
                false
            }
        }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Unwrap a [`Lenient`] field, recording a type error when it did not parse
    pub fn typed<T: Clone>(&mut self, value: Option<&Lenient<T>>, field: &str) -> Option<T> {
        match value? {
            Lenient::Valid(value) => Some(value.clone()),
            Lenient::Invalid(_) => {
                self.push(field, rules::invalid_type_message(field));
                None
            }
        }
    }

    /// Required value of any type. A field that already failed (e.g. its
    /// type check) is not reported a second time as missing.
    pub fn require<T: Default>(&mut self, value: Option<T>, field: &str) -> T {
        match value {
            Some(value) => value,
            None => {
                if !self.has_error_for(field) {
                    self.push(field, rules::required_message(field));
                }
                T::default()
            }
        }
    }

    /// Required, non-blank free text: length-bounded, screened for injection
    /// payloads, and sanitized.
    pub fn require_text(&mut self, value: Option<&str>, max: usize, field: &str) -> String {
        let value = value.unwrap_or_default();
        if !self.check(rules::required(value, field)) {
            return String::new();
        }
        let cleaned = self.text(value, max, field);
        // Markup-only input sanitizes down to nothing
        if !self.has_error_for(field) {
            self.check(rules::required(&cleaned, field));
        }
        cleaned
    }

    /// Optional free text. Blank input becomes `None`.
    pub fn optional_text(&mut self, value: Option<&str>, max: usize, field: &str) -> Option<String> {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;
        let cleaned = self.text(value, max, field);
        (!cleaned.is_empty()).then_some(cleaned)
    }

    fn text(&mut self, value: &str, max: usize, field: &str) -> String {
        let checks = [
            rules::max_length(value, max, field),
            rules::no_script_tags(value, field),
            rules::no_mongo_operators(value, field),
            rules::no_sql_injection(value, field),
        ];
        // One message per field keeps the response readable
        if let Some(Err(error)) = checks.into_iter().find(Result::is_err) {
            self.errors.push(error);
            return String::new();
        }
        sanitize(value)
    }

    /// Required enumerated value parsed through `FromStr`.
    ///
    /// `check` supplies the Portuguese message for out-of-range values.
    pub fn require_enum<T>(&mut self, value: Option<&str>, field: &str, check: fn(&str, &str) -> Check) -> Option<T>
    where
        T: FromStr,
    {
        let value = value.map(str::trim).unwrap_or_default();
        if !self.check(rules::required(value, field)) || !self.check(check(value, field)) {
            return None;
        }
        value.parse().ok()
    }

    pub fn require_positive(&mut self, value: Option<Decimal>, field: &str) -> Decimal {
        match value {
            Some(value) => {
                self.check(rules::positive(value, field));
                value
            }
            None => {
                if !self.has_error_for(field) {
                    self.push(field, rules::required_message(field));
                }
                Decimal::ZERO
            }
        }
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}
