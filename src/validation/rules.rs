// validation/rules.rs - Individual field checks
//
// Each function takes the value and the field label and returns a Check.
// Messages are Portuguese because they are shown verbatim to end users.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use super::{Check, FieldError};
use crate::types::{ACCUMULATED, MONTHS};

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("hex color pattern compiles"));

static SCRIPT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<\s*/?\s*script|javascript\s*:|vbscript\s*:|data\s*:\s*text/html|<\s*iframe|<\s*object|<\s*embed|\bon[a-z]+\s*=",
    )
    .expect("script pattern compiles")
});

static MONGO_OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\$(where|ne|eq|gt|gte|lt|lte|in|nin|regex|exists|or|and|not|nor|expr|elemmatch|all|size|type|mod|text|function|lookup|set|unset|push|pull)\b",
    )
    .expect("operator pattern compiles")
});

static QUERY_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\s*["']?\$|\{[^{}]*:[^{}]*\}"#).expect("query object pattern compiles"));

static SQL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)--|;|/\*|'\s*or\b|\bdrop\b|\bunion\b").expect("sql pattern compiles")
});

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

pub fn required_message(field: &str) -> String {
    format!("{field} é obrigatório")
}

pub fn invalid_type_message(field: &str) -> String {
    format!("{field} tem um formato inválido")
}

pub fn required(value: &str, field: &str) -> Check {
    if value.trim().is_empty() {
        return Err(FieldError::new(field, required_message(field)));
    }
    Ok(())
}

pub fn max_length(value: &str, max: usize, field: &str) -> Check {
    if value.chars().count() > max {
        return Err(FieldError::new(field, format!("{field} deve ter no máximo {max} caracteres")));
    }
    Ok(())
}

pub fn min_length(value: &str, min: usize, field: &str) -> Check {
    if value.chars().count() < min {
        return Err(FieldError::new(field, format!("{field} deve ter no mínimo {min} caracteres")));
    }
    Ok(())
}

pub fn positive(value: Decimal, field: &str) -> Check {
    if value <= Decimal::ZERO {
        return Err(FieldError::new(field, format!("{field} deve ser maior que zero")));
    }
    Ok(())
}

pub fn non_negative(value: Decimal, field: &str) -> Check {
    if value < Decimal::ZERO {
        return Err(FieldError::new(field, format!("{field} não pode ser negativo")));
    }
    Ok(())
}

pub fn numeric_range(value: i64, min: i64, max: i64, field: &str) -> Check {
    if value < min || value > max {
        return Err(FieldError::new(field, format!("{field} deve estar entre {min} e {max}")));
    }
    Ok(())
}

/// One of the twelve Portuguese month names, or "Acumulado"
pub fn month(value: &str, field: &str) -> Check {
    if MONTHS.contains(&value) || value == ACCUMULATED {
        return Ok(());
    }
    Err(FieldError::new(
        field,
        format!("{field} deve ser um mês válido (Janeiro a Dezembro ou {ACCUMULATED})"),
    ))
}

/// Like [`month`] but rejects "Acumulado"
pub fn calendar_month(value: &str, field: &str) -> Check {
    if MONTHS.contains(&value) {
        return Ok(());
    }
    Err(FieldError::new(field, format!("{field} deve ser um mês entre Janeiro e Dezembro")))
}

pub fn transaction_status(value: &str, field: &str) -> Check {
    one_of(value, &["PAGO", "ABERTO"], field)
}

pub fn category_type(value: &str, field: &str) -> Check {
    one_of(value, &["EXPENSE", "INCOME"], field)
}

pub fn quote_status(value: &str, field: &str) -> Check {
    one_of(value, &["DRAFT", "SENT", "APPROVED", "REJECTED", "EXECUTED"], field)
}

pub fn one_of(value: &str, allowed: &[&str], field: &str) -> Check {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(FieldError::new(
        field,
        format!("{field} deve ser um dos valores: {}", allowed.join(", ")),
    ))
}

pub fn hex_color(value: &str, field: &str) -> Check {
    if HEX_COLOR.is_match(value) {
        return Ok(());
    }
    Err(FieldError::new(field, format!("{field} deve ser uma cor hexadecimal válida (#RRGGBB)")))
}

pub fn day_of_month(value: i64, field: &str) -> Check {
    if (1..=31).contains(&value) {
        return Ok(());
    }
    Err(FieldError::new(field, format!("{field} deve ser um dia entre 1 e 31")))
}

pub fn no_script_tags(value: &str, field: &str) -> Check {
    if SCRIPT_PATTERN.is_match(value) {
        return Err(FieldError::new(field, format!("{field} contém conteúdo não permitido")));
    }
    Ok(())
}

pub fn no_mongo_operators(value: &str, field: &str) -> Check {
    if MONGO_OPERATOR.is_match(value) || QUERY_OBJECT.is_match(value) {
        return Err(FieldError::new(field, format!("{field} contém operadores não permitidos")));
    }
    Ok(())
}

pub fn no_sql_injection(value: &str, field: &str) -> Check {
    if SQL_PATTERN.is_match(value) {
        return Err(FieldError::new(
            field,
            format!("{field} contém caracteres ou comandos não permitidos"),
        ));
    }
    Ok(())
}

pub fn email(value: &str, field: &str) -> Check {
    if value.len() <= 254 && EMAIL.is_match(value) {
        return Ok(());
    }
    Err(FieldError::new(field, format!("{field} deve ser um e-mail válido")))
}

/// Brazilian company registry number: 14 digits (punctuation ignored) with
/// valid check digits.
pub fn cnpj(value: &str, field: &str) -> Check {
    if normalize_cnpj(value).is_some() {
        return Ok(());
    }
    Err(FieldError::new(field, format!("{field} deve ser um CNPJ válido")))
}

/// Strip punctuation and verify the two check digits
pub fn normalize_cnpj(value: &str) -> Option<String> {
    if value.chars().any(|c| !(c.is_ascii_digit() || matches!(c, '.' | '/' | '-' | ' '))) {
        return None;
    }
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 14 || digits.iter().all(|d| *d == digits[0]) {
        return None;
    }

    let check_digit = |slice: &[u32]| {
        let weights = [6u32, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
        let offset = weights.len() - slice.len();
        let sum: u32 = slice.iter().zip(&weights[offset..]).map(|(d, w)| d * w).sum();
        match sum % 11 {
            0 | 1 => 0,
            rest => 11 - rest,
        }
    };

    if check_digit(&digits[..12]) != digits[12] || check_digit(&digits[..13]) != digits[13] {
        return None;
    }
    Some(digits.iter().map(|d| char::from_digit(*d, 10).unwrap_or('0')).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_length_names_field_and_bound() {
        for (value, bound) in [("abcdef", 5usize), ("x".repeat(201).as_str(), 200), ("ção", 2)] {
            let err = max_length(value, bound, "description").unwrap_err();
            assert_eq!(err.field, "description");
            assert!(err.message.contains("description"));
            assert!(err.message.contains(&bound.to_string()));
        }
        assert!(max_length("abcde", 5, "description").is_ok());
        assert!(max_length("ção", 3, "description").is_ok());
        assert!(max_length("", 0, "description").is_ok());
    }

    #[test]
    fn min_length_counts_characters() {
        assert!(min_length("secret", 6, "password").is_ok());
        let err = min_length("12345", 6, "password").unwrap_err();
        assert!(err.message.contains('6'));
    }

    #[test]
    fn required_rejects_blank() {
        assert!(required("   ", "name").is_err());
        assert!(required("a", "name").is_ok());
    }

    #[test]
    fn numbers() {
        assert!(positive(Decimal::new(1, 2), "amount").is_ok());
        assert!(positive(Decimal::ZERO, "amount").is_err());
        assert!(positive(Decimal::from(-500), "amount").is_err());
        assert!(non_negative(Decimal::ZERO, "budget").is_ok());
        assert!(non_negative(Decimal::from(-1), "budget").is_err());
        assert!(numeric_range(2000, 2000, 2100, "year").is_ok());
        assert!(numeric_range(2100, 2000, 2100, "year").is_ok());
        assert!(numeric_range(1999, 2000, 2100, "year").is_err());
        assert!(numeric_range(2101, 2000, 2100, "year").is_err());
        assert!(day_of_month(1, "day").is_ok());
        assert!(day_of_month(31, "day").is_ok());
        assert!(day_of_month(0, "day").is_err());
        assert!(day_of_month(32, "day").is_err());
    }

    #[test]
    fn months() {
        assert!(month("Janeiro", "month").is_ok());
        assert!(month("Março", "month").is_ok());
        assert!(month("Acumulado", "month").is_ok());
        assert!(month("January", "month").is_err());
        assert!(month("janeiro", "month").is_err());
        assert!(calendar_month("Acumulado", "month").is_err());
    }

    #[test]
    fn enumerations() {
        assert!(transaction_status("PAGO", "status").is_ok());
        assert!(transaction_status("ABERTO", "status").is_ok());
        assert!(transaction_status("invalid", "status").is_err());
        assert!(category_type("INCOME", "type").is_ok());
        assert!(quote_status("EXECUTED", "status").is_ok());
        assert!(quote_status("DONE", "status").is_err());
    }

    #[test]
    fn colors() {
        assert!(hex_color("#22c55e", "color").is_ok());
        assert!(hex_color("#FFFFFF", "color").is_ok());
        assert!(hex_color("22c55e", "color").is_err());
        assert!(hex_color("#fff", "color").is_err());
        assert!(hex_color("#22c55e ", "color").is_err());
        assert!(hex_color("#gggggg", "color").is_err());
    }

    #[test]
    fn script_payloads_are_rejected_case_insensitively() {
        for payload in [
            "<script>alert(1)</script>",
            "<SCRIPT src=x>",
            "javascript:alert(1)",
            "JavaScript :void(0)",
            "<img src=x onerror=alert(1)>",
            "<body ONLOAD = go()>",
            "<iframe src=//evil>",
        ] {
            assert!(no_script_tags(payload, "description").is_err(), "{payload}");
        }
        assert!(no_script_tags("Conta de luz - março", "description").is_ok());
        assert!(no_script_tags("Condomínio", "description").is_ok());
    }

    #[test]
    fn mongo_operators_are_rejected() {
        for payload in [
            "$where: 1",
            "{\"$gt\": \"\"}",
            "{ $ne: null }",
            "x $regex .*",
            "{ \"email\": \"a\" }",
        ] {
            assert!(no_mongo_operators(payload, "category").is_err(), "{payload}");
        }
        assert!(no_mongo_operators("R$ 100,00", "category").is_ok());
        assert!(no_mongo_operators("Pagamento {mensal}", "category").is_ok());
    }

    #[test]
    fn sql_sequences_are_rejected() {
        for payload in [
            "x' OR '1'='1",
            "1; DELETE FROM users",
            "name -- comment",
            "DROP TABLE transactions",
            "1 UNION SELECT *",
            "/* hidden */",
        ] {
            assert!(no_sql_injection(payload, "category").is_err(), "{payload}");
        }
        assert!(no_sql_injection("Aluguel - parcela 1", "category").is_ok());
        assert!(no_sql_injection("Gotas de orvalho", "category").is_ok());
    }

    #[test]
    fn emails() {
        assert!(email("alice@example.com", "email").is_ok());
        assert!(email("alice@example", "email").is_err());
        assert!(email("alice example.com", "email").is_err());
        assert!(email("@example.com", "email").is_err());
    }

    #[test]
    fn cnpj_check_digits() {
        assert_eq!(normalize_cnpj("11.222.333/0001-81").as_deref(), Some("11222333000181"));
        assert!(cnpj("11222333000181", "cnpj").is_ok());
        assert!(cnpj("11.222.333/0001-82", "cnpj").is_err());
        assert!(cnpj("11111111111111", "cnpj").is_err());
        assert!(cnpj("1122233300018", "cnpj").is_err());
        assert!(cnpj("11a22333000181", "cnpj").is_err());
    }
}
