use serde_json::Value;
use thiserror::Error;

use crate::model::{StatColumn, StatKind, StatValue};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("value is null")]
    Null,
    #[error("expected a number or numeric string, got {0}")]
    WrongType(&'static str),
    #[error("invalid numeric text {0:?}")]
    InvalidText(String),
    #[error("value {0} does not fit the target type")]
    OutOfRange(f64),
    #[error("invalid boolean {0:?}")]
    InvalidBool(String),
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_number_text(raw: &str) -> Result<f64, ParseError> {
    let trimmed = raw.trim();
    let n = trimmed
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidText(raw.to_string()))?;
    if !n.is_finite() {
        return Err(ParseError::InvalidText(raw.to_string()));
    }
    Ok(n)
}

pub fn parse_float(v: &Value) -> Result<f64, ParseError> {
    match v {
        Value::Null => Err(ParseError::Null),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .ok_or(ParseError::WrongType("number")),
        Value::String(s) => parse_number_text(s),
        other => Err(ParseError::WrongType(type_name(other))),
    }
}

/// Like [`parse_float`] but tolerates a trailing `%` on string input
/// (`"55%"` becomes `55.0`).
pub fn parse_percent(v: &Value) -> Result<f64, ParseError> {
    match v {
        Value::String(s) => {
            let trimmed = s.trim();
            let stripped = trimmed.strip_suffix('%').unwrap_or(trimmed);
            parse_number_text(stripped).map_err(|_| ParseError::InvalidText(s.clone()))
        }
        other => parse_float(other),
    }
}

/// Integers accept native ints, finite floats (truncated) and numeric text.
pub fn parse_int(v: &Value) -> Result<i64, ParseError> {
    if let Some(n) = v.as_i64() {
        return Ok(n);
    }
    let f = parse_float(v)?;
    let truncated = f.trunc();
    if truncated < i64::MIN as f64 || truncated > i64::MAX as f64 {
        return Err(ParseError::OutOfRange(f));
    }
    Ok(truncated as i64)
}

pub fn parse_bool(v: &Value) -> Result<bool, ParseError> {
    match v {
        Value::Null => Err(ParseError::Null),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(ParseError::InvalidBool(n.to_string())),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(ParseError::InvalidBool(s.clone())),
        },
        other => Err(ParseError::WrongType(type_name(other))),
    }
}

/// Missing or unparseable booleans fall back to `default`.
pub fn bool_or(v: Option<&Value>, default: bool) -> bool {
    v.and_then(|v| parse_bool(v).ok()).unwrap_or(default)
}

pub fn parse_stat(column: StatColumn, v: &Value) -> Result<StatValue, ParseError> {
    match column.kind() {
        StatKind::Integer => parse_int(v).map(StatValue::Int),
        StatKind::Percent => parse_percent(v).map(StatValue::Float),
    }
}

pub fn as_u64_any(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<u64>().ok()
}

pub fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

pub fn as_string_any(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn get_u64(v: &Value, key: &str) -> Option<u64> {
    v.get(key).and_then(as_u64_any)
}

pub fn get_string(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(as_string_any)
}
