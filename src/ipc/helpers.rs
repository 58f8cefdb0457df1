use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::tasks;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::Value as JsonValue;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, JsonValue> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, JsonValue> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn parse_title(v: Option<&JsonValue>) -> Result<String, &'static str> {
    let s = v
        .and_then(|v| v.as_str())
        .ok_or("is required")?
        .trim()
        .to_string();
    if s.is_empty() {
        return Err("must not be empty");
    }
    Ok(s)
}

pub fn parse_text(v: Option<&JsonValue>) -> Result<String, &'static str> {
    match v {
        None => Ok(String::new()),
        Some(v) if v.is_null() => Ok(String::new()),
        Some(v) => Ok(v.as_str().ok_or("must be string")?.trim().to_string()),
    }
}

/// `null`, missing and blank strings all mean "no date".
pub fn parse_opt_date(v: Option<&JsonValue>) -> Result<Option<String>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let s = v.as_str().ok_or("must be YYYY-MM-DD string or null")?.trim();
            if s.is_empty() {
                return Ok(None);
            }
            let d = tasks::parse_date(s).ok_or("must be a valid YYYY-MM-DD date")?;
            Ok(Some(d.format("%Y-%m-%d").to_string()))
        }
    }
}

fn as_f64(v: &JsonValue) -> Option<f64> {
    let x = match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    x.filter(|x| x.is_finite())
}

/// A percentage in 0..=100. Blank input is `None` (ungraded).
pub fn parse_opt_percent(v: Option<&JsonValue>) -> Result<Option<f64>, &'static str> {
    match v {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => {
            let x = as_f64(v).ok_or("must be a number, blank or null")?;
            if !(0.0..=100.0).contains(&x) {
                return Err("must be in 0..=100");
            }
            Ok(Some(x))
        }
    }
}

pub fn parse_percent(v: Option<&JsonValue>) -> Result<f64, &'static str> {
    parse_opt_percent(v)?.ok_or("is required")
}

pub fn parse_term(v: Option<&JsonValue>) -> Result<i64, &'static str> {
    let v = v.ok_or("is required")?;
    let n = match v {
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => v.as_i64(),
    }
    .ok_or("must be an integer")?;
    if n < 1 {
        return Err("must be >= 1");
    }
    Ok(n)
}

pub fn parse_credits(v: Option<&JsonValue>) -> Result<f64, &'static str> {
    let x = v.and_then(as_f64).ok_or("must be a number")?;
    if x <= 0.0 {
        return Err("must be > 0");
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn percent_parsing() {
        assert_eq!(parse_opt_percent(None), Ok(None));
        assert_eq!(parse_opt_percent(Some(&json!(null))), Ok(None));
        assert_eq!(parse_opt_percent(Some(&json!("  "))), Ok(None));
        assert_eq!(parse_opt_percent(Some(&json!("72.5"))), Ok(Some(72.5)));
        assert_eq!(parse_opt_percent(Some(&json!(0))), Ok(Some(0.0)));
        assert!(parse_opt_percent(Some(&json!(100.5))).is_err());
        assert!(parse_opt_percent(Some(&json!(-1))).is_err());
        assert!(parse_opt_percent(Some(&json!("abc"))).is_err());
        assert!(parse_percent(Some(&json!(""))).is_err());
    }

    #[test]
    fn term_credits_and_dates() {
        assert_eq!(parse_term(Some(&json!(2))), Ok(2));
        assert_eq!(parse_term(Some(&json!("3"))), Ok(3));
        assert!(parse_term(Some(&json!(0))).is_err());
        assert!(parse_term(Some(&json!(1.5))).is_err());
        assert_eq!(parse_credits(Some(&json!("7.5"))), Ok(7.5));
        assert!(parse_credits(Some(&json!(0))).is_err());

        assert_eq!(parse_opt_date(Some(&json!(""))), Ok(None));
        assert_eq!(
            parse_opt_date(Some(&json!("2026-11-02"))),
            Ok(Some("2026-11-02".to_string()))
        );
        assert!(parse_opt_date(Some(&json!("2026-13-01"))).is_err());
        assert!(parse_opt_date(Some(&json!(20261102))).is_err());
    }
}
