use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Store failures are worth a log line; validation errors are not.
pub fn db_err(id: &str, code: &str, e: impl std::fmt::Display) -> serde_json::Value {
    let message = e.to_string();
    tracing::warn!(code, error = %message, "store operation failed");
    err(id, code, message, None)
}
