use serde_json::json;

use crate::error::EngineError;

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

/// Maps an engine failure onto the error envelope. Storage failures are
/// logged at error level; rejected input only at warn.
pub fn engine_err(id: &str, e: EngineError) -> serde_json::Value {
    match &e {
        EngineError::Storage(inner) => tracing::error!(request_id = id, error = %inner, "storage failure"),
        _ => tracing::warn!(request_id = id, code = e.code(), "request rejected: {e}"),
    }
    err(id, e.code(), e.to_string(), e.details())
}
