use crate::context::EngineContext;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::Role;

pub fn engine_ctx<'a>(state: &'a AppState, req: &Request) -> Result<EngineContext<'a>, serde_json::Value> {
    state
        .engine()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Absent or null means `None`; any other non-string is rejected.
pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_str() {
            Some(s) => Ok(Some(s.to_string())),
            None => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a string", key),
                None,
            )),
        },
    }
}

pub fn required_score(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing/invalid {}", key), None))
}

pub fn optional_role(req: &Request, key: &str) -> Result<Option<Role>, serde_json::Value> {
    let Some(raw) = optional_str(req, key)? else {
        return Ok(None);
    };
    match Role::parse(&raw) {
        Some(role) => Ok(Some(role)),
        None => Err(err(
            &req.id,
            "bad_params",
            "role must be one of: ADMIN, PROFESSOR, STUDENT",
            Some(serde_json::json!({ "role": raw })),
        )),
    }
}

pub fn required_role(req: &Request, key: &str) -> Result<Role, serde_json::Value> {
    optional_role(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}
