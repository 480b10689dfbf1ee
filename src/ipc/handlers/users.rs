use crate::catalog::users::{self, UserPatch};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{engine_ctx, optional_role, optional_str, required_role, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let handle = match required_str(req, "handle") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match required_role(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let credential = match required_str(req, "credential") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match users::create_user(&ctx, &name, &handle, role, &credential) {
        Ok(user) => ok(&req.id, json!({ "user": user })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_users_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match users::get_user(ctx.conn, &user_id) {
        Ok(user) => ok(&req.id, json!({ "user": user })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(ctx) = state.engine() else {
        return ok(&req.id, json!({ "users": [] }));
    };
    let role = match optional_role(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match users::list_users(ctx.conn, role) {
        Ok(list) => ok(&req.id, json!({ "users": list })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_users_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if !req.params.get("patch").map(|v| v.is_object()).unwrap_or(false) {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    }
    let patch_req = Request {
        id: req.id.clone(),
        method: req.method.clone(),
        params: req.params["patch"].clone(),
    };

    let name = match optional_str(&patch_req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let handle = match optional_str(&patch_req, "handle") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match optional_role(&patch_req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let credential = match optional_str(&patch_req, "credential") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let patch = UserPatch {
        name,
        handle,
        role,
        credential,
    };
    match users::update_user(&ctx, &user_id, patch) {
        Ok(user) => ok(&req.id, json!({ "user": user })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_users_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match users::delete_user(&ctx, &user_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.create" => Some(handle_users_create(state, req)),
        "users.get" => Some(handle_users_get(state, req)),
        "users.list" => Some(handle_users_list(state, req)),
        "users.update" => Some(handle_users_update(state, req)),
        "users.delete" => Some(handle_users_delete(state, req)),
        _ => None,
    }
}
