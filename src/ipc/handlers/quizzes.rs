use crate::catalog::quizzes;
use crate::ipc::error::{engine_err, ok};
use crate::ipc::helpers::{engine_ctx, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_quizzes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match quizzes::create_quiz(&ctx, &name, &subject_id) {
        Ok(quiz) => ok(&req.id, json!({ "quiz": quiz })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_quizzes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match quizzes::get_quiz(ctx.conn, &quiz_id) {
        Ok(quiz) => ok(&req.id, json!({ "quiz": quiz })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_quizzes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(ctx) = state.engine() else {
        return ok(&req.id, json!({ "quizzes": [] }));
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match quizzes::list_quizzes(ctx.conn, &subject_id) {
        Ok(list) => ok(&req.id, json!({ "quizzes": list })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_quizzes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match quizzes::rename_quiz(&ctx, &quiz_id, &name) {
        Ok(quiz) => ok(&req.id, json!({ "quiz": quiz })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_quizzes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match quizzes::delete_quiz(&ctx, &quiz_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "quizzes.create" => Some(handle_quizzes_create(state, req)),
        "quizzes.get" => Some(handle_quizzes_get(state, req)),
        "quizzes.list" => Some(handle_quizzes_list(state, req)),
        "quizzes.update" => Some(handle_quizzes_update(state, req)),
        "quizzes.delete" => Some(handle_quizzes_delete(state, req)),
        _ => None,
    }
}
