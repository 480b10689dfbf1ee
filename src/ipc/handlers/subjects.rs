use crate::catalog::subjects::{self, SubjectPatch};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{engine_ctx, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let professor_id = match required_str(req, "professorId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match subjects::create_subject(&ctx, &name, &professor_id) {
        Ok(subject) => ok(&req.id, json!({ "subject": subject })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_subjects_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match subjects::get_subject(ctx.conn, &subject_id) {
        Ok(subject) => ok(&req.id, json!({ "subject": subject })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(ctx) = state.engine() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };
    let professor_id = match optional_str(req, "professorId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match subjects::list_subjects(ctx.conn, professor_id.as_deref()) {
        Ok(list) => ok(&req.id, json!({ "subjects": list })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let mut out = SubjectPatch::default();
    for (key, slot) in [("name", &mut out.name), ("professorId", &mut out.professor_id)] {
        match patch.get(key) {
            None => {}
            Some(v) => match v.as_str() {
                Some(s) => *slot = Some(s.to_string()),
                None => {
                    return err(
                        &req.id,
                        "bad_params",
                        format!("patch.{} must be a string", key),
                        None,
                    )
                }
            },
        }
    }

    match subjects::update_subject(&ctx, &subject_id, out) {
        Ok(subject) => ok(&req.id, json!({ "subject": subject })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match subjects::delete_subject(&ctx, &subject_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.get" => Some(handle_subjects_get(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}
