use crate::enrollment;
use crate::ipc::error::{engine_err, ok};
use crate::ipc::helpers::{engine_ctx, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn student_and_subject(req: &Request) -> Result<(String, String), serde_json::Value> {
    let student_id = required_str(req, "studentId")?;
    let subject_id = required_str(req, "subjectId")?;
    Ok((student_id, subject_id))
}

fn handle_enrollments_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (student_id, subject_id) = match student_and_subject(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match enrollment::assign(&ctx, &student_id, &subject_id) {
        Ok(row) => ok(&req.id, json!({ "enrollment": row })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_enrollments_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (student_id, subject_id) = match student_and_subject(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match enrollment::remove(&ctx, &student_id, &subject_id) {
        Ok(removal) => ok(&req.id, json!(removal)),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_enrollments_list_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(ctx) = state.engine() else {
        return ok(&req.id, json!({ "enrollments": [] }));
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match enrollment::list_for_student(ctx.conn, &student_id) {
        Ok(list) => ok(&req.id, json!({ "enrollments": list })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_enrollments_list_for_subject(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(ctx) = state.engine() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match enrollment::list_for_subject(ctx.conn, &subject_id) {
        Ok(list) => ok(&req.id, json!({ "students": list })),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.assign" => Some(handle_enrollments_assign(state, req)),
        "enrollments.remove" => Some(handle_enrollments_remove(state, req)),
        "enrollments.listForStudent" => Some(handle_enrollments_list_for_student(state, req)),
        "enrollments.listForSubject" => Some(handle_enrollments_list_for_subject(state, req)),
        _ => None,
    }
}
