use crate::grading::{self, BulkEntry};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{engine_ctx, required_score, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_grades_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match required_score(req, "score") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grading::create_grade(&ctx, &student_id, &quiz_id, score) {
        Ok(grade) => ok(&req.id, json!({ "grade": grade })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade_id = match required_str(req, "gradeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grading::get_grade(ctx.conn, &grade_id) {
        Ok(grade) => ok(&req.id, json!({ "grade": grade })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade_id = match required_str(req, "gradeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match required_score(req, "score") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grading::update_grade(&ctx, &grade_id, score) {
        Ok(grade) => ok(&req.id, json!({ "grade": grade })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade_id = match required_str(req, "gradeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grading::delete_grade(&ctx, &grade_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_grades_list_for_quiz(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grading::list_grades_for_quiz(ctx.conn, &quiz_id) {
        Ok(listing) => ok(&req.id, json!(listing)),
        Err(e) => engine_err(&req.id, e),
    }
}

/// A non-numeric score is passed through as NaN so the entry is rejected
/// individually instead of failing the whole batch.
fn parse_bulk_entries(req: &Request) -> Result<Vec<BulkEntry>, serde_json::Value> {
    let Some(raw) = req.params.get("entries").and_then(|v| v.as_array()) else {
        return Err(err(&req.id, "bad_params", "missing entries[]", None));
    };
    let mut out = Vec::with_capacity(raw.len());
    for (i, item) in raw.iter().enumerate() {
        let Some(student_id) = item.get("studentId").and_then(|v| v.as_str()) else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("entries[{}].studentId must be a string", i),
                None,
            ));
        };
        let score = item
            .get("score")
            .and_then(|v| v.as_f64())
            .unwrap_or(f64::NAN);
        out.push(BulkEntry {
            student_id: student_id.to_string(),
            score,
        });
    }
    Ok(out)
}

fn handle_grades_bulk_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entries = match parse_bulk_entries(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let report = grading::bulk_upsert_for_quiz(&ctx, &quiz_id, &entries);
    ok(&req.id, json!(report))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.create" => Some(handle_grades_create(state, req)),
        "grades.get" => Some(handle_grades_get(state, req)),
        "grades.update" => Some(handle_grades_update(state, req)),
        "grades.delete" => Some(handle_grades_delete(state, req)),
        "grades.listForQuiz" => Some(handle_grades_list_for_quiz(state, req)),
        "grades.bulkUpsert" => Some(handle_grades_bulk_upsert(state, req)),
        _ => None,
    }
}
