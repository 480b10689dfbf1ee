use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{engine_ctx, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::stats::{self, ScoreScope};
use serde_json::json;

fn handle_subject_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match stats::subject_overview(ctx.conn) {
        Ok(v) => ok(&req.id, json!(v)),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_quiz_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let quiz_id = match required_str(req, "quizId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match stats::quiz_grade_summary(ctx.conn, &quiz_id) {
        Ok(v) => ok(&req.id, json!(v)),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_student_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match stats::student_grade_summary(ctx.conn, &student_id) {
        Ok(v) => ok(&req.id, json!(v)),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_student_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match stats::student_subject_progress(ctx.conn, &student_id, &subject_id) {
        Ok(v) => ok(&req.id, json!(v)),
        Err(e) => engine_err(&req.id, e),
    }
}

/// `scores` computes over the given list; otherwise at most one of
/// quizId/subjectId/studentId narrows the stored grades (none means all).
fn handle_pass_rate(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(raw) = req.params.get("scores") {
        let Some(arr) = raw.as_array() else {
            return err(&req.id, "bad_params", "scores must be an array", None);
        };
        let mut scores = Vec::with_capacity(arr.len());
        for v in arr {
            match v.as_i64() {
                Some(s) => scores.push(s),
                None => {
                    return err(
                        &req.id,
                        "bad_params",
                        "scores must be whole numbers",
                        Some(json!({ "value": v })),
                    )
                }
            }
        }
        return ok(
            &req.id,
            json!({ "count": scores.len(), "passRate": stats::pass_rate(&scores) }),
        );
    }

    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut filters = Vec::new();
    for key in ["quizId", "subjectId", "studentId"] {
        match optional_str(req, key) {
            Ok(Some(v)) => filters.push((key, v)),
            Ok(None) => {}
            Err(e) => return e,
        }
    }
    if filters.len() > 1 {
        return err(
            &req.id,
            "bad_params",
            "pass only one of quizId, subjectId, studentId",
            None,
        );
    }
    let scope = match filters.first() {
        None => ScoreScope::All,
        Some(("quizId", id)) => ScoreScope::Quiz(id.as_str()),
        Some(("subjectId", id)) => ScoreScope::Subject(id.as_str()),
        Some((_, id)) => ScoreScope::Student(id.as_str()),
    };

    match stats::load_scores(ctx.conn, scope) {
        Ok(scores) => ok(
            &req.id,
            json!({ "count": scores.len(), "passRate": stats::pass_rate(&scores) }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_system_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match stats::system_overview(&ctx) {
        Ok(v) => ok(&req.id, json!(v)),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_monthly_growth(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ctx = match engine_ctx(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match stats::monthly_growth(&ctx) {
        Ok(v) => ok(&req.id, json!(v)),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.subjectOverview" => Some(handle_subject_overview(state, req)),
        "stats.quizSummary" => Some(handle_quiz_summary(state, req)),
        "stats.studentSummary" => Some(handle_student_summary(state, req)),
        "stats.studentProgress" => Some(handle_student_progress(state, req)),
        "stats.passRate" => Some(handle_pass_rate(state, req)),
        "stats.systemOverview" => Some(handle_system_overview(state, req)),
        "stats.monthlyGrowth" => Some(handle_monthly_growth(state, req)),
        _ => None,
    }
}
