use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::integrity::{self, NaturalKey};
use crate::model::{EntityKind, Role};
use crate::stats;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 100;
pub const BULK_UPSERT_MAX_ENTRIES: usize = 5000;

/// A grade joined with the student, quiz, subject and professor it belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeView {
    pub id: String,
    pub score: i64,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub student_id: String,
    pub student_name: String,
    pub student_handle: String,
    pub quiz_id: String,
    pub quiz_name: String,
    pub subject_id: String,
    pub subject_name: String,
    pub professor_id: String,
    pub professor_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizGrades {
    pub quiz_id: String,
    pub count: usize,
    pub average: f64,
    pub grades: Vec<GradeView>,
}

#[derive(Debug, Clone)]
pub struct BulkEntry {
    pub student_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkOutcome {
    #[serde(rename_all = "camelCase")]
    Created { grade_id: String },
    #[serde(rename_all = "camelCase")]
    Updated { grade_id: String },
    Rejected { code: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemResult {
    pub index: usize,
    pub student_id: String,
    #[serde(flatten)]
    pub outcome: BulkOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub created: usize,
    pub updated: usize,
    pub rejected: usize,
    pub limit_exceeded: bool,
    pub results: Vec<BulkItemResult>,
}

const GRADE_VIEW_SELECT: &str = "SELECT
       g.id, g.score, g.created_at, g.updated_at,
       u.id, u.name, u.handle,
       q.id, q.name,
       s.id, s.name,
       p.id, p.name
     FROM grades g
     JOIN users u ON u.id = g.student_id
     JOIN quizzes q ON q.id = g.quiz_id
     JOIN subjects s ON s.id = q.subject_id
     JOIN users p ON p.id = s.professor_id";

fn grade_view_from_row(r: &Row<'_>) -> rusqlite::Result<GradeView> {
    Ok(GradeView {
        id: r.get(0)?,
        score: r.get(1)?,
        created_at: r.get(2)?,
        updated_at: r.get(3)?,
        student_id: r.get(4)?,
        student_name: r.get(5)?,
        student_handle: r.get(6)?,
        quiz_id: r.get(7)?,
        quiz_name: r.get(8)?,
        subject_id: r.get(9)?,
        subject_name: r.get(10)?,
        professor_id: r.get(11)?,
        professor_name: r.get(12)?,
    })
}

/// Scores are whole numbers in [0, 100].
pub fn validate_score(raw: f64) -> EngineResult<i64> {
    if !raw.is_finite()
        || raw.fract() != 0.0
        || raw < MIN_SCORE as f64
        || raw > MAX_SCORE as f64
    {
        return Err(EngineError::InvalidScore { score: raw });
    }
    Ok(raw as i64)
}

fn quiz_subject_id(conn: &Connection, quiz_id: &str) -> EngineResult<String> {
    conn.query_row(
        "SELECT subject_id FROM quizzes WHERE id = ?",
        [quiz_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found(EntityKind::Quiz, quiz_id))
}

fn existing_grade_id(conn: &Connection, student_id: &str, quiz_id: &str) -> EngineResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT id FROM grades WHERE student_id = ? AND quiz_id = ?",
            (student_id, quiz_id),
            |r| r.get(0),
        )
        .optional()?)
}

/// Runs the full creation checks and inserts. Caller owns the transaction.
fn insert_grade(
    ctx: &EngineContext<'_>,
    conn: &Connection,
    student_id: &str,
    quiz_id: &str,
    score: i64,
) -> EngineResult<String> {
    integrity::require_role(conn, student_id, Role::Student)?;
    let subject_id = quiz_subject_id(conn, quiz_id)?;
    integrity::require_enrollment(conn, student_id, &subject_id)?;
    integrity::require_unique(
        conn,
        NaturalKey::Grade {
            student_id,
            quiz_id,
        },
        None,
    )?;

    let grade_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO grades(id, student_id, quiz_id, score, created_at) VALUES(?, ?, ?, ?, ?)",
        (&grade_id, student_id, quiz_id, score, ctx.now_text()),
    )
    .map_err(|e| integrity::translate_write_error(e, EntityKind::Grade))?;
    Ok(grade_id)
}

fn overwrite_score(ctx: &EngineContext<'_>, conn: &Connection, grade_id: &str, score: i64) -> EngineResult<()> {
    let changed = conn.execute(
        "UPDATE grades SET score = ?, updated_at = ? WHERE id = ?",
        (score, ctx.now_text(), grade_id),
    )?;
    if changed == 0 {
        return Err(EngineError::not_found(EntityKind::Grade, grade_id));
    }
    Ok(())
}

pub fn create_grade(
    ctx: &EngineContext<'_>,
    student_id: &str,
    quiz_id: &str,
    score: f64,
) -> EngineResult<GradeView> {
    let score = validate_score(score)?;

    let tx = ctx.begin_immediate()?;
    let grade_id = insert_grade(ctx, &tx, student_id, quiz_id, score)?;
    let view = get_grade(&tx, &grade_id)?;
    tx.commit()?;

    tracing::info!(grade_id = %view.id, student_id, quiz_id, score, "grade created");
    Ok(view)
}

pub fn get_grade(conn: &Connection, grade_id: &str) -> EngineResult<GradeView> {
    let sql = format!("{GRADE_VIEW_SELECT} WHERE g.id = ?");
    conn.query_row(&sql, [grade_id], grade_view_from_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found(EntityKind::Grade, grade_id))
}

/// Overwrites the score only. The student/quiz link is fixed at creation and
/// enrollment is not re-checked.
pub fn update_grade(ctx: &EngineContext<'_>, grade_id: &str, score: f64) -> EngineResult<GradeView> {
    let score = validate_score(score)?;

    let tx = ctx.begin_immediate()?;
    overwrite_score(ctx, &tx, grade_id, score)?;
    let view = get_grade(&tx, grade_id)?;
    tx.commit()?;

    tracing::info!(grade_id, score, "grade updated");
    Ok(view)
}

pub fn delete_grade(ctx: &EngineContext<'_>, grade_id: &str) -> EngineResult<()> {
    let tx = ctx.begin_immediate()?;
    let deleted = tx.execute("DELETE FROM grades WHERE id = ?", [grade_id])?;
    if deleted == 0 {
        return Err(EngineError::not_found(EntityKind::Grade, grade_id));
    }
    tx.commit()?;

    tracing::info!(grade_id, "grade deleted");
    Ok(())
}

/// All grades of a quiz ordered by student name, with the mean score.
pub fn list_grades_for_quiz(conn: &Connection, quiz_id: &str) -> EngineResult<QuizGrades> {
    integrity::require_exists(conn, EntityKind::Quiz, quiz_id)?;

    let sql = format!("{GRADE_VIEW_SELECT} WHERE g.quiz_id = ? ORDER BY u.name, u.handle");
    let mut stmt = conn.prepare(&sql)?;
    let grades = stmt
        .query_map([quiz_id], grade_view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let scores: Vec<i64> = grades.iter().map(|g| g.score).collect();
    Ok(QuizGrades {
        quiz_id: quiz_id.to_string(),
        count: grades.len(),
        average: stats::average(&scores),
        grades,
    })
}

fn upsert_one(ctx: &EngineContext<'_>, quiz_id: &str, entry: &BulkEntry) -> EngineResult<BulkOutcome> {
    let score = validate_score(entry.score)?;

    let tx = ctx.begin_immediate()?;
    let outcome = match existing_grade_id(&tx, &entry.student_id, quiz_id)? {
        Some(grade_id) => {
            overwrite_score(ctx, &tx, &grade_id, score)?;
            BulkOutcome::Updated { grade_id }
        }
        None => {
            let grade_id = insert_grade(ctx, &tx, &entry.student_id, quiz_id, score)?;
            BulkOutcome::Created { grade_id }
        }
    };
    tx.commit()?;
    Ok(outcome)
}

/// Grades many students against one quiz. Each entry is applied in its own
/// transaction; a rejected entry does not undo or block the others.
pub fn bulk_upsert_for_quiz(ctx: &EngineContext<'_>, quiz_id: &str, entries: &[BulkEntry]) -> BulkReport {
    let mut report = BulkReport::default();

    if entries.len() > BULK_UPSERT_MAX_ENTRIES {
        tracing::warn!(
            quiz_id,
            entries = entries.len(),
            max = BULK_UPSERT_MAX_ENTRIES,
            "bulk upsert rejected: too many entries"
        );
        report.rejected = entries.len();
        report.limit_exceeded = true;
        return report;
    }

    for (index, entry) in entries.iter().enumerate() {
        let outcome = match upsert_one(ctx, quiz_id, entry) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(quiz_id, student_id = %entry.student_id, code = e.code(), "bulk entry rejected: {e}");
                BulkOutcome::Rejected {
                    code: e.code().to_string(),
                    message: e.to_string(),
                }
            }
        };
        match outcome {
            BulkOutcome::Created { .. } => report.created += 1,
            BulkOutcome::Updated { .. } => report.updated += 1,
            BulkOutcome::Rejected { .. } => report.rejected += 1,
        }
        report.results.push(BulkItemResult {
            index,
            student_id: entry.student_id.clone(),
            outcome,
        });
    }

    tracing::info!(
        quiz_id,
        created = report.created,
        updated = report.updated,
        rejected = report.rejected,
        "bulk upsert finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{quizzes, subjects, users};
    use crate::context::testing::fixed_clock;
    use crate::db;
    use crate::enrollment;

    struct Seed {
        student: String,
        other_student: String,
        subject: String,
        quiz: String,
    }

    fn seed(ctx: &EngineContext<'_>) -> Seed {
        let p = users::create_user(ctx, "Prof", "prof", Role::Professor, "x").expect("prof");
        let s = users::create_user(ctx, "Zed", "zed", Role::Student, "x").expect("zed");
        let o = users::create_user(ctx, "Amy", "amy", Role::Student, "x").expect("amy");
        let j = subjects::create_subject(ctx, "Algebra", &p.id).expect("subject");
        let q = quizzes::create_quiz(ctx, "Midterm", &j.id).expect("quiz");
        Seed {
            student: s.id,
            other_student: o.id,
            subject: j.id,
            quiz: q.id,
        }
    }

    fn entry(student_id: &str, score: f64) -> BulkEntry {
        BulkEntry {
            student_id: student_id.to_string(),
            score,
        }
    }

    #[test]
    fn score_bounds() {
        assert_eq!(validate_score(0.0).expect("zero"), 0);
        assert_eq!(validate_score(100.0).expect("hundred"), 100);
        for bad in [-1.0, 100.5, 101.0, 85.5, f64::NAN] {
            assert!(matches!(
                validate_score(bad),
                Err(EngineError::InvalidScore { .. })
            ));
        }
    }

    #[test]
    fn grade_requires_enrollment() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);
        let seed = seed(&ctx);

        assert!(matches!(
            create_grade(&ctx, &seed.student, &seed.quiz, 85.0),
            Err(EngineError::NotEnrolled { .. })
        ));

        enrollment::assign(&ctx, &seed.student, &seed.subject).expect("assign");
        let view = create_grade(&ctx, &seed.student, &seed.quiz, 85.0).expect("grade");
        assert_eq!(view.subject_name, "Algebra");
        assert_eq!(view.professor_name, "Prof");
        assert_eq!(view.student_handle, "zed");

        let listed = list_grades_for_quiz(&conn, &seed.quiz).expect("list");
        assert_eq!(listed.count, 1);
        assert_eq!(listed.grades[0].id, view.id);
        assert_eq!(listed.average, 85.0);
    }

    #[test]
    fn one_grade_per_student_per_quiz() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);
        let seed = seed(&ctx);
        enrollment::assign(&ctx, &seed.student, &seed.subject).expect("assign");

        create_grade(&ctx, &seed.student, &seed.quiz, 70.0).expect("first");
        assert!(matches!(
            create_grade(&ctx, &seed.student, &seed.quiz, 75.0),
            Err(EngineError::DuplicateEntity {
                entity: EntityKind::Grade
            })
        ));
    }

    #[test]
    fn update_and_delete_report_missing_grades() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);
        let seed = seed(&ctx);
        enrollment::assign(&ctx, &seed.student, &seed.subject).expect("assign");
        let g = create_grade(&ctx, &seed.student, &seed.quiz, 40.0).expect("grade");

        assert!(matches!(
            update_grade(&ctx, "missing", 50.0),
            Err(EngineError::NotFound { .. })
        ));
        let updated = update_grade(&ctx, &g.id, 95.0).expect("update");
        assert_eq!(updated.score, 95);
        assert!(updated.updated_at.is_some());

        delete_grade(&ctx, &g.id).expect("delete");
        assert!(matches!(
            delete_grade(&ctx, &g.id),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn quiz_listing_orders_by_student_name_and_rounds_mean() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);
        let seed = seed(&ctx);
        enrollment::assign(&ctx, &seed.student, &seed.subject).expect("assign zed");
        enrollment::assign(&ctx, &seed.other_student, &seed.subject).expect("assign amy");

        let empty = list_grades_for_quiz(&conn, &seed.quiz).expect("empty");
        assert_eq!(empty.average, 0.0);

        create_grade(&ctx, &seed.student, &seed.quiz, 67.0).expect("zed");
        create_grade(&ctx, &seed.other_student, &seed.quiz, 70.0).expect("amy");
        let listed = list_grades_for_quiz(&conn, &seed.quiz).expect("list");
        let names: Vec<&str> = listed.grades.iter().map(|g| g.student_name.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Zed"]);
        assert_eq!(listed.average, 68.5);
    }

    #[test]
    fn bulk_upsert_is_idempotent_per_pair() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);
        let seed = seed(&ctx);
        enrollment::assign(&ctx, &seed.student, &seed.subject).expect("assign");

        let first = bulk_upsert_for_quiz(&ctx, &seed.quiz, &[entry(&seed.student, 80.0)]);
        assert_eq!(first.created, 1);
        let second = bulk_upsert_for_quiz(&ctx, &seed.quiz, &[entry(&seed.student, 80.0)]);
        assert_eq!(second.updated, 1);
        assert_eq!(second.created, 0);

        let (n, score): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), MAX(score) FROM grades WHERE student_id = ? AND quiz_id = ?",
                (&seed.student, &seed.quiz),
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .expect("count");
        assert_eq!((n, score), (1, 80));
    }

    #[test]
    fn bulk_upsert_applies_valid_pairs_despite_failures() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);
        let seed = seed(&ctx);
        enrollment::assign(&ctx, &seed.student, &seed.subject).expect("assign");

        let report = bulk_upsert_for_quiz(
            &ctx,
            &seed.quiz,
            &[
                entry(&seed.other_student, 90.0),
                entry(&seed.student, 150.0),
                entry(&seed.student, 88.0),
            ],
        );
        assert_eq!(report.created, 1);
        assert_eq!(report.rejected, 2);
        let codes: Vec<String> = report
            .results
            .iter()
            .map(|r| match &r.outcome {
                BulkOutcome::Rejected { code, .. } => code.clone(),
                BulkOutcome::Created { .. } => "created".into(),
                BulkOutcome::Updated { .. } => "updated".into(),
            })
            .collect();
        assert_eq!(codes, vec!["not_enrolled", "invalid_score", "created"]);

        let json = serde_json::to_value(&report.results[0]).expect("serialize");
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["studentId"], seed.other_student.as_str());
    }

    #[test]
    fn bulk_upsert_rejects_oversized_payloads_before_writing() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);
        let seed = seed(&ctx);
        enrollment::assign(&ctx, &seed.student, &seed.subject).expect("assign");

        let entries = vec![entry(&seed.student, 50.0); BULK_UPSERT_MAX_ENTRIES + 1];
        let report = bulk_upsert_for_quiz(&ctx, &seed.quiz, &entries);
        assert!(report.limit_exceeded);
        assert!(report.results.is_empty());
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM grades", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 0);
    }
}
