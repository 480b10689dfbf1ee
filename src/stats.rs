//! Read-only rollups over grades, enrollments and the catalog.
//!
//! Every figure is a ratio of integer counts, so rounding is done on the
//! integer numerator: half-up at the target scale, averages to two
//! decimals, percentages to whole numbers. Every ratio with a zero
//! denominator is 0.

use crate::clock::{format_timestamp, month_windows, trailing_window_start};
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::integrity;
use crate::model::{EntityKind, Role};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::Serialize;

pub const PASSING_SCORE: i64 = 70;
pub const RECENT_ACTIVITY_DAYS: i64 = 7;
pub const TOP_SUBJECTS_LIMIT: i64 = 5;

/// `numerator / denominator` rounded half-up to a whole number (so -2.5
/// becomes -2). `denominator` must be positive; 0 yields 0.
pub fn div_half_up(numerator: i64, denominator: i64) -> i64 {
    if denominator <= 0 {
        return 0;
    }
    (2 * numerator + denominator).div_euclid(2 * denominator)
}

/// `numerator / denominator` to two decimals, half-up.
pub fn ratio_2dp(numerator: i64, denominator: i64) -> f64 {
    div_half_up(numerator * 100, denominator) as f64 / 100.0
}

/// Mean of `scores` to two decimals; 0 for an empty slice.
pub fn average(scores: &[i64]) -> f64 {
    let sum: i64 = scores.iter().sum();
    ratio_2dp(sum, scores.len() as i64)
}

/// Whole-number percentage of scores at or above the passing threshold.
pub fn pass_rate(scores: &[i64]) -> i64 {
    let passed = scores.iter().filter(|s| **s >= PASSING_SCORE).count();
    percent(passed as i64, scores.len() as i64)
}

fn percent(part: i64, whole: i64) -> i64 {
    div_half_up(part * 100, whole)
}

/// Month-over-month change in percent. A previous count of 0 reports 0
/// rather than an unbounded increase.
pub fn growth_percent(current: i64, previous: i64) -> i64 {
    div_half_up((current - previous) * 100, previous)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOverview {
    pub total_subjects: i64,
    pub total_enrollments: i64,
    pub total_quizzes: i64,
    pub average_enrollments_per_subject: f64,
    pub average_quizzes_per_subject: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizGradeSummary {
    pub quiz_id: String,
    pub quiz_name: String,
    pub count: usize,
    pub average: f64,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub pass_rate: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGradeEntry {
    pub grade_id: String,
    pub quiz_id: String,
    pub quiz_name: String,
    pub score: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGrades {
    pub subject_id: String,
    pub subject_name: String,
    pub count: usize,
    pub average: f64,
    pub grades: Vec<StudentGradeEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGradeSummary {
    pub student_id: String,
    pub student_name: String,
    pub total_grades: usize,
    pub overall_average: f64,
    pub subjects: Vec<SubjectGrades>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProgress {
    pub student_id: String,
    pub subject_id: String,
    pub total_quizzes: i64,
    pub graded: i64,
    pub pending: i64,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTotals {
    pub total: i64,
    pub admins: i64,
    pub professors: i64,
    pub students: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicStats {
    pub average_grade: f64,
    pub min_grade: i64,
    pub max_grade: i64,
    pub pass_rate: i64,
    pub average_enrollments_per_subject: f64,
    pub average_quizzes_per_subject: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub window_days: i64,
    pub users: i64,
    pub subjects: i64,
    pub quizzes: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSubject {
    pub subject_id: String,
    pub name: String,
    pub professor_name: String,
    pub enrollment_count: i64,
    pub quiz_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemOverview {
    pub generated_at: String,
    pub users: UserTotals,
    pub subjects: i64,
    pub quizzes: i64,
    pub grades: i64,
    pub enrollments: i64,
    pub academic: AcademicStats,
    pub recent_activity: RecentActivity,
    pub top_subjects: Vec<TopSubject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricGrowth {
    pub current: i64,
    pub previous: i64,
    pub growth_percent: i64,
}

impl MetricGrowth {
    pub fn new(current: i64, previous: i64) -> Self {
        Self {
            current,
            previous,
            growth_percent: growth_percent(current, previous),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyGrowth {
    pub previous_month_start: String,
    pub current_month_start: String,
    pub users: MetricGrowth,
    pub subjects: MetricGrowth,
    pub quizzes: MetricGrowth,
    pub enrollments: MetricGrowth,
}

/// Which grades a pass rate is computed over.
#[derive(Debug, Clone, Copy)]
pub enum ScoreScope<'a> {
    All,
    Quiz(&'a str),
    Subject(&'a str),
    Student(&'a str),
}

pub fn load_scores(conn: &Connection, scope: ScoreScope<'_>) -> EngineResult<Vec<i64>> {
    let (sql, bind): (&str, Option<&str>) = match scope {
        ScoreScope::All => ("SELECT score FROM grades", None),
        ScoreScope::Quiz(id) => {
            integrity::require_exists(conn, EntityKind::Quiz, id)?;
            ("SELECT score FROM grades WHERE quiz_id = ?", Some(id))
        }
        ScoreScope::Subject(id) => {
            integrity::require_exists(conn, EntityKind::Subject, id)?;
            (
                "SELECT g.score FROM grades g
                 JOIN quizzes q ON q.id = g.quiz_id
                 WHERE q.subject_id = ?",
                Some(id),
            )
        }
        ScoreScope::Student(id) => {
            integrity::require_exists(conn, EntityKind::User, id)?;
            ("SELECT score FROM grades WHERE student_id = ?", Some(id))
        }
    };
    let bind_values: Vec<Value> = bind
        .map(|id| vec![Value::Text(id.to_string())])
        .unwrap_or_default();
    let mut stmt = conn.prepare(sql)?;
    let scores = stmt
        .query_map(params_from_iter(bind_values), |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(scores)
}

fn count_rows(conn: &Connection, entity: EntityKind) -> EngineResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", entity.table());
    Ok(conn.query_row(&sql, [], |r| r.get(0))?)
}

fn count_created_between(
    conn: &Connection,
    entity: EntityKind,
    from_inclusive: &str,
    to_exclusive: &str,
) -> EngineResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE created_at >= ? AND created_at < ?",
        entity.table()
    );
    Ok(conn.query_row(&sql, (from_inclusive, to_exclusive), |r| r.get(0))?)
}

pub fn subject_overview(conn: &Connection) -> EngineResult<SubjectOverview> {
    let total_subjects = count_rows(conn, EntityKind::Subject)?;
    let total_enrollments = count_rows(conn, EntityKind::Enrollment)?;
    let total_quizzes = count_rows(conn, EntityKind::Quiz)?;
    Ok(SubjectOverview {
        total_subjects,
        total_enrollments,
        total_quizzes,
        average_enrollments_per_subject: ratio_2dp(total_enrollments, total_subjects),
        average_quizzes_per_subject: ratio_2dp(total_quizzes, total_subjects),
    })
}

pub fn quiz_grade_summary(conn: &Connection, quiz_id: &str) -> EngineResult<QuizGradeSummary> {
    let quiz_name: String = conn
        .query_row("SELECT name FROM quizzes WHERE id = ?", [quiz_id], |r| {
            r.get(0)
        })
        .optional()?
        .ok_or_else(|| EngineError::not_found(EntityKind::Quiz, quiz_id))?;
    let scores = load_scores(conn, ScoreScope::Quiz(quiz_id))?;

    Ok(QuizGradeSummary {
        quiz_id: quiz_id.to_string(),
        quiz_name,
        count: scores.len(),
        average: average(&scores),
        min: scores.iter().copied().min(),
        max: scores.iter().copied().max(),
        pass_rate: pass_rate(&scores),
    })
}

pub fn student_grade_summary(conn: &Connection, student_id: &str) -> EngineResult<StudentGradeSummary> {
    let student_name: String = conn
        .query_row("SELECT name FROM users WHERE id = ?", [student_id], |r| {
            r.get(0)
        })
        .optional()?
        .ok_or_else(|| EngineError::not_found(EntityKind::User, student_id))?;

    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, g.id, q.id, q.name, g.score, g.created_at
         FROM grades g
         JOIN quizzes q ON q.id = g.quiz_id
         JOIN subjects s ON s.id = q.subject_id
         WHERE g.student_id = ?
         ORDER BY s.name, s.id, q.created_at, q.rowid",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                StudentGradeEntry {
                    grade_id: r.get(2)?,
                    quiz_id: r.get(3)?,
                    quiz_name: r.get(4)?,
                    score: r.get(5)?,
                    created_at: r.get(6)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut subjects: Vec<SubjectGrades> = Vec::new();
    let mut all_scores: Vec<i64> = Vec::with_capacity(rows.len());
    for (subject_id, subject_name, entry) in rows {
        all_scores.push(entry.score);
        match subjects.last_mut() {
            Some(group) if group.subject_id == subject_id => group.grades.push(entry),
            _ => subjects.push(SubjectGrades {
                subject_id,
                subject_name,
                count: 0,
                average: 0.0,
                grades: vec![entry],
            }),
        }
    }
    for group in &mut subjects {
        let scores: Vec<i64> = group.grades.iter().map(|g| g.score).collect();
        group.count = scores.len();
        group.average = average(&scores);
    }

    Ok(StudentGradeSummary {
        student_id: student_id.to_string(),
        student_name,
        total_grades: all_scores.len(),
        overall_average: average(&all_scores),
        subjects,
    })
}

pub fn student_subject_progress(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
) -> EngineResult<SubjectProgress> {
    integrity::require_enrollment(conn, student_id, subject_id)?;

    let total_quizzes: i64 = conn.query_row(
        "SELECT COUNT(*) FROM quizzes WHERE subject_id = ?",
        [subject_id],
        |r| r.get(0),
    )?;
    let mut stmt = conn.prepare(
        "SELECT g.score
         FROM grades g
         JOIN quizzes q ON q.id = g.quiz_id
         WHERE g.student_id = ? AND q.subject_id = ?",
    )?;
    let scores = stmt
        .query_map((student_id, subject_id), |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let graded = scores.len() as i64;
    Ok(SubjectProgress {
        student_id: student_id.to_string(),
        subject_id: subject_id.to_string(),
        total_quizzes,
        graded,
        pending: (total_quizzes - graded).max(0),
        average: (!scores.is_empty()).then(|| average(&scores)),
    })
}

fn user_totals(conn: &Connection) -> EngineResult<UserTotals> {
    let mut totals = UserTotals {
        total: 0,
        admins: 0,
        professors: 0,
        students: 0,
    };
    let mut stmt = conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, Role>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (role, n) in rows {
        totals.total += n;
        match role {
            Role::Admin => totals.admins = n,
            Role::Professor => totals.professors = n,
            Role::Student => totals.students = n,
        }
    }
    Ok(totals)
}

fn top_subjects(conn: &Connection) -> EngineResult<Vec<TopSubject>> {
    // rowid keeps ties in insertion order.
    let mut stmt = conn.prepare(
        "SELECT
           s.id,
           s.name,
           p.name,
           (SELECT COUNT(*) FROM enrollments e WHERE e.subject_id = s.id) AS enrollment_count,
           (SELECT COUNT(*) FROM quizzes q WHERE q.subject_id = s.id) AS quiz_count
         FROM subjects s
         JOIN users p ON p.id = s.professor_id
         ORDER BY enrollment_count DESC, s.rowid
         LIMIT ?",
    )?;
    let top = stmt
        .query_map([TOP_SUBJECTS_LIMIT], |r| {
            Ok(TopSubject {
                subject_id: r.get(0)?,
                name: r.get(1)?,
                professor_name: r.get(2)?,
                enrollment_count: r.get(3)?,
                quiz_count: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(top)
}

pub fn system_overview(ctx: &EngineContext<'_>) -> EngineResult<SystemOverview> {
    let conn = ctx.conn;
    let now = ctx.clock.now();
    let now_text = format_timestamp(now);
    let window_start = format_timestamp(trailing_window_start(now, RECENT_ACTIVITY_DAYS));

    let overview = subject_overview(conn)?;
    let users = user_totals(conn)?;

    let (grade_count, score_sum, min_grade, max_grade, passed): (i64, i64, i64, i64, i64) = conn
        .query_row(
            "SELECT
               COUNT(*),
               COALESCE(SUM(score), 0),
               COALESCE(MIN(score), 0),
               COALESCE(MAX(score), 0),
               COALESCE(SUM(CASE WHEN score >= ? THEN 1 ELSE 0 END), 0)
             FROM grades",
            [PASSING_SCORE],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )?;

    // Upper bound is inclusive of "now" so rows stamped this instant count.
    let recent = |entity: EntityKind| -> EngineResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE created_at >= ? AND created_at <= ?",
            entity.table()
        );
        Ok(conn.query_row(&sql, (&window_start, &now_text), |r| r.get(0))?)
    };
    let recent_activity = RecentActivity {
        window_days: RECENT_ACTIVITY_DAYS,
        users: recent(EntityKind::User)?,
        subjects: recent(EntityKind::Subject)?,
        quizzes: recent(EntityKind::Quiz)?,
    };

    let top_subjects = top_subjects(conn)?;

    tracing::debug!(grades = grade_count, subjects = overview.total_subjects, "system overview computed");
    Ok(SystemOverview {
        generated_at: now_text,
        users,
        subjects: overview.total_subjects,
        quizzes: overview.total_quizzes,
        grades: grade_count,
        enrollments: overview.total_enrollments,
        academic: AcademicStats {
            average_grade: ratio_2dp(score_sum, grade_count),
            min_grade,
            max_grade,
            pass_rate: percent(passed, grade_count),
            average_enrollments_per_subject: overview.average_enrollments_per_subject,
            average_quizzes_per_subject: overview.average_quizzes_per_subject,
        },
        recent_activity,
        top_subjects,
    })
}

/// New rows in the current calendar month against the previous one (UTC).
pub fn monthly_growth(ctx: &EngineContext<'_>) -> EngineResult<MonthlyGrowth> {
    let w = month_windows(ctx.clock.now());
    let previous_start = format_timestamp(w.previous_start);
    let current_start = format_timestamp(w.current_start);
    let next_start = format_timestamp(w.next_start);

    let metric = |entity: EntityKind| -> EngineResult<MetricGrowth> {
        let current = count_created_between(ctx.conn, entity, &current_start, &next_start)?;
        let previous = count_created_between(ctx.conn, entity, &previous_start, &current_start)?;
        Ok(MetricGrowth::new(current, previous))
    };

    Ok(MonthlyGrowth {
        users: metric(EntityKind::User)?,
        subjects: metric(EntityKind::Subject)?,
        quizzes: metric(EntityKind::Quiz)?,
        enrollments: metric(EntityKind::Enrollment)?,
        previous_month_start: previous_start,
        current_month_start: current_start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{quizzes, subjects, users};
    use crate::clock::FixedClock;
    use crate::context::testing::fixed_clock;
    use crate::db;
    use crate::enrollment;
    use crate::grading;

    #[test]
    fn pass_rate_edges() {
        assert_eq!(pass_rate(&[]), 0);
        assert_eq!(pass_rate(&[69, 70, 100]), 67);
        assert_eq!(pass_rate(&[70]), 100);
        assert_eq!(pass_rate(&[0, 69]), 0);
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(div_half_up(200, 3), 67);
        assert_eq!(div_half_up(5, 2), 3);
        assert_eq!(div_half_up(-5, 2), -2);
        assert_eq!(div_half_up(-7, 2), -3);
        assert_eq!(div_half_up(7, 0), 0);
        assert_eq!(ratio_2dp(85, 1), 85.0);
        assert_eq!(ratio_2dp(1, 3), 0.33);
        assert_eq!(ratio_2dp(2, 3), 0.67);
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[1, 2, 2]), 1.67);
    }

    #[test]
    fn average_rounds_exact_half_cents_up() {
        // 2569 / 40 = 64.225 exactly; a float quotient lands just below.
        let mut scores = vec![64; 39];
        scores.push(73);
        assert_eq!(average(&scores), 64.23);

        // 2 / 8 = 0.25 and 1 / 8 = 0.125 at the third decimal.
        assert_eq!(ratio_2dp(1, 8), 0.13);
        assert_eq!(ratio_2dp(3, 8), 0.38);

        // 1 of 8 passing is 12.5%.
        assert_eq!(pass_rate(&[70, 0, 0, 0, 0, 0, 0, 0]), 13);
        // 3 of 8 is 37.5%.
        assert_eq!(pass_rate(&[70, 80, 90, 0, 0, 0, 0, 0]), 38);
    }

    #[test]
    fn growth_with_empty_previous_month_is_zero() {
        assert_eq!(growth_percent(5, 0), 0);
        assert_eq!(growth_percent(0, 0), 0);
        assert_eq!(growth_percent(6, 4), 50);
        assert_eq!(growth_percent(2, 5), -60);
        assert_eq!(growth_percent(1, 3), -67);
        // +12.5% rounds up, -12.5% rounds toward zero.
        assert_eq!(growth_percent(9, 8), 13);
        assert_eq!(growth_percent(7, 8), -12);
    }

    #[test]
    fn end_to_end_progress_and_quiz_summary() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);

        let p = users::create_user(&ctx, "P", "p", Role::Professor, "x").expect("p");
        let algebra = subjects::create_subject(&ctx, "Algebra", &p.id).expect("algebra");
        let s = users::create_user(&ctx, "S", "s", Role::Student, "x").expect("s");
        enrollment::assign(&ctx, &s.id, &algebra.id).expect("assign");
        let midterm = quizzes::create_quiz(&ctx, "Midterm", &algebra.id).expect("quiz");
        grading::create_grade(&ctx, &s.id, &midterm.id, 85.0).expect("grade");

        let progress = student_subject_progress(&conn, &s.id, &algebra.id).expect("progress");
        assert_eq!(progress.total_quizzes, 1);
        assert_eq!(progress.graded, 1);
        assert_eq!(progress.pending, 0);
        assert_eq!(progress.average, Some(85.0));

        let summary = quiz_grade_summary(&conn, &midterm.id).expect("summary");
        assert_eq!(summary.count, 1);
        assert_eq!(summary.average, 85.0);
        assert_eq!(summary.pass_rate, 100);
    }

    #[test]
    fn progress_requires_enrollment_and_reports_pending() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);

        let p = users::create_user(&ctx, "P", "p", Role::Professor, "x").expect("p");
        let j = subjects::create_subject(&ctx, "Physics", &p.id).expect("subject");
        let s = users::create_user(&ctx, "S", "s", Role::Student, "x").expect("s");
        quizzes::create_quiz(&ctx, "Q1", &j.id).expect("q1");
        quizzes::create_quiz(&ctx, "Q2", &j.id).expect("q2");

        assert!(matches!(
            student_subject_progress(&conn, &s.id, &j.id),
            Err(EngineError::NotEnrolled { .. })
        ));

        enrollment::assign(&ctx, &s.id, &j.id).expect("assign");
        let progress = student_subject_progress(&conn, &s.id, &j.id).expect("progress");
        assert_eq!(
            progress,
            SubjectProgress {
                student_id: s.id.clone(),
                subject_id: j.id.clone(),
                total_quizzes: 2,
                graded: 0,
                pending: 2,
                average: None,
            }
        );
    }

    #[test]
    fn student_summary_groups_by_subject() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);

        let p = users::create_user(&ctx, "P", "p", Role::Professor, "x").expect("p");
        let s = users::create_user(&ctx, "S", "s", Role::Student, "x").expect("s");
        let bio = subjects::create_subject(&ctx, "Biology", &p.id).expect("bio");
        let art = subjects::create_subject(&ctx, "Art", &p.id).expect("art");
        enrollment::assign(&ctx, &s.id, &bio.id).expect("bio");
        enrollment::assign(&ctx, &s.id, &art.id).expect("art");
        let b1 = quizzes::create_quiz(&ctx, "B1", &bio.id).expect("b1");
        let b2 = quizzes::create_quiz(&ctx, "B2", &bio.id).expect("b2");
        let a1 = quizzes::create_quiz(&ctx, "A1", &art.id).expect("a1");
        grading::create_grade(&ctx, &s.id, &b1.id, 60.0).expect("b1");
        grading::create_grade(&ctx, &s.id, &b2.id, 91.0).expect("b2");
        grading::create_grade(&ctx, &s.id, &a1.id, 100.0).expect("a1");

        let summary = student_grade_summary(&conn, &s.id).expect("summary");
        assert_eq!(summary.total_grades, 3);
        assert_eq!(summary.overall_average, 83.67);
        let names: Vec<&str> = summary.subjects.iter().map(|g| g.subject_name.as_str()).collect();
        assert_eq!(names, vec!["Art", "Biology"]);
        assert_eq!(summary.subjects[1].count, 2);
        assert_eq!(summary.subjects[1].average, 75.5);

        assert!(matches!(
            student_grade_summary(&conn, "missing"),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn overview_counts_recent_activity_and_ranks_subjects() {
        let conn = db::open_in_memory().expect("open");
        let old = fixed_clock("2026-04-01T12:00:00Z");
        let now = fixed_clock("2026-05-02T08:00:00Z");

        let old_ctx = EngineContext::new(&conn, &old);
        let p = users::create_user(&old_ctx, "P", "p", Role::Professor, "x").expect("p");
        let first = subjects::create_subject(&old_ctx, "First", &p.id).expect("first");

        let ctx = EngineContext::new(&conn, &now);
        let second = subjects::create_subject(&ctx, "Second", &p.id).expect("second");
        let third = subjects::create_subject(&ctx, "Third", &p.id).expect("third");
        let a = users::create_user(&ctx, "A", "a", Role::Student, "x").expect("a");
        let b = users::create_user(&ctx, "B", "b", Role::Student, "x").expect("b");
        enrollment::assign(&ctx, &a.id, &third.id).expect("a third");
        enrollment::assign(&ctx, &b.id, &third.id).expect("b third");
        enrollment::assign(&ctx, &a.id, &second.id).expect("a second");
        enrollment::assign(&ctx, &b.id, &first.id).expect("b first");
        let q = quizzes::create_quiz(&ctx, "Q", &third.id).expect("q");
        grading::create_grade(&ctx, &a.id, &q.id, 69.0).expect("a");
        grading::create_grade(&ctx, &b.id, &q.id, 100.0).expect("b");

        let o = system_overview(&ctx).expect("overview");
        assert_eq!(o.users.total, 3);
        assert_eq!(o.users.students, 2);
        assert_eq!(o.users.professors, 1);
        assert_eq!(o.subjects, 3);
        assert_eq!(o.enrollments, 4);
        assert_eq!(o.academic.average_grade, 84.5);
        assert_eq!(o.academic.min_grade, 69);
        assert_eq!(o.academic.max_grade, 100);
        assert_eq!(o.academic.pass_rate, 50);
        assert_eq!(o.academic.average_enrollments_per_subject, 1.33);
        assert_eq!(o.recent_activity.users, 2);
        assert_eq!(o.recent_activity.subjects, 2);
        assert_eq!(o.recent_activity.quizzes, 1);

        let ranked: Vec<&str> = o.top_subjects.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(ranked, vec!["Third", "First", "Second"]);
        assert_eq!(o.top_subjects[0].quiz_count, 1);
    }

    #[test]
    fn top_subjects_are_capped_and_ties_keep_insertion_order() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);

        let p = users::create_user(&ctx, "P", "p", Role::Professor, "x").expect("p");
        let a = users::create_user(&ctx, "A", "a", Role::Student, "x").expect("a");
        let b = users::create_user(&ctx, "B", "b", Role::Student, "x").expect("b");
        let mut ids = Vec::new();
        for name in ["S1", "S2", "S3", "S4", "S5", "S6", "S7"] {
            ids.push(subjects::create_subject(&ctx, name, &p.id).expect("subject").id);
        }
        enrollment::assign(&ctx, &a.id, &ids[5]).expect("a S6");
        enrollment::assign(&ctx, &b.id, &ids[5]).expect("b S6");
        enrollment::assign(&ctx, &a.id, &ids[3]).expect("a S4");

        let o = system_overview(&ctx).expect("overview");
        assert_eq!(o.subjects, 7);
        assert_eq!(o.top_subjects.len(), TOP_SUBJECTS_LIMIT as usize);
        let ranked: Vec<&str> = o.top_subjects.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(ranked, vec!["S6", "S4", "S1", "S2", "S3"]);
        let counts: Vec<i64> = o.top_subjects.iter().map(|t| t.enrollment_count).collect();
        assert_eq!(counts, vec![2, 1, 0, 0, 0]);
    }

    #[test]
    fn empty_store_overview_is_all_zero() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);
        let o = system_overview(&ctx).expect("overview");
        assert_eq!(o.academic.average_grade, 0.0);
        assert_eq!(o.academic.pass_rate, 0);
        assert_eq!(o.academic.average_quizzes_per_subject, 0.0);
        assert!(o.top_subjects.is_empty());
    }

    #[test]
    fn monthly_growth_uses_calendar_months() {
        let conn = db::open_in_memory().expect("open");
        let april = fixed_clock("2026-04-30T23:59:59Z");
        let may = fixed_clock("2026-05-01T00:00:00Z");
        let early_may = fixed_clock("2026-05-03T09:00:00Z");

        let april_ctx = EngineContext::new(&conn, &april);
        users::create_user(&april_ctx, "A1", "a1", Role::Student, "x").expect("a1");
        users::create_user(&april_ctx, "A2", "a2", Role::Student, "x").expect("a2");

        let may_ctx = EngineContext::new(&conn, &may);
        for i in 0..3 {
            users::create_user(&may_ctx, "M", &format!("m{i}"), Role::Student, "x").expect("may");
        }
        let p = users::create_user(&may_ctx, "P", "p", Role::Professor, "x").expect("p");
        subjects::create_subject(&may_ctx, "Algebra", &p.id).expect("subject");

        let ctx = EngineContext::new(&conn, &early_may);
        let g = monthly_growth(&ctx).expect("growth");
        assert_eq!(g.current_month_start, "2026-05-01T00:00:00.000Z");
        assert_eq!(g.users, MetricGrowth::new(4, 2));
        assert_eq!(g.users.growth_percent, 100);
        // No subjects last month: reported as 0, not infinite growth.
        assert_eq!(g.subjects.current, 1);
        assert_eq!(g.subjects.growth_percent, 0);
    }

    #[test]
    fn monthly_growth_zero_previous_users() {
        let conn = db::open_in_memory().expect("open");
        let clock = FixedClock(crate::clock::parse_timestamp("2026-07-10T10:00:00Z").expect("ts"));
        let ctx = EngineContext::new(&conn, &clock);
        for i in 0..5 {
            users::create_user(&ctx, "U", &format!("u{i}"), Role::Student, "x").expect("user");
        }
        let g = monthly_growth(&ctx).expect("growth");
        assert_eq!(g.users.current, 5);
        assert_eq!(g.users.previous, 0);
        assert_eq!(g.users.growth_percent, 0);
    }

    #[test]
    fn scoped_scores_feed_pass_rate() {
        let conn = db::open_in_memory().expect("open");
        let clock = fixed_clock("2026-05-02T08:00:00Z");
        let ctx = EngineContext::new(&conn, &clock);
        let p = users::create_user(&ctx, "P", "p", Role::Professor, "x").expect("p");
        let s = users::create_user(&ctx, "S", "s", Role::Student, "x").expect("s");
        let j = subjects::create_subject(&ctx, "Algebra", &p.id).expect("subject");
        enrollment::assign(&ctx, &s.id, &j.id).expect("assign");
        for (name, score) in [("Q1", 69.0), ("Q2", 70.0), ("Q3", 100.0)] {
            let q = quizzes::create_quiz(&ctx, name, &j.id).expect("quiz");
            grading::create_grade(&ctx, &s.id, &q.id, score).expect("grade");
        }

        let scores = load_scores(&conn, ScoreScope::Subject(&j.id)).expect("scores");
        assert_eq!(pass_rate(&scores), 67);
        assert!(matches!(
            load_scores(&conn, ScoreScope::Quiz("missing")),
            Err(EngineError::NotFound { .. })
        ));
    }
}
