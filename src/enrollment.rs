use crate::context::{EngineContext, UnenrollPolicy};
use crate::error::{EngineError, EngineResult};
use crate::integrity::{self, NaturalKey};
use crate::model::{Enrollment, EntityKind, Role};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// One subject a student is enrolled in, with its professor and counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEnrollment {
    pub enrollment_id: String,
    pub enrolled_at: String,
    pub subject_id: String,
    pub subject_name: String,
    pub professor_id: String,
    pub professor_name: String,
    pub quiz_count: i64,
    pub student_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledStudent {
    pub enrollment_id: String,
    pub enrolled_at: String,
    pub student_id: String,
    pub name: String,
    pub handle: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Removal {
    pub enrollment_id: String,
    pub purged_grades: usize,
}

pub fn assign(ctx: &EngineContext<'_>, student_id: &str, subject_id: &str) -> EngineResult<Enrollment> {
    let tx = ctx.begin_immediate()?;
    integrity::require_role(&tx, student_id, Role::Student)?;
    integrity::require_exists(&tx, EntityKind::Subject, subject_id)?;
    integrity::require_unique(
        &tx,
        NaturalKey::Enrollment {
            student_id,
            subject_id,
        },
        None,
    )?;

    let enrollment = Enrollment {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        subject_id: subject_id.to_string(),
        created_at: ctx.now_text(),
    };
    tx.execute(
        "INSERT INTO enrollments(id, student_id, subject_id, created_at) VALUES(?, ?, ?, ?)",
        (
            &enrollment.id,
            &enrollment.student_id,
            &enrollment.subject_id,
            &enrollment.created_at,
        ),
    )
    .map_err(|e| integrity::translate_write_error(e, EntityKind::Enrollment))?;
    tx.commit()?;

    tracing::info!(student_id, subject_id, "student enrolled");
    Ok(enrollment)
}

/// Removes an existing enrollment. Under `UnenrollPolicy::Retain` the
/// student's grades in the subject stay readable as history.
pub fn remove(ctx: &EngineContext<'_>, student_id: &str, subject_id: &str) -> EngineResult<Removal> {
    let tx = ctx.begin_immediate()?;
    let enrollment_id: Option<String> = tx
        .query_row(
            "SELECT id FROM enrollments WHERE student_id = ? AND subject_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
            (student_id, subject_id),
            |r| r.get(0),
        )
        .optional()?;
    let Some(enrollment_id) = enrollment_id else {
        return Err(EngineError::not_found(
            EntityKind::Enrollment,
            &format!("{student_id}:{subject_id}"),
        ));
    };

    tx.execute(
        "DELETE FROM enrollments WHERE student_id = ? AND subject_id = ?",
        (student_id, subject_id),
    )?;

    let purged_grades = match ctx.unenroll_policy {
        UnenrollPolicy::Retain => 0,
        UnenrollPolicy::Purge => tx.execute(
            "DELETE FROM grades
             WHERE student_id = ?
               AND quiz_id IN (SELECT id FROM quizzes WHERE subject_id = ?)",
            (student_id, subject_id),
        )?,
    };
    tx.commit()?;

    tracing::info!(student_id, subject_id, purged_grades, "student unenrolled");
    Ok(Removal {
        enrollment_id,
        purged_grades,
    })
}

pub fn list_for_student(conn: &Connection, student_id: &str) -> EngineResult<Vec<StudentEnrollment>> {
    integrity::require_exists(conn, EntityKind::User, student_id)?;

    let mut stmt = conn.prepare(
        "SELECT
           e.id,
           e.created_at,
           s.id,
           s.name,
           p.id,
           p.name,
           (SELECT COUNT(*) FROM quizzes q WHERE q.subject_id = s.id),
           (SELECT COUNT(*) FROM enrollments e2 WHERE e2.subject_id = s.id)
         FROM enrollments e
         JOIN subjects s ON s.id = e.subject_id
         JOIN users p ON p.id = s.professor_id
         WHERE e.student_id = ?
         ORDER BY e.created_at, e.rowid",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(StudentEnrollment {
                enrollment_id: r.get(0)?,
                enrolled_at: r.get(1)?,
                subject_id: r.get(2)?,
                subject_name: r.get(3)?,
                professor_id: r.get(4)?,
                professor_name: r.get(5)?,
                quiz_count: r.get(6)?,
                student_count: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(dedupe_latest_by_subject(rows))
}

/// Read-time safety net behind the UNIQUE(student, subject) constraint:
/// collapses rows sharing a subject to the most recently created one.
/// Input is expected in insertion order, so a later row wins a timestamp tie.
/// Output is ordered by subject name.
pub fn dedupe_latest_by_subject(rows: Vec<StudentEnrollment>) -> Vec<StudentEnrollment> {
    let mut latest: HashMap<String, StudentEnrollment> = HashMap::new();
    for row in rows {
        match latest.get(&row.subject_id) {
            Some(kept) if kept.enrolled_at > row.enrolled_at => {}
            _ => {
                latest.insert(row.subject_id.clone(), row);
            }
        }
    }
    let mut out: Vec<StudentEnrollment> = latest.into_values().collect();
    out.sort_by(|a, b| {
        a.subject_name
            .cmp(&b.subject_name)
            .then_with(|| a.professor_name.cmp(&b.professor_name))
            .then_with(|| a.subject_id.cmp(&b.subject_id))
    });
    out
}

pub fn list_for_subject(conn: &Connection, subject_id: &str) -> EngineResult<Vec<EnrolledStudent>> {
    integrity::require_exists(conn, EntityKind::Subject, subject_id)?;

    let mut stmt = conn.prepare(
        "SELECT e.id, e.created_at, u.id, u.name, u.handle
         FROM enrollments e
         JOIN users u ON u.id = e.student_id
         WHERE e.subject_id = ?
         ORDER BY u.name, u.handle",
    )?;
    let students = stmt
        .query_map([subject_id], |r| {
            Ok(EnrolledStudent {
                enrollment_id: r.get(0)?,
                enrolled_at: r.get(1)?,
                student_id: r.get(2)?,
                name: r.get(3)?,
                handle: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}
