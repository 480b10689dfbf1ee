use super::non_empty;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::integrity::{self, NaturalKey};
use crate::model::{EntityKind, Role, Subject};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub professor_id: Option<String>,
}

/// Subject row joined with its professor and dashboard counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectListing {
    pub id: String,
    pub name: String,
    pub professor_id: String,
    pub professor_name: String,
    pub created_at: String,
    pub quiz_count: i64,
    pub enrollment_count: i64,
}

fn subject_from_row(r: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: r.get(0)?,
        name: r.get(1)?,
        professor_id: r.get(2)?,
        created_at: r.get(3)?,
    })
}

pub fn create_subject(
    ctx: &EngineContext<'_>,
    name: &str,
    professor_id: &str,
) -> EngineResult<Subject> {
    let name = non_empty("name", name)?;

    let tx = ctx.begin_immediate()?;
    integrity::require_role(&tx, professor_id, Role::Professor)?;
    integrity::require_unique(
        &tx,
        NaturalKey::Subject {
            name: &name,
            professor_id,
        },
        None,
    )?;

    let subject = Subject {
        id: Uuid::new_v4().to_string(),
        name,
        professor_id: professor_id.to_string(),
        created_at: ctx.now_text(),
    };
    tx.execute(
        "INSERT INTO subjects(id, name, professor_id, created_at) VALUES(?, ?, ?, ?)",
        (
            &subject.id,
            &subject.name,
            &subject.professor_id,
            &subject.created_at,
        ),
    )
    .map_err(|e| integrity::translate_write_error(e, EntityKind::Subject))?;
    tx.commit()?;

    tracing::info!(subject_id = %subject.id, professor_id, "subject created");
    Ok(subject)
}

pub fn find_subject(conn: &Connection, subject_id: &str) -> EngineResult<Option<Subject>> {
    Ok(conn
        .query_row(
            "SELECT id, name, professor_id, created_at FROM subjects WHERE id = ?",
            [subject_id],
            subject_from_row,
        )
        .optional()?)
}

pub fn get_subject(conn: &Connection, subject_id: &str) -> EngineResult<Subject> {
    find_subject(conn, subject_id)?
        .ok_or_else(|| EngineError::not_found(EntityKind::Subject, subject_id))
}

/// Lists subjects, optionally for one professor. Counts use correlated
/// subqueries so joins cannot double-count.
pub fn list_subjects(
    conn: &Connection,
    professor_id: Option<&str>,
) -> EngineResult<Vec<SubjectListing>> {
    let mut stmt = conn.prepare(
        "SELECT
           s.id,
           s.name,
           s.professor_id,
           u.name,
           s.created_at,
           (SELECT COUNT(*) FROM quizzes q WHERE q.subject_id = s.id),
           (SELECT COUNT(*) FROM enrollments e WHERE e.subject_id = s.id)
         FROM subjects s
         JOIN users u ON u.id = s.professor_id
         WHERE (?1 IS NULL OR s.professor_id = ?1)
         ORDER BY s.name, u.name",
    )?;
    let rows = stmt.query_map([professor_id], |r| {
        Ok(SubjectListing {
            id: r.get(0)?,
            name: r.get(1)?,
            professor_id: r.get(2)?,
            professor_name: r.get(3)?,
            created_at: r.get(4)?,
            quiz_count: r.get(5)?,
            enrollment_count: r.get(6)?,
        })
    })?;
    let listings = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(listings)
}

/// Renames and/or reassigns a subject. The (name, professor) pair is
/// re-checked against the merged values.
pub fn update_subject(
    ctx: &EngineContext<'_>,
    subject_id: &str,
    patch: SubjectPatch,
) -> EngineResult<Subject> {
    let tx = ctx.begin_immediate()?;
    let current = get_subject(&tx, subject_id)?;

    let name = match patch.name.as_deref() {
        Some(n) => non_empty("name", n)?,
        None => current.name.clone(),
    };
    let professor_id = patch
        .professor_id
        .unwrap_or_else(|| current.professor_id.clone());

    if name == current.name && professor_id == current.professor_id {
        return Ok(current);
    }
    if professor_id != current.professor_id {
        integrity::require_role(&tx, &professor_id, Role::Professor)?;
    }
    integrity::require_unique(
        &tx,
        NaturalKey::Subject {
            name: &name,
            professor_id: &professor_id,
        },
        Some(subject_id),
    )?;

    tx.execute(
        "UPDATE subjects SET name = ?, professor_id = ? WHERE id = ?",
        (&name, &professor_id, subject_id),
    )
    .map_err(|e| integrity::translate_write_error(e, EntityKind::Subject))?;
    tx.commit()?;

    tracing::info!(subject_id, "subject updated");
    Ok(Subject {
        name,
        professor_id,
        ..current
    })
}

/// Deletion is blocked, never cascaded, while enrollments or quizzes remain.
pub fn delete_subject(ctx: &EngineContext<'_>, subject_id: &str) -> EngineResult<()> {
    let tx = ctx.begin_immediate()?;
    integrity::require_exists(&tx, EntityKind::Subject, subject_id)?;
    integrity::require_no_dependents(&tx, EntityKind::Subject, subject_id)?;
    tx.execute("DELETE FROM subjects WHERE id = ?", [subject_id])?;
    tx.commit()?;

    tracing::info!(subject_id, "subject deleted");
    Ok(())
}
