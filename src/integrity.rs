//! Precondition checks shared by every mutating operation.
//!
//! Each check only reads. Callers run them inside the same immediate
//! transaction as the write they guard, so a failed check drops the
//! transaction with nothing written.

use crate::error::{EngineError, EngineResult};
use crate::model::{Dependents, EntityKind, Role};
use rusqlite::ffi;
use rusqlite::{Connection, ErrorCode, OptionalExtension};

/// Business-meaningful unique tuple of an entity.
#[derive(Debug, Clone, Copy)]
pub enum NaturalKey<'a> {
    User { handle: &'a str },
    Subject { name: &'a str, professor_id: &'a str },
    Enrollment { student_id: &'a str, subject_id: &'a str },
    Grade { student_id: &'a str, quiz_id: &'a str },
}

impl NaturalKey<'_> {
    pub fn entity(&self) -> EntityKind {
        match self {
            NaturalKey::User { .. } => EntityKind::User,
            NaturalKey::Subject { .. } => EntityKind::Subject,
            NaturalKey::Enrollment { .. } => EntityKind::Enrollment,
            NaturalKey::Grade { .. } => EntityKind::Grade,
        }
    }
}

pub fn user_role(conn: &Connection, user_id: &str) -> EngineResult<Option<Role>> {
    Ok(conn
        .query_row("SELECT role FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?)
}

/// Fails with `RoleMismatch` when the user is missing or holds another role.
pub fn require_role(conn: &Connection, user_id: &str, expected: Role) -> EngineResult<()> {
    let actual = user_role(conn, user_id)?;
    if actual == Some(expected) {
        return Ok(());
    }
    Err(EngineError::RoleMismatch {
        user_id: user_id.to_string(),
        expected,
        actual,
    })
}

pub fn exists(conn: &Connection, entity: EntityKind, id: &str) -> EngineResult<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", entity.table());
    let found: Option<i64> = conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
    Ok(found.is_some())
}

pub fn require_exists(conn: &Connection, entity: EntityKind, id: &str) -> EngineResult<()> {
    if exists(conn, entity, id)? {
        Ok(())
    } else {
        Err(EngineError::not_found(entity, id))
    }
}

/// Fails with `DuplicateEntity` when another row already holds `key`.
/// `except_id` skips the row being updated.
pub fn require_unique(
    conn: &Connection,
    key: NaturalKey<'_>,
    except_id: Option<&str>,
) -> EngineResult<()> {
    let except = except_id.unwrap_or("");
    let found: Option<String> = match key {
        NaturalKey::User { handle } => conn
            .query_row(
                "SELECT id FROM users WHERE handle = ? AND id <> ? LIMIT 1",
                (handle, except),
                |r| r.get(0),
            )
            .optional()?,
        NaturalKey::Subject { name, professor_id } => conn
            .query_row(
                "SELECT id FROM subjects WHERE name = ? AND professor_id = ? AND id <> ? LIMIT 1",
                (name, professor_id, except),
                |r| r.get(0),
            )
            .optional()?,
        NaturalKey::Enrollment {
            student_id,
            subject_id,
        } => conn
            .query_row(
                "SELECT id FROM enrollments WHERE student_id = ? AND subject_id = ? AND id <> ? LIMIT 1",
                (student_id, subject_id, except),
                |r| r.get(0),
            )
            .optional()?,
        NaturalKey::Grade {
            student_id,
            quiz_id,
        } => conn
            .query_row(
                "SELECT id FROM grades WHERE student_id = ? AND quiz_id = ? AND id <> ? LIMIT 1",
                (student_id, quiz_id, except),
                |r| r.get(0),
            )
            .optional()?,
    };

    match found {
        Some(_) => Err(EngineError::DuplicateEntity {
            entity: key.entity(),
        }),
        None => Ok(()),
    }
}

fn dependent_checks(entity: EntityKind) -> &'static [(Dependents, &'static str)] {
    match entity {
        EntityKind::User => &[
            (
                Dependents::Subjects,
                "SELECT 1 FROM subjects WHERE professor_id = ? LIMIT 1",
            ),
            (
                Dependents::Enrollments,
                "SELECT 1 FROM enrollments WHERE student_id = ? LIMIT 1",
            ),
            (
                Dependents::Grades,
                "SELECT 1 FROM grades WHERE student_id = ? LIMIT 1",
            ),
        ],
        EntityKind::Subject => &[
            (
                Dependents::Enrollments,
                "SELECT 1 FROM enrollments WHERE subject_id = ? LIMIT 1",
            ),
            (
                Dependents::Quizzes,
                "SELECT 1 FROM quizzes WHERE subject_id = ? LIMIT 1",
            ),
        ],
        EntityKind::Quiz => &[(
            Dependents::Grades,
            "SELECT 1 FROM grades WHERE quiz_id = ? LIMIT 1",
        )],
        EntityKind::Enrollment | EntityKind::Grade => &[],
    }
}

/// Fails with `HasDependents` naming the first dependent class that would be
/// orphaned by deleting `id`.
pub fn require_no_dependents(conn: &Connection, entity: EntityKind, id: &str) -> EngineResult<()> {
    for (dependents, sql) in dependent_checks(entity) {
        let found: Option<i64> = conn.query_row(sql, [id], |r| r.get(0)).optional()?;
        if found.is_some() {
            return Err(EngineError::HasDependents {
                entity,
                dependents: *dependents,
            });
        }
    }
    Ok(())
}

pub fn is_enrolled(conn: &Connection, student_id: &str, subject_id: &str) -> EngineResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE student_id = ? AND subject_id = ? LIMIT 1",
            (student_id, subject_id),
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn require_enrollment(conn: &Connection, student_id: &str, subject_id: &str) -> EngineResult<()> {
    if is_enrolled(conn, student_id, subject_id)? {
        return Ok(());
    }
    Err(EngineError::NotEnrolled {
        student_id: student_id.to_string(),
        subject_id: subject_id.to_string(),
    })
}

/// The storage UNIQUE constraint is the authoritative guard for natural keys;
/// a violation that slips past `require_unique` surfaces as `DuplicateEntity`.
pub fn translate_write_error(e: rusqlite::Error, entity: EntityKind) -> EngineError {
    if is_unique_violation(&e) {
        return EngineError::DuplicateEntity { entity };
    }
    EngineError::Storage(e)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(f, _) => {
            f.code == ErrorCode::ConstraintViolation
                && (f.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || f.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
