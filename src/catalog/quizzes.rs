use super::non_empty;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::integrity;
use crate::model::{EntityKind, Quiz};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizListing {
    pub id: String,
    pub name: String,
    pub subject_id: String,
    pub created_at: String,
    pub grade_count: i64,
}

fn quiz_from_row(r: &Row<'_>) -> rusqlite::Result<Quiz> {
    Ok(Quiz {
        id: r.get(0)?,
        name: r.get(1)?,
        subject_id: r.get(2)?,
        created_at: r.get(3)?,
    })
}

pub fn create_quiz(ctx: &EngineContext<'_>, name: &str, subject_id: &str) -> EngineResult<Quiz> {
    let name = non_empty("name", name)?;

    let tx = ctx.begin_immediate()?;
    integrity::require_exists(&tx, EntityKind::Subject, subject_id)?;

    let quiz = Quiz {
        id: Uuid::new_v4().to_string(),
        name,
        subject_id: subject_id.to_string(),
        created_at: ctx.now_text(),
    };
    tx.execute(
        "INSERT INTO quizzes(id, name, subject_id, created_at) VALUES(?, ?, ?, ?)",
        (&quiz.id, &quiz.name, &quiz.subject_id, &quiz.created_at),
    )
    .map_err(|e| integrity::translate_write_error(e, EntityKind::Quiz))?;
    tx.commit()?;

    tracing::info!(quiz_id = %quiz.id, subject_id, "quiz created");
    Ok(quiz)
}

pub fn find_quiz(conn: &Connection, quiz_id: &str) -> EngineResult<Option<Quiz>> {
    Ok(conn
        .query_row(
            "SELECT id, name, subject_id, created_at FROM quizzes WHERE id = ?",
            [quiz_id],
            quiz_from_row,
        )
        .optional()?)
}

pub fn get_quiz(conn: &Connection, quiz_id: &str) -> EngineResult<Quiz> {
    find_quiz(conn, quiz_id)?.ok_or_else(|| EngineError::not_found(EntityKind::Quiz, quiz_id))
}

pub fn list_quizzes(conn: &Connection, subject_id: &str) -> EngineResult<Vec<QuizListing>> {
    integrity::require_exists(conn, EntityKind::Subject, subject_id)?;
    let mut stmt = conn.prepare(
        "SELECT
           q.id,
           q.name,
           q.subject_id,
           q.created_at,
           (SELECT COUNT(*) FROM grades g WHERE g.quiz_id = q.id)
         FROM quizzes q
         WHERE q.subject_id = ?
         ORDER BY q.created_at, q.rowid",
    )?;
    let rows = stmt.query_map([subject_id], |r| {
        Ok(QuizListing {
            id: r.get(0)?,
            name: r.get(1)?,
            subject_id: r.get(2)?,
            created_at: r.get(3)?,
            grade_count: r.get(4)?,
        })
    })?;
    let listings = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(listings)
}

pub fn rename_quiz(ctx: &EngineContext<'_>, quiz_id: &str, name: &str) -> EngineResult<Quiz> {
    let name = non_empty("name", name)?;

    let tx = ctx.begin_immediate()?;
    let current = get_quiz(&tx, quiz_id)?;
    tx.execute("UPDATE quizzes SET name = ? WHERE id = ?", (&name, quiz_id))?;
    tx.commit()?;

    tracing::info!(quiz_id, "quiz renamed");
    Ok(Quiz { name, ..current })
}

pub fn delete_quiz(ctx: &EngineContext<'_>, quiz_id: &str) -> EngineResult<()> {
    let tx = ctx.begin_immediate()?;
    integrity::require_exists(&tx, EntityKind::Quiz, quiz_id)?;
    integrity::require_no_dependents(&tx, EntityKind::Quiz, quiz_id)?;
    tx.execute("DELETE FROM quizzes WHERE id = ?", [quiz_id])?;
    tx.commit()?;

    tracing::info!(quiz_id, "quiz deleted");
    Ok(())
}
