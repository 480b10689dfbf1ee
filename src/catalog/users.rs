use super::non_empty;
use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::integrity::{self, NaturalKey};
use crate::model::{EntityKind, Role, User};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub handle: Option<String>,
    pub role: Option<Role>,
    pub credential: Option<String>,
}

const USER_COLUMNS: &str = "id, name, handle, role, created_at";

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        name: r.get(1)?,
        handle: r.get(2)?,
        role: r.get(3)?,
        created_at: r.get(4)?,
    })
}

// Real password hashing belongs to the auth layer; the store only ever sees
// a digest so the secret is never readable back.
fn credential_digest(credential: &str) -> String {
    format!("{:x}", Sha256::digest(credential.as_bytes()))
}

pub fn create_user(
    ctx: &EngineContext<'_>,
    name: &str,
    handle: &str,
    role: Role,
    credential: &str,
) -> EngineResult<User> {
    let name = non_empty("name", name)?;
    let handle = non_empty("handle", handle)?;

    let tx = ctx.begin_immediate()?;
    integrity::require_unique(&tx, NaturalKey::User { handle: &handle }, None)?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        handle,
        role,
        created_at: ctx.now_text(),
    };
    tx.execute(
        "INSERT INTO users(id, name, handle, role, credential_digest, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &user.id,
            &user.name,
            &user.handle,
            user.role,
            credential_digest(credential),
            &user.created_at,
        ),
    )
    .map_err(|e| integrity::translate_write_error(e, EntityKind::User))?;
    tx.commit()?;

    tracing::info!(user_id = %user.id, role = %user.role, "user created");
    Ok(user)
}

pub fn find_user(conn: &Connection, user_id: &str) -> EngineResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(conn.query_row(&sql, [user_id], user_from_row).optional()?)
}

pub fn get_user(conn: &Connection, user_id: &str) -> EngineResult<User> {
    find_user(conn, user_id)?.ok_or_else(|| EngineError::not_found(EntityKind::User, user_id))
}

pub fn list_users(conn: &Connection, role: Option<Role>) -> EngineResult<Vec<User>> {
    let users = match role {
        Some(role) => {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY name, handle");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([role], user_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY name, handle");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], user_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(users)
}

/// Applies a partial update. A role change is only allowed while the user
/// holds no subjects, enrollments or grades, since those relations are
/// role-gated.
pub fn update_user(ctx: &EngineContext<'_>, user_id: &str, patch: UserPatch) -> EngineResult<User> {
    let tx = ctx.begin_immediate()?;
    let current = get_user(&tx, user_id)?;

    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();

    if let Some(name) = patch.name.as_deref() {
        set_parts.push("name = ?");
        bind_values.push(Value::Text(non_empty("name", name)?));
    }
    if let Some(handle) = patch.handle.as_deref() {
        let handle = non_empty("handle", handle)?;
        integrity::require_unique(&tx, NaturalKey::User { handle: &handle }, Some(user_id))?;
        set_parts.push("handle = ?");
        bind_values.push(Value::Text(handle));
    }
    if let Some(role) = patch.role {
        if role != current.role {
            integrity::require_no_dependents(&tx, EntityKind::User, user_id)?;
            set_parts.push("role = ?");
            bind_values.push(Value::Text(role.as_str().to_string()));
        }
    }
    if let Some(credential) = patch.credential.as_deref() {
        set_parts.push("credential_digest = ?");
        bind_values.push(Value::Text(credential_digest(credential)));
    }

    if set_parts.is_empty() {
        return Ok(current);
    }

    let sql = format!("UPDATE users SET {} WHERE id = ?", set_parts.join(", "));
    bind_values.push(Value::Text(user_id.to_string()));
    tx.execute(&sql, params_from_iter(bind_values))
        .map_err(|e| integrity::translate_write_error(e, EntityKind::User))?;
    let updated = get_user(&tx, user_id)?;
    tx.commit()?;

    tracing::info!(user_id, "user updated");
    Ok(updated)
}

pub fn delete_user(ctx: &EngineContext<'_>, user_id: &str) -> EngineResult<()> {
    let tx = ctx.begin_immediate()?;
    integrity::require_exists(&tx, EntityKind::User, user_id)?;
    integrity::require_no_dependents(&tx, EntityKind::User, user_id)?;
    tx.execute("DELETE FROM users WHERE id = ?", [user_id])?;
    tx.commit()?;

    tracing::info!(user_id, "user deleted");
    Ok(())
}
