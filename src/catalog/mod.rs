//! Users, subjects and quizzes. Every mutation runs through the integrity
//! checks inside one immediate transaction.

pub mod quizzes;
pub mod subjects;
pub mod users;

use crate::error::{EngineError, EngineResult};

pub(crate) fn non_empty(field: &'static str, raw: &str) -> EngineResult<String> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(EngineError::EmptyField { field });
    }
    Ok(t.to_string())
}
