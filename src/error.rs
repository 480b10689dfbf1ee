use crate::model::{Dependents, EntityKind, Role};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("user {user_id} is not a {expected}")]
    RoleMismatch {
        user_id: String,
        expected: Role,
        actual: Option<Role>,
    },

    #[error("{entity} already exists")]
    DuplicateEntity { entity: EntityKind },

    #[error("{entity} not found")]
    NotFound { entity: EntityKind, id: String },

    #[error("student {student_id} is not enrolled in subject {subject_id}")]
    NotEnrolled {
        student_id: String,
        subject_id: String,
    },

    #[error("{entity} still has {dependents}")]
    HasDependents {
        entity: EntityKind,
        dependents: Dependents,
    },

    #[error("score must be a whole number between 0 and 100")]
    InvalidScore { score: f64 },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: EntityKind, id: &str) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::RoleMismatch { .. } => "role_mismatch",
            EngineError::DuplicateEntity { .. } => "duplicate_entity",
            EngineError::NotFound { .. } => "not_found",
            EngineError::NotEnrolled { .. } => "not_enrolled",
            EngineError::HasDependents { .. } => "has_dependents",
            EngineError::InvalidScore { .. } => "invalid_score",
            EngineError::EmptyField { .. } => "bad_params",
            EngineError::Storage(_) => "db_error",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            EngineError::RoleMismatch {
                user_id,
                expected,
                actual,
            } => Some(json!({
                "userId": user_id,
                "expectedRole": expected,
                "actualRole": actual,
            })),
            EngineError::DuplicateEntity { entity } => Some(json!({ "entity": entity.as_str() })),
            EngineError::NotFound { entity, id } => {
                Some(json!({ "entity": entity.as_str(), "id": id }))
            }
            EngineError::NotEnrolled {
                student_id,
                subject_id,
            } => Some(json!({ "studentId": student_id, "subjectId": subject_id })),
            EngineError::HasDependents { entity, dependents } => Some(json!({
                "entity": entity.as_str(),
                "dependents": dependents.as_str(),
            })),
            EngineError::InvalidScore { score } => Some(json!({ "score": score })),
            EngineError::EmptyField { field } => Some(json!({ "field": field })),
            EngineError::Storage(_) => None,
        }
    }
}
