//! Business rules between the handlers and the repositories.
//!
//! Services authorize the actor, enforce state invariants and classify
//! storage failures: not-found and uniqueness signals from the database
//! surface as `NotFound` / `Conflict`, never as a generic internal error.

pub mod article;
pub mod engagement;
pub mod media;
pub mod social;
pub mod taxonomy;
pub mod user;

use uuid::Uuid;

use crate::error::{ErrorMessage, HttpError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("You are not allowed to perform this action")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Classifies a repository error for `entity` (e.g. "Article")
    ///
    /// - `RowNotFound` -> NotFound
    /// - unique violation -> Conflict
    /// - foreign key violation -> NotFound of a referenced row
    /// - anything else -> Internal
    pub fn from_db(err: sqlx::Error, entity: &str) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound(entity.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ServiceError::Conflict(format!("{} already exists", entity))
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                ServiceError::NotFound("Referenced resource".to_string())
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }
}

/// Drops repeated ids, keeping first occurrences in order
pub fn dedup_ids(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut unique: Vec<Uuid> = Vec::new();
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::from_db(err, "Resource")
    }
}

impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => HttpError::not_found(err.to_string()),
            ServiceError::Conflict(message) => HttpError::unique_constraint_violation(message),
            ServiceError::Forbidden => {
                HttpError::forbidden(ErrorMessage::PermissionDenied.to_string())
            }
            ServiceError::Validation(message) => HttpError::bad_request(message),
            ServiceError::Internal(message) => {
                tracing::error!("Internal service error: {}", message);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::StatusCode;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::fmt;

    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Violation {
        Unique,
        ForeignKey,
        Other,
    }

    /// Stand-in for a driver error so classification can be tested without a database
    #[derive(Debug)]
    pub(crate) struct FakeDbError(pub(crate) Violation);

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake database error: {:?}", self.0)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "fake database error"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                Violation::Unique => ErrorKind::UniqueViolation,
                Violation::ForeignKey => ErrorKind::ForeignKeyViolation,
                Violation::Other => ErrorKind::Other,
            }
        }
    }

    pub(crate) fn db_error(violation: Violation) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError(violation)))
    }

    #[test]
    fn unique_violation_is_a_conflict() {
        let err = ServiceError::from_db(db_error(Violation::Unique), "Like");
        assert!(matches!(&err, ServiceError::Conflict(m) if m == "Like already exists"));
    }

    #[test]
    fn row_not_found_is_not_found() {
        let err = ServiceError::from_db(sqlx::Error::RowNotFound, "Article");
        assert!(matches!(&err, ServiceError::NotFound(e) if e == "Article"));
        assert_eq!(err.to_string(), "Article not found");
    }

    #[test]
    fn foreign_key_violation_is_not_found() {
        let err = ServiceError::from_db(db_error(Violation::ForeignKey), "Interest");
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn other_failures_are_internal() {
        let err = ServiceError::from_db(db_error(Violation::Other), "Article");
        assert!(matches!(err, ServiceError::Internal(_)));

        let err = ServiceError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dedup_ids(vec![a, b, a, a, b]), vec![a, b]);
        assert!(dedup_ids(Vec::new()).is_empty());
    }

    #[test]
    fn conflict_and_not_found_map_to_distinct_statuses() {
        let conflict: HttpError = ServiceError::Conflict("Slug already exists".into()).into();
        let missing: HttpError = ServiceError::NotFound("Article".into()).into();

        assert_eq!(conflict.status, StatusCode::CONFLICT);
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_ne!(conflict.message, missing.message);
    }

    #[test]
    fn internal_details_are_hidden_from_clients() {
        let err: HttpError = ServiceError::Internal("connection reset".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, ErrorMessage::ServerError.to_string());

        let err: HttpError = ServiceError::Forbidden.into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err: HttpError = ServiceError::validation("bad input").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
