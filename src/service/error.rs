use axum::http::StatusCode;
use thiserror::Error;

use crate::db::{jobdb, ledgerdb};
use crate::error::HttpError;

/// Error taxonomy for the core engine. Every multi-row mutation is atomic,
/// so a returned error never leaves the job/application/subscription/
/// transaction set partially updated.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl ServiceError {
    /// Map database-layer errors into the taxonomy. Conditional updates
    /// signal state-machine violations through `Error::Protocol` tags.
    pub fn from_db(err: sqlx::Error) -> Self {
        if let sqlx::Error::Protocol(tag) = &err {
            let message = match tag.as_str() {
                jobdb::JOB_NOT_OPEN => Some("Job is not open"),
                jobdb::JOB_NOT_CANCELLED => Some("Job is not paused"),
                jobdb::APPLICATION_NOT_PENDING => Some("Application is no longer pending"),
                jobdb::QUOTA_EXHAUSTED => Some("Posting quota is exhausted"),
                ledgerdb::JOB_NOT_IN_PROGRESS => Some("Job is not in progress"),
                ledgerdb::JOB_HAS_NO_WORKER => Some("Job has no selected worker"),
                _ => None,
            };
            if let Some(message) = message {
                return ServiceError::Conflict(message.to_string());
            }
        }

        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                ServiceError::Upstream(err.to_string())
            }
            _ => ServiceError::Database(err),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::from_db(err)
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(message) => HttpError::bad_request(message),
            ServiceError::Forbidden(message) => HttpError::forbidden(message),
            ServiceError::Conflict(message) => HttpError::conflict(message),
            ServiceError::NotFound(message) => HttpError::not_found(message),
            ServiceError::Upstream(message) => HttpError::bad_gateway(message),
            ServiceError::Database(err) => {
                // Internals stay in the log, not the response body.
                tracing::error!("database error: {}", err);
                HttpError::server_error("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(
            ServiceError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Upstream("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn protocol_tags_become_conflicts() {
        let err = ServiceError::from_db(sqlx::Error::Protocol(jobdb::JOB_NOT_OPEN.into()));
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = ServiceError::from_db(sqlx::Error::Protocol(jobdb::QUOTA_EXHAUSTED.into()));
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = ServiceError::from_db(sqlx::Error::Protocol(ledgerdb::JOB_NOT_IN_PROGRESS.into()));
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn row_not_found_stays_a_database_error() {
        let err = ServiceError::from_db(sqlx::Error::RowNotFound);
        assert!(matches!(err, ServiceError::Database(_)));
    }
}
