use sea_orm::error::{DbErr, SqlErr};
use serde::Serialize;
use uuid::Uuid;

const UNIQUE_VIOLATION_MESSAGE: &str = "a record with the same unique value already exists";

/// Error taxonomy surfaced by every workflow operation.
///
/// Each variant is scoped to a single request: the surrounding transaction is
/// rolled back and nothing is retried inside the engine.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authorization error: {0}")]
    AuthorizationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    ///
    /// Unique-constraint violations are reported as [`ServiceError::Conflict`]
    /// so callers never see storage-engine diagnostics for them.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        let err = error.into_db_err();
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            tracing::debug!(detail = %detail, "Unique constraint violated");
            return ServiceError::Conflict(UNIQUE_VIOLATION_MESSAGE.to_string());
        }
        ServiceError::DatabaseError(err)
    }

    pub fn not_found(entity: &str, id: Uuid) -> Self {
        ServiceError::NotFound(format!("{} {} not found", entity, id))
    }

    /// Stable taxonomy name, suitable for API payloads and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::ValidationError(_) => "validation_error",
            Self::AuthorizationError(_) => "authorization_error",
            Self::Conflict(_) => "conflict",
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::ConfigError(_)
            | Self::InternalError(_) => "internal_error",
        }
    }

    /// Returns the error message suitable for callers.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::ConfigError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// True for errors caused by the request itself rather than the infrastructure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self.kind(), "internal_error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_do_not_leak_diagnostics() {
        let err = ServiceError::db_error("relation \"purchase_orders\" does not exist");
        assert_eq!(err.kind(), "internal_error");
        assert_eq!(err.response_message(), "Database error");
        assert!(!err.is_client_error());
    }

    #[test]
    fn domain_errors_keep_their_message() {
        let err = ServiceError::InvalidState("purchase request is rejected".into());
        assert_eq!(err.kind(), "invalid_state");
        assert_eq!(
            err.response_message(),
            "Invalid state: purchase request is rejected"
        );
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn unique_violations_hide_constraint_text() {
        use sea_orm::{ConnectionTrait, Database, Statement};

        let db = Database::connect("sqlite::memory:").await.expect("sqlite");
        let backend = db.get_database_backend();
        let run = |sql: &str| db.execute(Statement::from_string(backend, sql.to_string()));
        run("CREATE TABLE purchase_orders (po_number TEXT NOT NULL UNIQUE)")
            .await
            .expect("create table");
        run("INSERT INTO purchase_orders VALUES ('PO-000001')")
            .await
            .expect("first insert");
        let raw = run("INSERT INTO purchase_orders VALUES ('PO-000001')")
            .await
            .expect_err("duplicate must fail");

        let err = ServiceError::db_error(raw);
        assert_eq!(err.kind(), "conflict");
        let message = err.response_message();
        assert!(!message.contains("purchase_orders"), "{}", message);
        assert!(!message.contains("UNIQUE"), "{}", message);
    }

    #[test]
    fn not_found_names_entity_and_id() {
        let id = Uuid::nil();
        let err = ServiceError::not_found("Vendor", id);
        assert_eq!(
            err.to_string(),
            format!("Not found: Vendor {} not found", id)
        );
    }
}
