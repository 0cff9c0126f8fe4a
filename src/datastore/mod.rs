//! Audit datastore access
//!
//! The relational store is reached through two small traits so handlers can
//! be exercised without a database: [`Datastore`] opens connections and
//! [`DatastoreConnection`] is the single connection a handler instance owns
//! for the length of one request.

pub mod postgres;

pub use postgres::PgDatastore;

use crate::protocol::ExecutionStatus;
use async_trait::async_trait;
use thiserror::Error;

/// Table receiving one row per resolved execution
pub const AUDIT_TABLE: &str = "module_executions";

/// One audit-log row
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub module_id: String,
    pub task_id: Option<String>,
    pub status: ExecutionStatus,
    /// Handler output serialized as JSON text
    pub output: Option<String>,
    pub error: Option<String>,
    pub org_id: String,
}

/// Connection factory
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Open a new dedicated connection
    async fn connect(&self) -> Result<Box<dyn DatastoreConnection>, DatastoreError>;
}

/// A single open connection owned by one handler instance
#[async_trait]
pub trait DatastoreConnection: Send + Sync {
    /// Append one row to the audit table
    async fn insert_execution(&mut self, record: &ExecutionRecord) -> Result<(), DatastoreError>;

    /// Tenant id stored on row `resource_id` of `table`, if the row exists
    async fn fetch_org_id(
        &mut self,
        table: &str,
        resource_id: &str,
    ) -> Result<Option<String>, DatastoreError>;

    /// Close the connection
    async fn close(self: Box<Self>) -> Result<(), DatastoreError>;
}

/// Datastore errors
#[derive(Debug, Clone, Error)]
pub enum DatastoreError {
    #[error("Datastore not configured")]
    NotConfigured,
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Invalid table name: {0}")]
    InvalidIdentifier(String),
}

impl From<sqlx::Error> for DatastoreError {
    fn from(err: sqlx::Error) -> Self {
        DatastoreError::Query(err.to_string())
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass
pub fn validate_identifier(name: &str) -> Result<(), DatastoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid && name.len() <= 63 {
        Ok(())
    } else {
        Err(DatastoreError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifiers_accepted() {
        assert!(validate_identifier("tasks").is_ok());
        assert!(validate_identifier("_agent_data2").is_ok());
        assert!(validate_identifier(AUDIT_TABLE).is_ok());
    }

    #[test]
    fn test_injection_attempts_rejected() {
        for name in [
            "",
            "tasks; DROP TABLE users",
            "tasks--",
            "public.tasks",
            "2tasks",
            "tasks\"",
            "t a",
        ] {
            assert!(
                matches!(
                    validate_identifier(name),
                    Err(DatastoreError::InvalidIdentifier(_))
                ),
                "accepted {name:?}"
            );
        }
    }

    fn assert_send_sync<T: ?Sized + Send + Sync>() {}

    #[test]
    fn test_connection_objects_can_be_shared_across_tasks() {
        assert_send_sync::<dyn Datastore>();
        assert_send_sync::<dyn DatastoreConnection>();
        assert_send_sync::<Option<Box<dyn DatastoreConnection>>>();
    }

    #[test]
    fn test_overlong_identifier_rejected() {
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }
}
