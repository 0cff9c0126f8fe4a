//! Per-request datastore helper shared by every module handler
//!
//! A `ModuleContext` is bound to one tenant when the handler is built. It
//! opens at most one datastore connection, lazily, and gives it back in
//! [`ModuleContext::release`], which the dispatcher calls on every exit
//! path.

use crate::datastore::{Datastore, DatastoreConnection, DatastoreError, ExecutionRecord};
use crate::observability::metrics;
use crate::protocol::ExecutionStatus;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ModuleContext {
    org_id: String,
    datastore: Option<Arc<dyn Datastore>>,
    connection: Option<Box<dyn DatastoreConnection>>,
}

impl ModuleContext {
    pub fn new(org_id: impl Into<String>, datastore: Option<Arc<dyn Datastore>>) -> Self {
        Self {
            org_id: org_id.into(),
            datastore,
            connection: None,
        }
    }

    /// Tenant every operation of this handler instance is scoped to
    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn has_open_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// The handler's connection, opened on first use
    pub async fn connection(&mut self) -> Result<&mut dyn DatastoreConnection, DatastoreError> {
        if self.connection.is_none() {
            let datastore = self
                .datastore
                .as_ref()
                .ok_or(DatastoreError::NotConfigured)?;
            self.connection = Some(datastore.connect().await?);
        }

        match self.connection.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(DatastoreError::NotConfigured),
        }
    }

    /// Append one audit row tagged with this context's tenant
    ///
    /// Best effort: a failed write is logged and counted, never returned.
    pub async fn log_execution(
        &mut self,
        module_id: &str,
        task_id: Option<&str>,
        status: ExecutionStatus,
        output: Option<&Value>,
        error: Option<&str>,
    ) {
        if self.datastore.is_none() {
            debug!(module_id, "No datastore configured, skipping audit log");
            return;
        }

        let record = ExecutionRecord {
            module_id: module_id.to_string(),
            task_id: task_id.map(str::to_string),
            status,
            output: output.map(Value::to_string),
            error: error.map(str::to_string),
            org_id: self.org_id.clone(),
        };

        let result = match self.connection().await {
            Ok(conn) => conn.insert_execution(&record).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                metrics().audit_written();
                debug!(module_id, status = %status, "Audit row written");
            }
            Err(e) => {
                metrics().audit_failed();
                warn!(
                    module_id,
                    org_id = %self.org_id,
                    error = %e,
                    "Failed to write audit log"
                );
            }
        }
    }

    /// True only when row `resource_id` of `table` belongs to this tenant
    ///
    /// Lookup errors and missing rows deny access.
    pub async fn validate_org_access(&mut self, resource_id: &str, table: &str) -> bool {
        let org_id = self.org_id.clone();
        let lookup = match self.connection().await {
            Ok(conn) => conn.fetch_org_id(table, resource_id).await,
            Err(e) => Err(e),
        };

        match lookup {
            Ok(Some(owner)) => owner == org_id,
            Ok(None) => {
                debug!(resource_id, table, "Resource not found, denying access");
                false
            }
            Err(e) => {
                warn!(resource_id, table, error = %e, "Tenant check failed, denying access");
                false
            }
        }
    }

    /// Close the connection if one was opened; safe to call repeatedly
    pub async fn release(&mut self) {
        if let Some(conn) = self.connection.take() {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "Failed to close datastore connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockDatastore;
    use serde_json::json;

    #[tokio::test]
    async fn test_connection_is_lazy_and_reused() {
        let store = Arc::new(MockDatastore::new());
        let mut ctx = ModuleContext::new("org-1", Some(store.clone()));
        assert!(!ctx.has_open_connection());
        assert_eq!(store.connect_count(), 0);

        ctx.connection().await.unwrap();
        ctx.connection().await.unwrap();
        assert!(ctx.has_open_connection());
        assert_eq!(store.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_release_closes_once() {
        let store = Arc::new(MockDatastore::new());
        let mut ctx = ModuleContext::new("org-1", Some(store.clone()));
        ctx.connection().await.unwrap();

        ctx.release().await;
        ctx.release().await;
        assert!(!ctx.has_open_connection());
        assert_eq!(store.close_count(), 1);
    }

    #[tokio::test]
    async fn test_release_without_connection_is_noop() {
        let store = Arc::new(MockDatastore::new());
        let mut ctx = ModuleContext::new("org-1", Some(store.clone()));
        ctx.release().await;
        assert_eq!(store.close_count(), 0);
    }

    #[tokio::test]
    async fn test_log_execution_tags_tenant() {
        let store = Arc::new(MockDatastore::new());
        let mut ctx = ModuleContext::new("org-7", Some(store.clone()));

        ctx.log_execution(
            "nlp_processor",
            Some("task-1"),
            ExecutionStatus::Completed,
            Some(&json!({"ok": true})),
            None,
        )
        .await;

        let rows = store.inserted();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].org_id, "org-7");
        assert_eq!(rows[0].task_id.as_deref(), Some("task-1"));
        assert_eq!(rows[0].output.as_deref(), Some(r#"{"ok":true}"#));
    }

    #[tokio::test]
    async fn test_log_execution_swallows_failures() {
        let store = Arc::new(MockDatastore::failing_inserts());
        let mut ctx = ModuleContext::new("org-1", Some(store.clone()));

        ctx.log_execution("m", None, ExecutionStatus::Failed, None, Some("x"))
            .await;
        assert!(store.inserted().is_empty());
    }

    #[tokio::test]
    async fn test_log_execution_without_datastore_is_skipped() {
        let mut ctx = ModuleContext::new("org-1", None);
        ctx.log_execution("m", None, ExecutionStatus::Completed, None, None)
            .await;
        assert!(!ctx.has_open_connection());
    }

    #[tokio::test]
    async fn test_validate_org_access() {
        let store = Arc::new(MockDatastore::new().with_owner("tasks", "t-1", "org-1"));
        let mut ctx = ModuleContext::new("org-1", Some(store.clone()));

        assert!(ctx.validate_org_access("t-1", "tasks").await);
        assert!(!ctx.validate_org_access("t-missing", "tasks").await);

        let mut other = ModuleContext::new("org-2", Some(store));
        assert!(!other.validate_org_access("t-1", "tasks").await);
    }

    #[tokio::test]
    async fn test_validate_org_access_fails_closed() {
        let mut no_store = ModuleContext::new("org-1", None);
        assert!(!no_store.validate_org_access("t-1", "tasks").await);

        let unreachable = Arc::new(MockDatastore::failing_connect());
        let mut ctx = ModuleContext::new("org-1", Some(unreachable));
        assert!(!ctx.validate_org_access("t-1", "tasks").await);
    }
}
