//! Execution request/response envelopes and service info bodies

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Inbound request to run one module for one tenant
///
/// # Examples
/// ```
/// use agent_modules::protocol::ExecutionRequest;
/// use serde_json::json;
///
/// let request: ExecutionRequest = serde_json::from_value(json!({
///     "module_id": "nlp_processor",
///     "org_id": "org-1",
///     "input_data": {"text": "hello"}
/// }))
/// .unwrap();
///
/// assert_eq!(request.task_id, None);
/// assert_eq!(request.input_data["text"], "hello");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRequest {
    /// Registry key of the module to run
    pub module_id: String,
    /// Tenant the execution is scoped to
    pub org_id: String,
    /// Caller-side task this execution belongs to
    #[serde(default)]
    pub task_id: Option<String>,
    /// Module-specific input payload
    pub input_data: Map<String, Value>,
}

/// Terminal state of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform response envelope
///
/// `output` is populated only when `status` is `completed`, `error` only
/// when it is `failed`. Build values through [`ExecutionResponse::completed`]
/// and [`ExecutionResponse::failed`] to keep that invariant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResponse {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl ExecutionResponse {
    pub fn completed(execution_id: impl Into<String>, output: Value) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: ExecutionStatus::Completed,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(execution_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: ExecutionStatus::Failed,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}

/// Fresh execution identifier, unique per request
pub fn new_execution_id() -> String {
    format!("exec_{}", Uuid::new_v4().simple())
}

/// Catalog entry returned by `GET /modules`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleInfo {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub input_schema: Value,
}

/// Body of `GET /`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceInfo {
    pub service: String,
    pub status: String,
    pub version: String,
    pub modules: Vec<String>,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub modules: Vec<String>,
}

/// Body of every non-2xx reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub detail: String,
}
