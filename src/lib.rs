//! Agent Modules - multi-tenant module dispatch service
//!
//! An HTTP service that runs named processing modules on behalf of tenants.
//! A caller posts an [`ExecutionRequest`] naming a module and a tenant; the
//! [`Dispatcher`] builds a tenant-scoped handler, runs it once, writes an
//! audit row and always answers with a well-formed [`ExecutionResponse`].
//!
//! # Overview
//!
//! - Shared-secret authentication on the mutating and catalog routes
//! - `nlp_processor`: text through a hosted language model, or a
//!   deterministic mock when no provider key is configured
//! - `data_processor`: describe, summary and clean over a record list
//! - Best-effort audit log and fail-closed tenant checks over Postgres
//!
//! # Quick Start
//!
//! ```rust
//! use agent_modules::modules::{ModuleRegistry, ModuleServices};
//! use agent_modules::protocol::ExecutionRequest;
//! use agent_modules::Dispatcher;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let dispatcher = Dispatcher::new(
//!     Arc::new(ModuleRegistry::with_builtin_modules()),
//!     ModuleServices::default(),
//! );
//!
//! let request: ExecutionRequest = serde_json::from_value(json!({
//!     "module_id": "nlp_processor",
//!     "org_id": "org-1",
//!     "input_data": {"text": "hello"}
//! }))
//! .unwrap();
//!
//! let response = tokio::runtime::Runtime::new()
//!     .unwrap()
//!     .block_on(dispatcher.execute(request));
//!
//! assert!(response.is_completed());
//! assert_eq!(response.output.unwrap()["model"], "mock");
//! ```

pub mod api;
pub mod config;
pub mod datastore;
pub mod dispatcher;
pub mod error;
pub mod llm;
pub mod modules;
pub mod observability;
pub mod protocol;
pub mod service;
pub mod tabular;
pub mod testing;

pub use api::{ApiState, Authenticator};
pub use config::*;
pub use dispatcher::Dispatcher;
pub use error::{ServiceError, ServiceResult};
pub use modules::{ModuleError, ModuleHandler, ModuleRegistry, ModuleServices};
pub use protocol::*;
pub use service::Service;
