//! Module dispatcher
//!
//! Resolves a module id, builds a tenant-scoped handler, runs it once and
//! turns whatever happened into an [`ExecutionResponse`]. Nothing a handler
//! does (domain failure, fault or panic) escapes this boundary, and the
//! handler's datastore connection is released on every path.

use crate::error::sanitize_error_message;
use crate::execution_span;
use crate::modules::{ModuleError, ModuleRegistry, ModuleServices};
use crate::observability::metrics;
use crate::protocol::{new_execution_id, ExecutionRequest, ExecutionResponse, ModuleInfo};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

pub struct Dispatcher {
    registry: Arc<ModuleRegistry>,
    services: ModuleServices,
}

impl Dispatcher {
    pub fn new(registry: Arc<ModuleRegistry>, services: ModuleServices) -> Self {
        Self { registry, services }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn module_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    pub fn catalog(&self) -> Vec<ModuleInfo> {
        self.registry.catalog()
    }

    /// Run one execution request to a terminal envelope
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResponse {
        let execution_id = new_execution_id();
        metrics().execution_received();

        let span = execution_span!(
            execution_id = %execution_id,
            module_id = %request.module_id,
            org_id = %request.org_id
        );

        self.dispatch(execution_id, request).instrument(span).await
    }

    async fn dispatch(&self, execution_id: String, request: ExecutionRequest) -> ExecutionResponse {
        let Some(module) = self.registry.get(&request.module_id) else {
            metrics().unknown_module();
            let available = self.registry.ids();
            warn!(available = ?available, "Unknown module requested");
            return ExecutionResponse::failed(
                execution_id,
                format!(
                    "Unknown module: {}. Available modules: {}",
                    request.module_id,
                    available.join(", ")
                ),
            );
        };

        let started = Instant::now();
        let mut handler = module.instantiate(&request.org_id, &self.services);
        debug!("Handler instantiated");

        let outcome = match module.validate_input(&request.input_data) {
            Ok(()) => AssertUnwindSafe(handler.execute(&request.input_data))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ModuleError::Fault(panic_message(panic.as_ref())))),
            Err(e) => Err(e),
        };

        let response = match outcome {
            Ok(output) => {
                info!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Module execution completed"
                );
                ExecutionResponse::completed(execution_id, output)
            }
            Err(e) if e.is_fault() => {
                metrics().fault();
                let message = sanitize_error_message(&e.to_string());
                error!(error = %message, "Module execution faulted");
                ExecutionResponse::failed(execution_id, message)
            }
            Err(e) => {
                warn!(error = %e, "Module execution failed");
                ExecutionResponse::failed(execution_id, e.to_string())
            }
        };

        let context = handler.context_mut();
        context
            .log_execution(
                module.id(),
                request.task_id.as_deref(),
                response.status,
                response.output.as_ref(),
                response.error.as_deref(),
            )
            .await;
        context.release().await;

        metrics().execution_finished(module.id(), started.elapsed(), response.is_completed());
        response
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("Module panicked: {detail}")
}
