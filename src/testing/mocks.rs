//! Mock implementations for testing
//!
//! Provides mock LlmProvider, Datastore and module handlers so the
//! dispatcher and HTTP surface can be exercised without a language-model
//! API or a database.

use crate::datastore::{Datastore, DatastoreConnection, DatastoreError, ExecutionRecord};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::modules::{
    ModuleContext, ModuleDescriptor, ModuleError, ModuleHandler, ModuleServices,
    RegisteredModule,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock LLM provider for testing
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Mutex<usize>,
    pub should_fail: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Default::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let content = {
            let mut current = self
                .current_response
                .lock()
                .map_err(|_| LlmError::RequestFailed("mock state poisoned".to_string()))?;
            let response_idx = *current % self.responses.len().max(1);
            *current += 1;
            self.responses
                .get(response_idx)
                .cloned()
                .unwrap_or_else(|| "Mock response".to_string())
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
        })
    }
}

#[derive(Debug, Default)]
struct MockDatastoreState {
    inserted: Vec<ExecutionRecord>,
    owners: HashMap<(String, String), String>,
    connects: usize,
    closes: usize,
}

/// In-memory datastore recording audit rows and connection lifecycle
#[derive(Debug, Default, Clone)]
pub struct MockDatastore {
    state: Arc<Mutex<MockDatastoreState>>,
    fail_connect: bool,
    fail_inserts: bool,
}

impl MockDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections open, but every audit insert errors
    pub fn failing_inserts() -> Self {
        Self {
            fail_inserts: true,
            ..Default::default()
        }
    }

    /// Every connection attempt errors
    pub fn failing_connect() -> Self {
        Self {
            fail_connect: true,
            ..Default::default()
        }
    }

    /// Seed the owning tenant of one resource row
    pub fn with_owner(self, table: &str, resource_id: &str, org_id: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.owners.insert(
                (table.to_string(), resource_id.to_string()),
                org_id.to_string(),
            );
        }
        self
    }

    pub fn inserted(&self) -> Vec<ExecutionRecord> {
        self.state
            .lock()
            .map(|s| s.inserted.clone())
            .unwrap_or_default()
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().map(|s| s.connects).unwrap_or_default()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().map(|s| s.closes).unwrap_or_default()
    }

    /// Connections opened and not yet closed
    pub fn open_connections(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.connects - s.closes)
            .unwrap_or_default()
    }
}

#[async_trait]
impl Datastore for MockDatastore {
    async fn connect(&self) -> Result<Box<dyn DatastoreConnection>, DatastoreError> {
        if self.fail_connect {
            return Err(DatastoreError::Connection(
                "Mock connection failure".to_string(),
            ));
        }
        if let Ok(mut state) = self.state.lock() {
            state.connects += 1;
        }
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
            fail_inserts: self.fail_inserts,
        }))
    }
}

struct MockConnection {
    state: Arc<Mutex<MockDatastoreState>>,
    fail_inserts: bool,
}

#[async_trait]
impl DatastoreConnection for MockConnection {
    async fn insert_execution(&mut self, record: &ExecutionRecord) -> Result<(), DatastoreError> {
        if self.fail_inserts {
            return Err(DatastoreError::Query("Mock insert failure".to_string()));
        }
        if let Ok(mut state) = self.state.lock() {
            state.inserted.push(record.clone());
        }
        Ok(())
    }

    async fn fetch_org_id(
        &mut self,
        table: &str,
        resource_id: &str,
    ) -> Result<Option<String>, DatastoreError> {
        crate::datastore::validate_identifier(table)?;
        Ok(self.state.lock().ok().and_then(|state| {
            state
                .owners
                .get(&(table.to_string(), resource_id.to_string()))
                .cloned()
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), DatastoreError> {
        if let Ok(mut state) = self.state.lock() {
            state.closes += 1;
        }
        Ok(())
    }
}

/// What a [`MockModule`] does once its connection is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Return the input and tenant
    Echo,
    /// Return a domain failure
    DomainFailure,
    /// Return `ModuleError::Fault` with a credential in the message
    Fault,
    /// Panic mid-execution
    Panic,
}

/// Handler that opens its datastore connection before acting
pub struct MockModule {
    context: ModuleContext,
    behavior: MockBehavior,
}

impl MockModule {
    pub fn new(context: ModuleContext, behavior: MockBehavior) -> Self {
        Self { context, behavior }
    }
}

#[async_trait]
impl ModuleHandler for MockModule {
    fn context(&self) -> &ModuleContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut ModuleContext {
        &mut self.context
    }

    async fn execute(&mut self, input: &Map<String, Value>) -> Result<Value, ModuleError> {
        // No datastore configured is fine for the mock
        let _ = self.context.connection().await;

        match self.behavior {
            MockBehavior::Echo => Ok(json!({
                "echo": input,
                "org_id": self.context.org_id(),
            })),
            MockBehavior::DomainFailure => {
                Err(ModuleError::Processing("mock domain failure".to_string()))
            }
            MockBehavior::Fault => Err(ModuleError::Fault(
                "driver exploded: password=hunter2".to_string(),
            )),
            MockBehavior::Panic => panic!("mock handler panic"),
        }
    }
}

/// Registry entry wrapping a [`MockModule`] with the given behavior
pub fn mock_module(id: &str, behavior: MockBehavior) -> RegisteredModule {
    let factory: crate::modules::ModuleFactory = match behavior {
        MockBehavior::Echo => build_echo,
        MockBehavior::DomainFailure => build_domain_failure,
        MockBehavior::Fault => build_fault,
        MockBehavior::Panic => build_panic,
    };

    RegisteredModule::new(
        ModuleDescriptor {
            id: id.to_string(),
            name: format!("Mock {id}"),
            category: "test".to_string(),
            description: "Mock module for tests".to_string(),
        },
        json!({"type": "object"}),
        factory,
    )
}

fn build_echo(ctx: ModuleContext, _: &ModuleServices) -> Box<dyn ModuleHandler> {
    Box::new(MockModule::new(ctx, MockBehavior::Echo))
}

fn build_domain_failure(ctx: ModuleContext, _: &ModuleServices) -> Box<dyn ModuleHandler> {
    Box::new(MockModule::new(ctx, MockBehavior::DomainFailure))
}

fn build_fault(ctx: ModuleContext, _: &ModuleServices) -> Box<dyn ModuleHandler> {
    Box::new(MockModule::new(ctx, MockBehavior::Fault))
}

fn build_panic(ctx: ModuleContext, _: &ModuleServices) -> Box<dyn ModuleHandler> {
    Box::new(MockModule::new(ctx, MockBehavior::Panic))
}

/// Services with a mock datastore attached and no language model
pub fn mock_services(datastore: Arc<MockDatastore>) -> ModuleServices {
    ModuleServices::default().with_datastore(Some(datastore))
}
