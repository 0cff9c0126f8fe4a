//! Module handler system
//!
//! A module is a named handler that turns one `input_data` object into one
//! JSON output. Handlers are built per request by a factory held in the
//! [`ModuleRegistry`]; each instance owns a [`ModuleContext`] scoped to the
//! requesting tenant.

use crate::datastore::Datastore;
use crate::llm::LlmProvider;
use crate::tabular::TabularEngine;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

pub mod builtin;
pub mod context;
pub mod registry;

pub use context::ModuleContext;
pub use registry::{ModuleDescriptor, ModuleFactory, ModuleRegistry, RegisteredModule};

/// Capability every module variant implements
#[async_trait]
pub trait ModuleHandler: Send {
    /// Shared datastore, audit and tenant helpers
    fn context(&self) -> &ModuleContext;

    fn context_mut(&mut self) -> &mut ModuleContext;

    /// Run the module once against `input`
    ///
    /// Expected negative outcomes come back as domain failures. `Fault` is
    /// reserved for conditions the handler did not anticipate.
    async fn execute(&mut self, input: &Map<String, Value>) -> Result<Value, ModuleError>;
}

/// Outcome of a handler that did not complete
#[derive(Debug, Clone, Error)]
pub enum ModuleError {
    #[error("{0}")]
    MissingInput(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    #[error("{0}")]
    DependencyUnavailable(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Processing(String),
    #[error("{0}")]
    Fault(String),
}

impl ModuleError {
    /// Domain failures are returned to the caller verbatim
    pub fn is_fault(&self) -> bool {
        matches!(self, ModuleError::Fault(_))
    }
}

/// Process-wide collaborators handed to module factories
#[derive(Clone)]
pub struct ModuleServices {
    /// Absent when no provider API key is configured
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Absent when the build carries no tabular engine
    pub tabular: Option<Arc<dyn TabularEngine>>,
    /// Absent when no connection string is configured
    pub datastore: Option<Arc<dyn Datastore>>,
}

impl ModuleServices {
    /// Services built from the LLM section, with nothing external attached
    pub fn from_llm_section(section: &crate::config::LlmSection) -> Self {
        Self {
            llm: None,
            model: section.model.clone(),
            system_prompt: section.system_prompt.clone(),
            max_tokens: section.max_tokens,
            temperature: section.temperature,
            tabular: crate::tabular::default_engine(),
            datastore: None,
        }
    }

    pub fn with_llm(mut self, llm: Option<Arc<dyn LlmProvider>>) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_tabular(mut self, tabular: Option<Arc<dyn TabularEngine>>) -> Self {
        self.tabular = tabular;
        self
    }

    pub fn with_datastore(mut self, datastore: Option<Arc<dyn Datastore>>) -> Self {
        self.datastore = datastore;
        self
    }
}

impl Default for ModuleServices {
    fn default() -> Self {
        Self::from_llm_section(&crate::config::LlmSection::default())
    }
}
