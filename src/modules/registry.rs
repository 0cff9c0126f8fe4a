//! Immutable module registry
//!
//! Built once at startup through [`ModuleRegistryBuilder`]; the finished
//! registry has no mutating methods and is shared behind an `Arc`.

use super::{ModuleContext, ModuleError, ModuleHandler, ModuleServices};
use crate::protocol::ModuleInfo;
use serde_json::{Map, Value};
use tracing::warn;

/// Builds a handler bound to one tenant
pub type ModuleFactory = fn(ModuleContext, &ModuleServices) -> Box<dyn ModuleHandler>;

/// Static description of a module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
}

/// Registry entry: descriptor, input schema and handler factory
#[derive(Clone)]
pub struct RegisteredModule {
    descriptor: ModuleDescriptor,
    input_schema: Value,
    factory: ModuleFactory,
}

impl RegisteredModule {
    pub fn new(descriptor: ModuleDescriptor, input_schema: Value, factory: ModuleFactory) -> Self {
        Self {
            descriptor,
            input_schema,
            factory,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Build a handler whose context is scoped to `org_id`
    pub fn instantiate(&self, org_id: &str, services: &ModuleServices) -> Box<dyn ModuleHandler> {
        let context = ModuleContext::new(org_id, services.datastore.clone());
        (self.factory)(context, services)
    }

    /// Check `input` against the module's input schema
    pub fn validate_input(&self, input: &Map<String, Value>) -> Result<(), ModuleError> {
        let validator = jsonschema::validator_for(&self.input_schema)
            .map_err(|e| ModuleError::Fault(format!("Schema compilation error: {e}")))?;

        let instance = Value::Object(input.clone());
        validator.validate(&instance).map_err(|errors| {
            let error_messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            ModuleError::InvalidInput(error_messages.join("; "))
        })
    }

    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            id: self.descriptor.id.clone(),
            name: self.descriptor.name.clone(),
            category: self.descriptor.category.clone(),
            description: self.descriptor.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Read-only mapping from module id to entry, in registration order
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: Vec<RegisteredModule>,
}

impl ModuleRegistry {
    pub fn builder() -> ModuleRegistryBuilder {
        ModuleRegistryBuilder::default()
    }

    /// Registry holding every module shipped with the service
    pub fn with_builtin_modules() -> Self {
        Self::builder()
            .register(super::builtin::nlp_processor::module())
            .register(super::builtin::data_processor::module())
            .build()
    }

    pub fn get(&self, module_id: &str) -> Option<&RegisteredModule> {
        self.modules.iter().find(|m| m.id() == module_id)
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.get(module_id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.id().to_string()).collect()
    }

    pub fn catalog(&self) -> Vec<ModuleInfo> {
        self.modules.iter().map(RegisteredModule::info).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Default)]
pub struct ModuleRegistryBuilder {
    modules: Vec<RegisteredModule>,
}

impl ModuleRegistryBuilder {
    /// Add a module; a second entry with the same id is ignored
    pub fn register(mut self, module: RegisteredModule) -> Self {
        if self.modules.iter().any(|m| m.id() == module.id()) {
            warn!(module_id = %module.id(), "Duplicate module id, keeping first registration");
        } else {
            self.modules.push(module);
        }
        self
    }

    pub fn build(self) -> ModuleRegistry {
        ModuleRegistry {
            modules: self.modules,
        }
    }
}
