//! Tabular data module: describe, summary and clean over a record list

use crate::modules::{
    ModuleContext, ModuleDescriptor, ModuleError, ModuleHandler, ModuleServices,
    RegisteredModule,
};
use crate::tabular::{Frame, TabularEngine, TabularError};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

pub const MODULE_ID: &str = "data_processor";

/// Number of records echoed by `summary`
const SAMPLE_SIZE: usize = 5;

/// `input_data` accepted by the data module
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct DataInput {
    /// Records to process, one object per row
    ///
    /// Kept untyped so that blank values (`{}`, `""`, `0`, `false`) read as
    /// "no data" instead of a type error.
    #[serde(default)]
    pub data: Option<Value>,
    /// `describe` (default), `summary` or `clean`
    #[serde(default)]
    pub operation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOperation {
    Describe,
    Summary,
    Clean,
}

impl DataOperation {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "describe" => Some(DataOperation::Describe),
            "summary" => Some(DataOperation::Summary),
            "clean" => Some(DataOperation::Clean),
            _ => None,
        }
    }
}

pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor {
        id: MODULE_ID.to_string(),
        name: "Data Transformation Agent".to_string(),
        category: "data-processing".to_string(),
        description: "Describes, summarizes and cleans tabular records".to_string(),
    }
}

pub fn module() -> RegisteredModule {
    let schema = serde_json::to_value(schemars::schema_for!(DataInput))
        .unwrap_or_else(|_| json!({"type": "object"}));
    RegisteredModule::new(descriptor(), schema, build)
}

fn build(context: ModuleContext, services: &ModuleServices) -> Box<dyn ModuleHandler> {
    Box::new(DataProcessor::new(context, services))
}

pub struct DataProcessor {
    context: ModuleContext,
    engine: Option<Arc<dyn TabularEngine>>,
}

impl DataProcessor {
    pub fn new(context: ModuleContext, services: &ModuleServices) -> Self {
        Self {
            context,
            engine: services.tabular.clone(),
        }
    }

    fn describe(engine: &dyn TabularEngine, frame: &Frame) -> Result<Value, TabularError> {
        let statistics = engine.describe(frame)?;
        Ok(json!({
            "success": true,
            "statistics": statistics,
            "row_count": frame.row_count(),
            "column_count": frame.column_count(),
            "columns": frame.columns(),
        }))
    }

    fn summary(engine: &dyn TabularEngine, frame: &Frame) -> Value {
        json!({
            "success": true,
            "row_count": frame.row_count(),
            "column_count": frame.column_count(),
            "columns": frame.columns(),
            "dtypes": engine.dtypes(frame),
            "sample": frame.head(SAMPLE_SIZE),
        })
    }

    fn clean(engine: &dyn TabularEngine, frame: &Frame) -> Value {
        let cleaned = engine.drop_missing(frame);
        let original_rows = frame.row_count();
        let cleaned_rows = cleaned.row_count();
        json!({
            "success": true,
            "cleaned_data": cleaned.head(cleaned_rows),
            "original_rows": original_rows,
            "cleaned_rows": cleaned_rows,
            "rows_removed": original_rows - cleaned_rows,
        })
    }
}

#[async_trait]
impl ModuleHandler for DataProcessor {
    fn context(&self) -> &ModuleContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut ModuleContext {
        &mut self.context
    }

    async fn execute(&mut self, input: &Map<String, Value>) -> Result<Value, ModuleError> {
        let parsed: DataInput = serde_json::from_value(Value::Object(input.clone()))
            .map_err(|e| ModuleError::InvalidInput(e.to_string()))?;

        let records = match parsed.data {
            Some(data) if !is_blank(&data) => parse_records(data)?,
            _ => {
                return Err(ModuleError::MissingInput(
                    "No data provided for processing".to_string(),
                ))
            }
        };

        let operation_name = parsed.operation.unwrap_or_else(|| "describe".to_string());
        let operation = DataOperation::parse(&operation_name)
            .ok_or(ModuleError::UnknownOperation(operation_name))?;

        let engine = self.engine.as_deref().ok_or_else(|| {
            ModuleError::DependencyUnavailable("Tabular engine not available".to_string())
        })?;

        let frame = Frame::from_records(records);
        debug!(
            operation = ?operation,
            rows = frame.row_count(),
            columns = frame.column_count(),
            "Processing tabular data"
        );

        match operation {
            DataOperation::Describe => Self::describe(engine, &frame)
                .map_err(|e| ModuleError::Processing(e.to_string())),
            DataOperation::Summary => Ok(Self::summary(engine, &frame)),
            DataOperation::Clean => Ok(Self::clean(engine, &frame)),
        }
    }
}

/// Values with no content: null, false, zero and empty strings, arrays or objects
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn parse_records(data: Value) -> Result<Vec<Map<String, Value>>, ModuleError> {
    if !data.is_array() {
        return Err(ModuleError::InvalidInput(
            "data must be a list of records".to_string(),
        ));
    }
    serde_json::from_value(data)
        .map_err(|e| ModuleError::InvalidInput(format!("data must be a list of records: {e}")))
}
