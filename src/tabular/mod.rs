//! Tabular engine abstraction
//!
//! The data module works on a [`Frame`] (records plus the column union)
//! and asks a [`TabularEngine`] for statistics, dtype inference and
//! missing-value removal. The built-in engine lives behind the `tabular`
//! cargo feature; a build without it has no engine and the data module
//! reports the dependency as unavailable.

mod frame;

#[cfg(feature = "tabular")]
pub mod builtin;

pub use frame::{DType, Frame};

#[cfg(feature = "tabular")]
pub use builtin::BuiltinTabularEngine;

use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Operations a tabular backend provides to the data module
pub trait TabularEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Per-column descriptive statistics, shaped `{column: {stat: value}}`
    fn describe(&self, frame: &Frame) -> Result<Map<String, Value>, TabularError>;

    /// Column name to dtype label
    fn dtypes(&self, frame: &Frame) -> Map<String, Value>;

    /// Copy of `frame` without the records that have any missing value
    fn drop_missing(&self, frame: &Frame) -> Frame;
}

/// Tabular processing errors
#[derive(Debug, Clone, Error)]
pub enum TabularError {
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Computation failed: {0}")]
    Computation(String),
}

/// Engine compiled into this build, if any
pub fn default_engine() -> Option<Arc<dyn TabularEngine>> {
    #[cfg(feature = "tabular")]
    {
        Some(Arc::new(BuiltinTabularEngine::new()))
    }
    #[cfg(not(feature = "tabular"))]
    {
        None
    }
}
