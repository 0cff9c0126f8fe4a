//! Testing utilities and mock implementations
//!
//! Mocks for the language model, the audit datastore and module handlers,
//! so the service can be tested without external dependencies.

pub mod mocks;

pub use mocks::*;
