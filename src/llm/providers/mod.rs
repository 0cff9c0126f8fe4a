//! LLM provider implementations
//!
//! Concrete implementations of the `LlmProvider` trait for the hosted
//! completion services the NLP module can talk to.

pub mod anthropic;
pub mod openai;

pub use anthropic::*;
pub use openai::*;
