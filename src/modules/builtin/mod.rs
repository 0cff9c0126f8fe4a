//! Modules shipped with the service

pub mod data_processor;
pub mod nlp_processor;

pub use data_processor::DataProcessor;
pub use nlp_processor::NlpProcessor;
