//! Request and response types for the module execution API
//!
//! These are the JSON bodies exchanged on the HTTP surface. They carry no
//! behavior beyond construction helpers and the envelope invariants.

pub mod messages;

pub use messages::*;
