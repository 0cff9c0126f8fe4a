//! HTTP API: authentication and routes

pub mod auth;
pub mod server;

pub use auth::{require_api_key, AuthError, Authenticator};
pub use server::{bind, handle_rejection, routes, shutdown_signal, ApiState, SERVICE_NAME};
