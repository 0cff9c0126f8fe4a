//! Shared-secret authentication
//!
//! One secret, one header. With no secret configured every request passes;
//! the server logs a warning at startup when it runs that way.

use crate::observability::metrics;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use warp::http::HeaderMap;
use warp::{Filter, Rejection};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid API key")]
    Unauthorized,
}

/// Rejection raised by [`require_api_key`]
#[derive(Debug)]
pub struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

#[derive(Clone)]
pub struct Authenticator {
    expected: Option<String>,
}

impl Authenticator {
    /// An empty secret counts as no secret
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|key| !key.is_empty()),
        }
    }

    /// Authenticator that lets every request through
    pub fn permissive() -> Self {
        Self { expected: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }

    pub fn verify(&self, presented: Option<&str>) -> Result<(), AuthError> {
        let Some(expected) = &self.expected else {
            return Ok(());
        };

        match presented {
            Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(()),
            _ => Err(AuthError::Unauthorized),
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Filter that rejects with [`Unauthorized`] unless `header` carries the secret
pub fn require_api_key(
    auth: Arc<Authenticator>,
    header: Arc<str>,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::headers_cloned()
        .and_then(move |headers: HeaderMap| {
            let auth = auth.clone();
            let header = header.clone();
            async move {
                let presented = headers
                    .get(header.as_ref())
                    .and_then(|value| value.to_str().ok());

                auth.verify(presented).map_err(|_| {
                    metrics().unauthorized_request();
                    debug!(header = %header, present = presented.is_some(), "Rejected credential");
                    warp::reject::custom(Unauthorized)
                })
            }
        })
        .untuple_one()
}
