//! HTTP surface
//!
//! | route           | auth | reply                    |
//! |-----------------|------|--------------------------|
//! | `GET /`         | no   | [`ServiceInfo`]          |
//! | `GET /health`   | no   | [`HealthResponse`]       |
//! | `GET /modules`  | yes  | list of [`ModuleInfo`]   |
//! | `POST /execute` | yes  | [`ExecutionResponse`]    |
//! | `GET /metrics`  | yes  | [`MetricsSnapshot`]      |
//!
//! Every non-2xx reply carries an [`ErrorBody`].
//!
//! [`ModuleInfo`]: crate::protocol::ModuleInfo
//! [`ExecutionResponse`]: crate::protocol::ExecutionResponse
//! [`MetricsSnapshot`]: crate::observability::MetricsSnapshot

use super::auth::{require_api_key, Authenticator, Unauthorized};
use crate::dispatcher::Dispatcher;
use crate::error::{ServiceError, ServiceResult};
use crate::observability::metrics;
use crate::protocol::{ErrorBody, ExecutionRequest, HealthResponse, ServiceInfo};
use crate::request_span;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Instrument};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

pub const SERVICE_NAME: &str = "agent-modules";

/// Largest accepted `POST /execute` body
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Shared state behind every route
#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
    pub auth: Arc<Authenticator>,
    /// Header carrying the credential, e.g. `x-api-key`
    pub auth_header: Arc<str>,
}

impl ApiState {
    pub fn new(dispatcher: Arc<Dispatcher>, auth: Authenticator, auth_header: &str) -> Self {
        Self {
            dispatcher,
            auth: Arc::new(auth),
            auth_header: Arc::from(auth_header.to_ascii_lowercase()),
        }
    }
}

/// All routes with rejection handling applied
pub fn routes(state: ApiState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let auth = require_api_key(state.auth.clone(), state.auth_header.clone());

    let root_state = state.clone();
    let root_route = warp::path::end().and(warp::get()).map(move || {
        warp::reply::json(&ServiceInfo {
            service: SERVICE_NAME.to_string(),
            status: "running".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            modules: root_state.dispatcher.module_ids(),
        })
    });

    let health_state = state.clone();
    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || {
            warp::reply::json(&HealthResponse {
                status: "healthy".to_string(),
                service: SERVICE_NAME.to_string(),
                modules: health_state.dispatcher.module_ids(),
            })
        });

    let modules_state = state.clone();
    let modules_route = warp::path("modules")
        .and(warp::path::end())
        .and(warp::get())
        .and(auth.clone())
        .map(move || warp::reply::json(&modules_state.dispatcher.catalog()));

    let metrics_route = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and(auth.clone())
        .map(|| warp::reply::json(&metrics().get_metrics()));

    let execute_state = state;
    let execute_route = warp::path("execute")
        .and(warp::path::end())
        .and(warp::post())
        .and(auth)
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and_then(move |request: ExecutionRequest| {
            let dispatcher = execute_state.dispatcher.clone();
            async move {
                let span = request_span!(method = "POST", path = "/execute");
                let response = dispatcher.execute(request).instrument(span).await;
                Ok::<_, Infallible>(warp::reply::json(&response))
            }
        });

    root_route
        .or(health_route)
        .or(modules_route)
        .or(metrics_route)
        .or(execute_route)
        .recover(handle_rejection)
}

/// Map rejections onto `{"detail": ...}` bodies
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, detail) = if err.find::<Unauthorized>().is_some() {
        (StatusCode::UNAUTHORIZED, "Invalid API key".to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {e}"))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large".to_string(),
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "Content-Length required".to_string(),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected application/json".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed".to_string(),
        )
    } else {
        tracing::error!(rejection = ?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { detail }),
        status,
    ))
}

/// Bind `addr` and serve until `shutdown` resolves
///
/// Returns the bound address (useful with port 0) and the server future.
pub fn bind(
    state: ApiState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> ServiceResult<(SocketAddr, impl Future<Output = ()>)> {
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| ServiceError::server(format!("Failed to bind {addr}: {e}")))?;
    info!(address = %bound, "HTTP server listening");
    Ok((bound, server))
}

/// Resolves on SIGINT, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
