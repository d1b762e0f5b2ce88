//! HTTP facade.
//!
//! | Route                      | Handler                  |
//! |----------------------------|--------------------------|
//! | `POST /api/generate-proof` | [`proof::generate_proof`] |
//! | `GET /api/check-status`    | [`status::check_status`] |
//! | `GET /api/verifying-key`   | [`keys::verifying_key`]  |
//! | `GET /health`              | liveness                 |
//!
//! The notary role is a separate router, [`notary_app`].

pub mod error;
pub mod keys;
pub mod notary;
pub mod proof;
pub mod state;
pub mod status;

use std::future::Future;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ErrorBody, NotaryApiError};
pub use state::{AppState, NotaryState};

/// Router of the prover service.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/generate-proof", post(proof::generate_proof))
        .route("/api/check-status", get(status::check_status))
        .route("/api/verifying-key", get(keys::verifying_key))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router of the notary role.
pub fn notary_app(state: NotaryState) -> Router {
    Router::new()
        .route("/notary/session", post(notary::session))
        .route("/notary/public-key", get(notary::public_key))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the browser front end at `origin`.
pub fn cors(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Resolves on Ctrl-C or SIGTERM. SIGTERM is registered before this
/// returns, so one delivered before the first poll is not lost.
pub fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(signal) => Some(signal),
        Err(e) => {
            tracing::error!(error = %e, "could not listen for SIGTERM");
            None
        }
    };

    async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match terminate {
                Some(mut signal) => {
                    signal.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }
        tracing::info!("shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_on_sigterm() {
        let shutdown = shutdown_signal();
        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), shutdown)
            .await
            .expect("SIGTERM did not trigger shutdown");
    }
}
