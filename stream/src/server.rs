//! HTTP server.
//!
//! Wires the hub into an axum router and runs it until shutdown, closing every
//! session on the way out.

use std::future::Future;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use validator::Validate;

use crate::auth::{register_authentication, AuthenticatedUser};
use crate::config::ServerConfig;
use crate::error::HubError;
use crate::hub::{ws_handler, Hub, HubMetricsSnapshot};
use crate::messages::{Message, NewMessage, UserId};

/// Header carrying the caller identity resolved by the fronting proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Builds the router for a hub.
///
/// # Routes
///
/// - `GET /stream`: WebSocket upgrade
/// - `POST /message`: push a message to the caller's sessions
/// - `GET /health`: session count and metrics
pub fn router(hub: Hub) -> Router {
    Router::new()
        .route("/stream", get(ws_handler))
        .route("/message", post(create_message))
        .route("/health", get(health))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(trusted_identity_header)),
        )
        .with_state(hub)
}

/// Attaches the identity from [`USER_ID_HEADER`], if present and valid.
///
/// The header is trusted as-is; it must only be reachable through a proxy that
/// authenticates callers and overwrites it.
async fn trusted_identity_header(mut request: Request, next: Next) -> Response {
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .and_then(UserId::new);

    if let Some(user_id) = user_id {
        register_authentication(request.extensions_mut(), user_id);
    }

    next.run(request).await
}

/// Pushes a new message to every session of the caller.
async fn create_message(
    State(hub): State<Hub>,
    user: AuthenticatedUser,
    body: Result<Json<NewMessage>, JsonRejection>,
) -> Result<Json<Message>, HubError> {
    let Json(request) = body.map_err(|rejection| HubError::BadRequest(rejection.body_text()))?;
    request.validate()?;

    let message = request.into_message();
    hub.notify(user.user_id, &message).await;

    Ok(Json(message))
}

async fn not_found() -> HubError {
    HubError::NotFound
}

async fn method_not_allowed() -> HubError {
    HubError::MethodNotAllowed
}

/// Health response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    sessions: usize,
    metrics: HubMetricsSnapshot,
}

async fn health(State(hub): State<Hub>) -> Json<HealthResponse> {
    let status = if hub.is_closed() { "closing" } else { "ok" };
    Json(HealthResponse {
        status,
        sessions: hub.session_count().await,
        metrics: hub.metrics().snapshot(),
    })
}

/// The stream server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    hub: Hub,
}

impl Server {
    /// Creates a server for the given hub.
    #[must_use]
    pub fn new(config: ServerConfig, hub: Hub) -> Self {
        Self { config, hub }
    }

    /// Returns the hub served by this server.
    #[must_use]
    pub const fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Binds the configured address and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or serving fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        info!("Herald stream listening on {}", listener.local_addr()?);

        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `signal` resolves, then closes the hub.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let hub = self.hub.clone();
        axum::serve(listener, router(self.hub))
            .with_graceful_shutdown(async move {
                signal.await;
                info!("Shutting down, closing all sessions");
                hub.close().await;
            })
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
