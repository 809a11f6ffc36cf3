//! WebSocket upgrade handler.
//!
//! Turns an authenticated upgrade request into a registered [`Session`](super::Session).

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use futures::StreamExt;
use tracing::{debug, warn};

use super::Hub;
use crate::auth::AuthenticatedUser;
use crate::error::HubError;

/// WebSocket upgrade handler.
///
/// Rejects plain HTTP requests with 400 and, once the hub is closed, every
/// request with 503. On success the session is registered and its loops are
/// running before the upgrade callback returns.
///
/// # Errors
///
/// Returns a [`HubError`] rendered as the JSON error envelope.
pub async fn ws_handler(
    State(hub): State<Hub>,
    user: AuthenticatedUser,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, HubError> {
    if hub.is_closed() {
        return Err(HubError::Closed);
    }

    let upgrade = upgrade.map_err(|rejection| {
        hub.metrics().record_upgrade_failure();
        debug!(user_id = %user.user_id, "rejected upgrade: {}", rejection.body_text());
        HubError::Upgrade(rejection.body_text())
    })?;

    let user_id = user.user_id;
    Ok(upgrade
        .on_failed_upgrade(|error: axum::Error| warn!("WebSocket upgrade failed: {}", error))
        .on_upgrade(move |socket| async move {
            let (sink, frames) = socket.split();
            if let Err(e) = hub.connect(user_id, sink, frames).await {
                debug!(user_id = %user_id, "connection refused: {}", e);
            }
        }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::register_authentication;
    use crate::config::HubConfig;
    use crate::error::ErrorBody;
    use crate::messages::UserId;

    fn app(hub: Hub) -> Router {
        Router::new()
            .route("/stream", get(ws_handler))
            .with_state(hub)
    }

    fn authenticated_request() -> Request<Body> {
        let mut request = Request::builder()
            .uri("/stream")
            .body(Body::empty())
            .expect("request");
        register_authentication(
            request.extensions_mut(),
            UserId::new(1).expect("non-zero"),
        );
        request
    }

    async fn error_body(response: Response) -> ErrorBody {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("error envelope")
    }

    #[tokio::test]
    async fn test_plain_request_is_bad_request() {
        let hub = Hub::new(HubConfig::new(Duration::from_secs(4), Duration::from_secs(1))).expect("valid config");

        let response = app(hub.clone())
            .oneshot(authenticated_request())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = error_body(response).await;
        assert_eq!(body.error, "Bad Request");
        assert_eq!(body.error_code, 400);
        assert_eq!(hub.session_count().await, 0);
        assert_eq!(hub.metrics().upgrade_failures(), 1);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let hub = Hub::new(HubConfig::default()).expect("valid config");
        let request = Request::builder()
            .uri("/stream")
            .body(Body::empty())
            .expect("request");

        let response = app(hub).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = error_body(response).await;
        assert_eq!(body.error, "Unauthorized");
    }

    #[tokio::test]
    async fn test_closed_hub_rejects_upgrades() {
        let hub = Hub::new(HubConfig::default()).expect("valid config");
        hub.close().await;

        let response = app(hub.clone())
            .oneshot(authenticated_request())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(hub.metrics().upgrade_failures(), 0);
    }
}
