//! HTTP handlers for the session operations.

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, warn};
use wa_bridge::MessagingClient;
use wa_protocol::{
    ErrorBody, GatewayError, LogoutResponse, QrCodeResponse, Routes, SendMessageRequest,
    SendMessageResponse, StartResponse, StatusResponse,
};
use wa_session::WhatsAppSession;

use crate::server::TransportConfig;

/// Shared state for the HTTP handlers.
struct AppState<C> {
    session: Arc<WhatsAppSession<C>>,
}

type SharedState<C> = Arc<AppState<C>>;

/// A [`GatewayError`] rendered as `{ "error": ... }` with its status code.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        match err.reason() {
            Some(reason) => error!("{err} ({reason})"),
            None if err.is_server_error() => error!("{err}"),
            None => debug!("Request rejected: {err}"),
        }

        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::new(err.to_string()))).into_response()
    }
}

/// Build the gateway router around a running session.
pub fn router<C: MessagingClient + 'static>(
    session: Arc<WhatsAppSession<C>>,
    config: &TransportConfig,
) -> Router {
    let state = Arc::new(AppState { session });

    let app = Router::new()
        .route(Routes::START, post(start_handler::<C>))
        .route(Routes::QR_CODE, get(qr_code_handler::<C>))
        .route(Routes::SEND, post(send_handler::<C>))
        .route(Routes::STATUS, get(status_handler::<C>))
        .route(Routes::LOGOUT, post(logout_handler::<C>))
        .route(Routes::HEALTH, get(health_handler::<C>))
        .with_state(state);

    if config.enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn start_handler<C: MessagingClient + 'static>(
    State(state): State<SharedState<C>>,
) -> Result<Json<StartResponse>, ApiError> {
    let outcome = state.session.start().await?;
    Ok(Json(StartResponse {
        success: true,
        message: outcome.message().to_string(),
    }))
}

async fn qr_code_handler<C: MessagingClient + 'static>(
    State(state): State<SharedState<C>>,
) -> Result<Json<QrCodeResponse>, ApiError> {
    let qr_code = state.session.qr_code()?;
    Ok(Json(QrCodeResponse { qr_code }))
}

async fn send_handler<C: MessagingClient + 'static>(
    State(state): State<SharedState<C>>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Malformed send request: {rejection}");
            return Err(GatewayError::MissingFields.into());
        }
    };

    state
        .session
        .send_message(&request.phone, &request.message)
        .await?;

    Ok(Json(SendMessageResponse {
        success: true,
        message: format!("Message sent to {}", request.phone),
    }))
}

async fn status_handler<C: MessagingClient + 'static>(
    State(state): State<SharedState<C>>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        is_connected: state.session.is_connected(),
    })
}

async fn logout_handler<C: MessagingClient + 'static>(
    State(state): State<SharedState<C>>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let outcome = state.session.logout().await?;
    Ok(Json(LogoutResponse {
        success: outcome.success(),
        message: outcome.message().to_string(),
    }))
}

async fn health_handler<C: MessagingClient + 'static>(
    State(state): State<SharedState<C>>,
) -> impl IntoResponse {
    let session = state.session.state();
    Json(json!({
        "status": "ok",
        "isConnected": session.connected(),
        "session": session,
    }))
}
