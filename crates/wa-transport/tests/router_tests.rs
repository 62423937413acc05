//! Router tests: every endpoint driven in-process with `oneshot`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tower::ServiceExt;
use wa_bridge::{BridgeError, ClientEvent, MessagingClient};
use wa_protocol::{ChatId, Routes};
use wa_session::{ReconnectPolicy, WhatsAppSession};
use wa_transport::{TransportConfig, router};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct StubClient {
    sent: Mutex<Vec<(String, String)>>,
    fail_send: AtomicBool,
}

impl MessagingClient for StubClient {
    async fn initialize(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<(), BridgeError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(BridgeError::remote("page crashed"));
        }
        self.sent.lock().push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

struct TestApp {
    app: Router,
    client: Arc<StubClient>,
    events: mpsc::UnboundedSender<ClientEvent>,
    session: Arc<WhatsAppSession<StubClient>>,
}

fn test_app() -> TestApp {
    let client = Arc::new(StubClient::default());
    let (events, events_rx) = mpsc::unbounded_channel();
    let session = Arc::new(WhatsAppSession::spawn(
        client.clone(),
        events_rx,
        ReconnectPolicy::disabled(),
    ));
    let app = router(session.clone(), &TransportConfig::default());
    TestApp {
        app,
        client,
        events,
        session,
    }
}

impl TestApp {
    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.call(request).await
    }

    async fn emit_and_wait(&self, event: ClientEvent, pred: impl Fn(&wa_session::ConnectionState) -> bool) {
        self.events.send(event).unwrap();
        let mut rx = self.session.subscribe();
        timeout(Duration::from_secs(2), async {
            while !pred(&rx.borrow_and_update()) {
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("Timeout waiting for session state");
    }

    async fn connect(&self) {
        self.emit_and_wait(ClientEvent::Ready, |s| s.connected()).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// start / status / qrcode
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_reports_progress() {
    let t = test_app();

    let (status, body) = t.post(Routes::START).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "message": "WhatsApp is starting..." }));

    let (_, body) = t.post(Routes::START).await;
    assert_eq!(body["message"], "WhatsApp connection in progress...");
}

#[tokio::test]
async fn start_when_connected() {
    let t = test_app();
    t.connect().await;

    let (status, body) = t.post(Routes::START).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "WhatsApp is already connected.");
}

#[tokio::test]
async fn status_tracks_connection() {
    let t = test_app();

    let (status, body) = t.get(Routes::STATUS).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "isConnected": false }));

    t.connect().await;
    let (_, body) = t.get(Routes::STATUS).await;
    assert_eq!(body, json!({ "isConnected": true }));
}

#[tokio::test]
async fn qrcode_missing_is_404() {
    let t = test_app();
    let (status, body) = t.get(Routes::QR_CODE).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({ "error": "QR code not available. Call /api/whatsup/start first." })
    );
}

#[tokio::test]
async fn qrcode_returns_data_url() {
    let t = test_app();
    t.post(Routes::START).await;
    t.emit_and_wait(ClientEvent::Qr("XYZ".into()), |s| s.has_qr())
        .await;

    let (status, body) = t.get(Routes::QR_CODE).await;
    assert_eq!(status, StatusCode::OK);
    let qr = body["qrCode"].as_str().unwrap();
    assert!(qr.starts_with("data:image/png;base64,"));
    assert_eq!(qr, wa_session::qr_data_url("XYZ").unwrap());
}

// ─────────────────────────────────────────────────────────────────────────────
// send
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn send_not_connected_is_403() {
    let t = test_app();
    let (status, body) = t
        .post_json(Routes::SEND, json!({ "phone": "21699999999", "message": "hi" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body,
        json!({ "error": "WhatsApp is not connected. Please scan the QR code." })
    );
    assert!(t.client.sent.lock().is_empty());
}

#[tokio::test]
async fn send_missing_fields_is_400() {
    let t = test_app();
    t.connect().await;

    for payload in [
        json!({ "phone": "", "message": "hi" }),
        json!({ "phone": "21699999999" }),
        json!({}),
    ] {
        let (status, body) = t.post_json(Routes::SEND, payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Phone number and message are required." }));
    }
    assert!(t.client.sent.lock().is_empty());
}

#[tokio::test]
async fn send_without_json_body_is_400() {
    let t = test_app();
    t.connect().await;

    let (status, body) = t.post(Routes::SEND).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Phone number and message are required.");
}

#[tokio::test]
async fn send_delivers_to_normalized_chat() {
    let t = test_app();
    t.connect().await;

    let (status, body) = t
        .post_json(Routes::SEND, json!({ "phone": "216 99 999 999", "message": "hello" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": true, "message": "Message sent to 216 99 999 999" })
    );
    assert_eq!(
        *t.client.sent.lock(),
        vec![("21699999999@c.us".to_string(), "hello".to_string())]
    );
}

#[tokio::test]
async fn send_failure_is_500_without_details() {
    let t = test_app();
    t.connect().await;
    t.client.fail_send.store(true, Ordering::SeqCst);

    let (status, body) = t
        .post_json(Routes::SEND, json!({ "phone": "21699999999", "message": "hello" }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to send message." }));
}

// ─────────────────────────────────────────────────────────────────────────────
// logout / health
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn logout_not_connected_reports_failure() {
    let t = test_app();
    let (status, body) = t.post(Routes::LOGOUT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": false, "message": "WhatsApp is not connected." })
    );
}

#[tokio::test]
async fn logout_disconnects() {
    let t = test_app();
    t.connect().await;

    let (status, body) = t.post(Routes::LOGOUT).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = t.get(Routes::STATUS).await;
    assert_eq!(body["isConnected"], false);
}

#[tokio::test]
async fn health_reports_phase() {
    let t = test_app();

    let (status, body) = t.get(Routes::HEALTH).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["isConnected"], false);
    assert_eq!(body["session"]["phase"], "idle");

    t.connect().await;
    let (_, body) = t.get(Routes::HEALTH).await;
    assert_eq!(body["isConnected"], true);
    assert_eq!(body["session"]["phase"], "connected");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let t = test_app();
    let (status, _) = t.get("/api/whatsup/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_layer_answers_preflight() {
    let client = Arc::new(StubClient::default());
    let (_events, events_rx) = mpsc::unbounded_channel();
    let session = Arc::new(WhatsAppSession::spawn(
        client,
        events_rx,
        ReconnectPolicy::disabled(),
    ));
    let config = TransportConfig {
        enable_cors: true,
        ..TransportConfig::default()
    };
    let app = router(session, &config);

    let request = Request::builder()
        .method("OPTIONS")
        .uri(Routes::STATUS)
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(
        response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
    );
}
