//! JSON bodies exchanged with the admin frontend.

use serde::{Deserialize, Serialize};

/// Response to `POST /api/whatsup/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    pub success: bool,
    pub message: String,
}

/// Response to `GET /api/whatsup/qrcode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCodeResponse {
    /// `data:image/png;base64,...` URL, ready for an `<img src>`.
    #[serde(rename = "qrCode")]
    pub qr_code: String,
}

/// Body of `POST /api/whatsup/send`.
///
/// Missing fields deserialize as empty strings so that they are reported as
/// a validation failure rather than a JSON rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: String,
}

/// Response to `GET /api/whatsup/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(rename = "isConnected")]
    pub is_connected: bool,
}

/// Response to `POST /api/whatsup/logout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

/// Error body shared by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
