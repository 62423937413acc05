//! HTTP route paths.

/// Route constants for the gateway's HTTP surface.
pub struct Routes;

impl Routes {
    pub const PREFIX: &str = "/api/whatsup";

    pub const START: &str = "/api/whatsup/start";
    pub const QR_CODE: &str = "/api/whatsup/qrcode";
    pub const SEND: &str = "/api/whatsup/send";
    pub const STATUS: &str = "/api/whatsup/status";
    pub const LOGOUT: &str = "/api/whatsup/logout";

    pub const HEALTH: &str = "/health";
}
