//! Gateway error taxonomy and the HTTP status class each error maps to.

use thiserror::Error;

/// Errors surfaced by the session operations to HTTP callers.
///
/// Server-side variants carry a `reason` for logs; their `Display` text stays
/// generic so internal details never reach the response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Phone number or message text missing (or the phone has no digits).
    #[error("Phone number and message are required.")]
    MissingFields,

    /// The messaging client has not reported a ready session.
    #[error("WhatsApp is not connected. Please scan the QR code.")]
    NotConnected,

    /// No QR code has been issued since the last reset.
    #[error("QR code not available. Call /api/whatsup/start first.")]
    QrUnavailable,

    #[error("Failed to send message.")]
    SendFailed { reason: String },

    #[error("Failed to log out.")]
    LogoutFailed { reason: String },

    /// The session actor has stopped.
    #[error("WhatsApp session is shutting down.")]
    SessionClosed,
}

impl GatewayError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingFields => 400,
            Self::NotConnected => 403,
            Self::QrUnavailable => 404,
            Self::SendFailed { .. } | Self::LogoutFailed { .. } => 500,
            Self::SessionClosed => 503,
        }
    }

    /// Whether this error is a server-side failure (logged at error level).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Internal failure detail, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::SendFailed { reason } | Self::LogoutFailed { reason } => Some(reason),
            _ => None,
        }
    }
}
