//! Lifecycle events emitted by the external messaging client.
//!
//! On the bridge wire each event is one JSON line:
//!   {"event":"qr","data":"<raw pairing payload>"}
//!   {"event":"ready"}
//!   {"event":"authenticated"}
//!   {"event":"auth_failure","data":"<message>"}
//!   {"event":"disconnected","data":"<reason>"}

use serde::{Deserialize, Serialize};

/// A lifecycle notification from the messaging client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A new pairing code was issued (raw payload, not yet rendered).
    Qr(String),
    /// The client finished loading and can send messages.
    Ready,
    /// The session was authenticated (restored or freshly scanned).
    Authenticated,
    /// Authentication was rejected.
    AuthFailure(String),
    /// The session was lost.
    Disconnected(String),
}

impl ClientEvent {
    /// Short event name, as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Qr(_) => "qr",
            Self::Ready => "ready",
            Self::Authenticated => "authenticated",
            Self::AuthFailure(_) => "auth_failure",
            Self::Disconnected(_) => "disconnected",
        }
    }
}
