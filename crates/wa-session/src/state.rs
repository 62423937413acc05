//! Connection state mirror.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum SessionPhase {
    /// Not started, logged out, or gave up reconnecting.
    Idle,
    /// The client is starting up.
    Initializing,
    /// A pairing code was issued and is waiting to be scanned.
    AwaitingScan,
    /// The client reported a ready (or authenticated) session.
    Connected,
    /// Waiting out the backoff before reconnect attempt `attempt`.
    Reconnecting { attempt: u32 },
}

impl SessionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// A connection attempt is underway or scheduled.
    pub fn is_initializing(&self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::AwaitingScan | Self::Reconnecting { .. }
        )
    }
}

/// Snapshot of the session as seen by HTTP handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    #[serde(flatten)]
    pub phase: SessionPhase,
    /// Latest pairing code as a `data:image/png;base64,...` URL
    #[serde(skip_serializing)]
    pub last_qr_data_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            last_qr_data_url: None,
            updated_at: Utc::now(),
        }
    }

    pub fn connected(&self) -> bool {
        self.phase.is_connected()
    }

    pub fn initializing(&self) -> bool {
        self.phase.is_initializing()
    }

    pub fn has_qr(&self) -> bool {
        self.last_qr_data_url.is_some()
    }

    pub(crate) fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.updated_at = Utc::now();
    }

    pub(crate) fn clear_qr(&mut self) {
        self.last_qr_data_url = None;
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}
