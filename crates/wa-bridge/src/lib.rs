//! Messaging client seam.
//!
//! The gateway never speaks the WhatsApp protocol itself. Session setup,
//! pairing codes and message delivery are owned by an external client; this
//! crate defines the narrow interface the session wrapper needs from it
//! ([`MessagingClient`]) and ships the production implementation,
//! [`NodeBridge`], which drives a `whatsapp-web.js` subprocess.
//!
//! Lifecycle notifications travel the other way as [`ClientEvent`]s on an
//! unbounded channel handed to the client at construction.

pub mod node;

use std::future::Future;

use thiserror::Error;
use wa_protocol::ChatId;

pub use node::{NodeBridge, NodeBridgeConfig};
pub use wa_protocol::ClientEvent;

/// Failures raised by a messaging client.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to spawn bridge process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("bridge process is not running")]
    NotRunning,

    #[error("bridge channel closed")]
    ChannelClosed,

    #[error("bridge error [{code}]: {message}")]
    Remote { code: i32, message: String },
}

impl BridgeError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            code: -1,
            message: message.into(),
        }
    }
}

/// The operations the session wrapper delegates to the external client.
///
/// Implementations push lifecycle events (`qr`, `ready`, `authenticated`,
/// `auth_failure`, `disconnected`) on the event channel they were built with.
pub trait MessagingClient: Send + Sync {
    /// Start (or restart) the client. Resolves once the client has finished
    /// its own startup; pairing and readiness are reported as events.
    fn initialize(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Send a text message to a chat.
    fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// End the authenticated session.
    fn logout(&self) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Release client resources (called once at gateway shutdown).
    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}
