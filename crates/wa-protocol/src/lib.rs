//! WhatsApp gateway protocol types.
//!
//! Single source of truth for the HTTP request/response bodies, the error
//! taxonomy surfaced to HTTP callers, the lifecycle events emitted by the
//! external messaging client, and route paths.

pub mod api;
pub mod chat;
pub mod error;
pub mod events;
pub mod routes;

pub use api::{
    ErrorBody, LogoutResponse, QrCodeResponse, SendMessageRequest, SendMessageResponse,
    StartResponse, StatusResponse,
};
pub use chat::{CONTACT_SUFFIX, ChatId};
pub use error::GatewayError;
pub use events::ClientEvent;
pub use routes::Routes;
