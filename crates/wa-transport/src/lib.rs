//! Gateway HTTP transport
//!
//! Exposes the session operations to the admin frontend:
//! - `POST /api/whatsup/start`, `GET /api/whatsup/qrcode`
//! - `POST /api/whatsup/send`, `GET /api/whatsup/status`
//! - `POST /api/whatsup/logout`, `GET /health`
//!
//! The transport owns no state of its own; every handler forwards to a
//! shared [`WhatsAppSession`](wa_session::WhatsAppSession).

pub mod routes;
pub mod server;

pub use routes::{ApiError, router};
pub use server::{TransportConfig, TransportError, TransportServer};
