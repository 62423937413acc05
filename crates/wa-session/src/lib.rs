//! WhatsApp session wrapper.
//!
//! Mirrors the external client's connection state, renders pairing codes
//! for display, and recovers from disconnects with bounded backoff. All
//! state changes go through one actor task; HTTP handlers talk to it via
//! [`WhatsAppSession`].

pub mod backoff;
pub mod qr;
pub mod session;
pub mod state;

pub use backoff::ReconnectPolicy;
pub use qr::{QrError, qr_data_url};
pub use session::{LogoutOutcome, StartOutcome, WhatsAppSession};
pub use state::{ConnectionState, SessionPhase};
