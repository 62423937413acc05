//! Session actor and the handle HTTP handlers hold.
//!
//! The actor is the only writer of [`ConnectionState`]. It consumes two
//! queues one message at a time: commands from [`WhatsAppSession`] (and from
//! its own initialize/timer tasks), and lifecycle events from the messaging
//! client. Readers see a `watch` snapshot and never block the actor.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use wa_bridge::{BridgeError, ClientEvent, MessagingClient};
use wa_protocol::{ChatId, GatewayError};

use crate::backoff::ReconnectPolicy;
use crate::qr::qr_data_url;
use crate::state::{ConnectionState, SessionPhase};

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyConnected,
    /// A connection attempt is running or scheduled; nothing was started.
    InProgress,
    /// A new connection attempt was started.
    Starting,
}

impl StartOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::AlreadyConnected => "WhatsApp is already connected.",
            Self::InProgress => "WhatsApp connection in progress...",
            Self::Starting => "WhatsApp is starting...",
        }
    }
}

/// Result of a logout request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    LoggedOut,
    NotConnected,
}

impl LogoutOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::LoggedOut => "WhatsApp logged out successfully.",
            Self::NotConnected => "WhatsApp is not connected.",
        }
    }
}

/// What triggered an initialize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartOrigin {
    Manual,
    Reconnect(u32),
}

enum Command {
    Start {
        reply: oneshot::Sender<StartOutcome>,
    },
    InitializeFinished {
        origin: StartOrigin,
        result: Result<(), BridgeError>,
    },
    ReconnectDue {
        attempt: u32,
    },
    LogoutStarted {
        reply: oneshot::Sender<()>,
    },
    LogoutFinished {
        succeeded: bool,
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running session. Cheap reads, async operations.
///
/// Each instance owns its own actor, so independent sessions (one per test,
/// say) never share state.
pub struct WhatsAppSession<C> {
    client: Arc<C>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl<C: MessagingClient + 'static> WhatsAppSession<C> {
    /// Spawn the session actor. `events` must be the receiving half of the
    /// channel the client publishes its lifecycle events on.
    pub fn spawn(
        client: Arc<C>,
        events: mpsc::UnboundedReceiver<ClientEvent>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::new());

        let actor = SessionActor {
            client: client.clone(),
            policy,
            state: state_tx,
            commands: command_tx.downgrade(),
            origin: StartOrigin::Manual,
            logging_out: false,
        };
        tokio::spawn(actor.run(command_rx, events));

        Self {
            client,
            commands: command_tx,
            state: state_rx,
        }
    }

    /// Begin connecting unless already connected or connecting.
    ///
    /// Returns as soon as the decision is made; the outcome of the connection
    /// itself is only observable through [`state`](Self::state).
    pub async fn start(&self) -> Result<StartOutcome, GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Start { reply })
            .map_err(|_| GatewayError::SessionClosed)?;
        rx.await.map_err(|_| GatewayError::SessionClosed)
    }

    /// The latest pairing code as a data URL.
    pub fn qr_code(&self) -> Result<String, GatewayError> {
        self.state
            .borrow()
            .last_qr_data_url
            .clone()
            .ok_or(GatewayError::QrUnavailable)
    }

    /// Send `text` to `phone`. Returns the chat id the message went to.
    pub async fn send_message(&self, phone: &str, text: &str) -> Result<ChatId, GatewayError> {
        if phone.is_empty() || text.is_empty() {
            return Err(GatewayError::MissingFields);
        }
        let chat_id = ChatId::from_phone(phone).ok_or(GatewayError::MissingFields)?;

        if !self.is_connected() {
            return Err(GatewayError::NotConnected);
        }

        self.client
            .send_message(&chat_id, text)
            .await
            .map_err(|e| GatewayError::SendFailed {
                reason: e.to_string(),
            })?;

        debug!("Message sent to {chat_id}");
        Ok(chat_id)
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected()
    }

    /// End the session. State is cleared only once the client confirms.
    ///
    /// The actor is told before the client is called, so the disconnect the
    /// client reports while logging out does not trigger a reconnect.
    pub async fn logout(&self) -> Result<LogoutOutcome, GatewayError> {
        if !self.is_connected() {
            return Ok(LogoutOutcome::NotConnected);
        }

        self.request(|reply| Command::LogoutStarted { reply }).await?;
        let result = self.client.logout().await;
        let succeeded = result.is_ok();
        self.request(|reply| Command::LogoutFinished { succeeded, reply })
            .await?;

        result.map_err(|e| GatewayError::LogoutFailed {
            reason: e.to_string(),
        })?;
        Ok(LogoutOutcome::LoggedOut)
    }

    /// Send a command to the actor and wait for its acknowledgement.
    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<()>) -> Command,
    ) -> Result<(), GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| GatewayError::SessionClosed)?;
        rx.await.map_err(|_| GatewayError::SessionClosed)
    }

    /// Current state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────────────────────────

struct SessionActor<C> {
    client: Arc<C>,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    /// Weak so that dropping every handle stops the actor
    commands: mpsc::WeakUnboundedSender<Command>,
    /// Origin of the most recent initialize call
    origin: StartOrigin,
    /// A client logout is in flight
    logging_out: bool,
}

impl<C: MessagingClient + 'static> SessionActor<C> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<ClientEvent>,
    ) {
        let mut events_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("Client event channel closed");
                        events_open = false;
                    }
                },
            }
        }

        debug!("Session actor stopped");
    }

    fn phase(&self) -> SessionPhase {
        self.state.borrow().phase
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.set_phase_with(phase, |_| {});
    }

    /// Move to `phase` and apply `modify` as one observable update.
    fn set_phase_with(&self, phase: SessionPhase, modify: impl FnOnce(&mut ConnectionState)) {
        let previous = self.phase();
        if previous != phase {
            info!("Session phase: {previous:?} -> {phase:?}");
        }
        self.state.send_modify(|s| {
            s.set_phase(phase);
            modify(s);
        });
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let outcome = self.handle_start();
                let _ = reply.send(outcome);
            }
            Command::InitializeFinished { origin, result } => {
                self.handle_initialize_finished(origin, result);
            }
            Command::ReconnectDue { attempt } => {
                if self.phase() == (SessionPhase::Reconnecting { attempt }) {
                    self.begin_initialize(StartOrigin::Reconnect(attempt));
                } else {
                    debug!("Dropping stale reconnect timer (attempt {attempt})");
                }
            }
            Command::LogoutStarted { reply } => {
                self.logging_out = true;
                let _ = reply.send(());
            }
            Command::LogoutFinished { succeeded, reply } => {
                self.logging_out = false;
                if succeeded {
                    self.set_phase_with(SessionPhase::Idle, ConnectionState::clear_qr);
                    info!("WhatsApp logged out");
                }
                let _ = reply.send(());
            }
        }
    }

    fn handle_start(&mut self) -> StartOutcome {
        let phase = self.phase();
        if phase.is_connected() {
            return StartOutcome::AlreadyConnected;
        }
        if phase.is_initializing() {
            debug!("Start ignored, session is {phase:?}");
            return StartOutcome::InProgress;
        }
        self.begin_initialize(StartOrigin::Manual);
        StartOutcome::Starting
    }

    /// Mark the session as initializing and run the client's initialize in
    /// the background. The result comes back as `InitializeFinished`.
    fn begin_initialize(&mut self, origin: StartOrigin) {
        let Some(commands) = self.commands.upgrade() else {
            return;
        };

        self.origin = origin;
        self.set_phase(SessionPhase::Initializing);
        if let StartOrigin::Reconnect(attempt) = origin {
            info!(
                "Reconnecting WhatsApp client (attempt {attempt}/{})",
                self.policy.max_attempts
            );
        }

        let client = self.client.clone();
        tokio::spawn(async move {
            let result = client.initialize().await;
            let _ = commands.send(Command::InitializeFinished { origin, result });
        });
    }

    fn handle_initialize_finished(&mut self, origin: StartOrigin, result: Result<(), BridgeError>) {
        let err = match result {
            Ok(()) => {
                debug!("WhatsApp client initialized ({origin:?})");
                return;
            }
            Err(e) => e,
        };

        let in_flight = matches!(
            self.phase(),
            SessionPhase::Initializing | SessionPhase::AwaitingScan
        );
        if origin != self.origin || !in_flight {
            warn!("Ignoring stale initialize failure ({origin:?}): {err}");
            return;
        }

        match origin {
            StartOrigin::Manual => {
                error!("WhatsApp client failed to initialize: {err}");
                self.set_phase(SessionPhase::Idle);
            }
            StartOrigin::Reconnect(attempt) => {
                warn!("Reconnect attempt {attempt} failed: {err}");
                self.schedule_reconnect(attempt + 1);
            }
        }
    }

    fn schedule_reconnect(&mut self, attempt: u32) {
        if !self.policy.allows(attempt) {
            if self.policy.is_enabled() {
                error!(
                    "Giving up on WhatsApp reconnect after {} attempts",
                    self.policy.max_attempts
                );
            } else {
                info!("Auto-reconnect disabled; staying idle");
            }
            self.set_phase(SessionPhase::Idle);
            return;
        }

        let Some(commands) = self.commands.upgrade() else {
            self.set_phase(SessionPhase::Idle);
            return;
        };

        let delay = self.policy.delay_for(attempt);
        info!("Reconnect attempt {attempt} in {delay:?}");
        self.set_phase(SessionPhase::Reconnecting { attempt });

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(Command::ReconnectDue { attempt });
        });
    }

    fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Qr(raw) => {
                if self.phase().is_connected() {
                    debug!("Ignoring QR code while connected");
                    return;
                }
                match qr_data_url(&raw) {
                    Ok(url) => {
                        info!("QR code received");
                        let phase = match self.phase() {
                            SessionPhase::Initializing => SessionPhase::AwaitingScan,
                            other => other,
                        };
                        self.set_phase_with(phase, |s| s.last_qr_data_url = Some(url));
                    }
                    Err(e) => warn!("Could not render QR code: {e}"),
                }
            }

            ClientEvent::Ready | ClientEvent::Authenticated => {
                info!("WhatsApp {}", event.name());
                self.set_phase_with(SessionPhase::Connected, ConnectionState::clear_qr);
            }

            ClientEvent::AuthFailure(message) => {
                error!("WhatsApp authentication failed: {message}");
                self.set_phase_with(SessionPhase::Idle, ConnectionState::clear_qr);
            }

            ClientEvent::Disconnected(reason) => {
                warn!("WhatsApp disconnected: {reason}");

                if self.logging_out {
                    self.set_phase_with(SessionPhase::Idle, ConnectionState::clear_qr);
                    return;
                }

                self.state.send_modify(|s| s.clear_qr());
                let next = match (self.phase(), self.origin) {
                    (SessionPhase::Idle, _) => {
                        debug!("Session already idle, not reconnecting");
                        return;
                    }
                    (SessionPhase::Reconnecting { attempt }, _) => {
                        debug!("Reconnect attempt {attempt} already scheduled");
                        return;
                    }
                    // Same outcome as a failed manual initialize
                    (
                        SessionPhase::Initializing | SessionPhase::AwaitingScan,
                        StartOrigin::Manual,
                    ) => {
                        error!("WhatsApp client lost during startup");
                        self.set_phase(SessionPhase::Idle);
                        return;
                    }
                    (
                        SessionPhase::Initializing | SessionPhase::AwaitingScan,
                        StartOrigin::Reconnect(attempt),
                    ) => attempt + 1,
                    (SessionPhase::Connected, _) => 1,
                };
                self.schedule_reconnect(next);
            }
        }
    }
}
