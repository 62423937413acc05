//! Node.js bridge: drives `whatsapp-web.js` in a subprocess.
//!
//! The bridge script (`bridge/index.js`) owns the headless browser and the
//! WhatsApp Web session. We talk to it with one JSON object per line:
//!
//!   → {"id":1,"method":"initialize"}
//!   → {"id":2,"method":"sendMessage","params":{"chatId":"216...@c.us","text":"hi"}}
//!   ← {"id":1,"result":null}
//!   ← {"id":2,"error":{"code":-1,"message":"..."}}
//!   ← {"event":"qr","data":"2@AbC..."}
//!
//! The process is spawned lazily by `initialize` and respawned by the next
//! `initialize` once it has exited.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use wa_protocol::{ChatId, ClientEvent};

use crate::{BridgeError, MessagingClient};

/// Browser flags for running headless Chromium inside containers.
pub const DEFAULT_BROWSER_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--no-zygote",
    "--single-process",
];

/// Configuration for the bridge subprocess.
#[derive(Debug, Clone)]
pub struct NodeBridgeConfig {
    /// Runtime used to run the script (node, bun)
    pub runtime: String,
    /// Path to the bridge entry point
    pub script_path: PathBuf,
    /// Session name for the client's local auth storage
    pub client_id: String,
    /// Directory where the client persists its session
    pub data_path: PathBuf,
    /// Run the browser without a window
    pub headless: bool,
    /// Extra browser launch flags
    pub browser_args: Vec<String>,
}

impl Default for NodeBridgeConfig {
    fn default() -> Self {
        Self {
            runtime: "node".into(),
            script_path: PathBuf::from("bridge/index.js"),
            client_id: "flash-driver".into(),
            data_path: PathBuf::from(".wwebjs_auth"),
            headless: true,
            browser_args: DEFAULT_BROWSER_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Request written to the bridge's stdin.
#[derive(Debug, Serialize)]
struct BridgeRequest {
    id: u64,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// Response read from the bridge's stdout.
#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    #[serde(default = "default_error_code")]
    code: i32,
    message: String,
}

fn default_error_code() -> i32 {
    -1
}

/// Anything the bridge may print on stdout.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BridgeLine {
    Event(ClientEvent),
    Response(BridgeResponse),
}

type Reply = oneshot::Sender<Result<Value, BridgeError>>;
type PendingMap = Arc<DashMap<u64, Reply>>;

/// A live bridge subprocess and the channel feeding its writer task.
struct BridgeProcess {
    request_tx: mpsc::Sender<(BridgeRequest, Reply)>,
    child: Child,
    alive: Arc<AtomicBool>,
}

/// [`MessagingClient`] backed by a `whatsapp-web.js` subprocess.
pub struct NodeBridge {
    config: NodeBridgeConfig,
    events: mpsc::UnboundedSender<ClientEvent>,
    process: Mutex<Option<BridgeProcess>>,
    next_id: AtomicU64,
    /// Set during shutdown so the exiting process is not reported as a disconnect
    stopping: Arc<AtomicBool>,
    /// Bumped on every spawn; only the newest process may report its exit
    generation: Arc<AtomicU64>,
}

impl NodeBridge {
    pub fn new(config: NodeBridgeConfig, events: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self {
            config,
            events,
            process: Mutex::new(None),
            next_id: AtomicU64::new(1),
            stopping: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &NodeBridgeConfig {
        &self.config
    }

    /// Check if the bridge process is running.
    pub fn is_running(&self) -> bool {
        self.process
            .lock()
            .as_ref()
            .is_some_and(|p| p.alive.load(Ordering::Relaxed))
    }

    /// Sender for the live process, spawning a new one if needed.
    fn ensure_running(&self) -> Result<mpsc::Sender<(BridgeRequest, Reply)>, BridgeError> {
        let mut process = self.process.lock();
        if let Some(p) = process.as_ref() {
            if p.alive.load(Ordering::Relaxed) {
                return Ok(p.request_tx.clone());
            }
        }

        let spawned = self.spawn_process()?;
        let tx = spawned.request_tx.clone();
        // Replacing a dead process drops its Child (kill_on_drop)
        *process = Some(spawned);
        Ok(tx)
    }

    /// Sender for the live process, without spawning.
    fn running_sender(&self) -> Result<mpsc::Sender<(BridgeRequest, Reply)>, BridgeError> {
        match self.process.lock().as_ref() {
            Some(p) if p.alive.load(Ordering::Relaxed) => Ok(p.request_tx.clone()),
            _ => Err(BridgeError::NotRunning),
        }
    }

    fn spawn_process(&self) -> Result<BridgeProcess, BridgeError> {
        info!(
            "Starting WhatsApp bridge: {} {} (client: {})",
            self.config.runtime,
            self.config.script_path.display(),
            self.config.client_id,
        );

        let mut command = Command::new(&self.config.runtime);
        command
            .arg(&self.config.script_path)
            .arg("--client-id")
            .arg(&self.config.client_id)
            .arg("--data-path")
            .arg(&self.config.data_path)
            .arg("--headless")
            .arg(self.config.headless.to_string());
        for browser_arg in &self.config.browser_args {
            command.arg(format!("--browser-arg={browser_arg}"));
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(mut stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(BridgeError::NotRunning);
        };

        self.stopping.store(false, Ordering::Relaxed);
        let spawned_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let alive = Arc::new(AtomicBool::new(true));
        let pending: PendingMap = Arc::new(DashMap::new());
        let (tx, mut rx) = mpsc::channel::<(BridgeRequest, Reply)>(64);

        // Writer task: serializes requests to stdin
        let pending_writer = pending.clone();
        let alive_writer = alive.clone();
        tokio::spawn(async move {
            while let Some((request, reply)) = rx.recv().await {
                let mut line = match serde_json::to_string(&request) {
                    Ok(line) => line,
                    Err(e) => {
                        let _ = reply.send(Err(BridgeError::remote(format!("encode failed: {e}"))));
                        continue;
                    }
                };
                line.push('\n');

                let id = request.id;
                pending_writer.insert(id, reply);
                let written = stdin.write_all(line.as_bytes()).await;
                if written.is_err() || stdin.flush().await.is_err() {
                    alive_writer.store(false, Ordering::Relaxed);
                    if let Some((_, reply)) = pending_writer.remove(&id) {
                        let _ = reply.send(Err(BridgeError::ChannelClosed));
                    }
                    break;
                }
            }
        });

        // Reader task: responses and lifecycle events from stdout
        let events = self.events.clone();
        let stopping = self.stopping.clone();
        let generation = self.generation.clone();
        let alive_reader = alive.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<BridgeLine>(line) {
                    Ok(BridgeLine::Event(event)) => {
                        debug!("Bridge event: {}", event.name());
                        let _ = events.send(event);
                    }
                    Ok(BridgeLine::Response(response)) => {
                        if let Some((_, reply)) = pending.remove(&response.id) {
                            let result = match response.error {
                                Some(err) => Err(BridgeError::Remote {
                                    code: err.code,
                                    message: err.message,
                                }),
                                None => Ok(response.result.unwrap_or(Value::Null)),
                            };
                            let _ = reply.send(result);
                        }
                    }
                    Err(_) => debug!("Non-protocol line from bridge: {line}"),
                }
            }

            alive_reader.store(false, Ordering::Relaxed);
            let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
            for id in ids {
                if let Some((_, reply)) = pending.remove(&id) {
                    let _ = reply.send(Err(BridgeError::ChannelClosed));
                }
            }

            if stopping.load(Ordering::Relaxed) {
                debug!("WhatsApp bridge process stopped");
            } else if generation.load(Ordering::SeqCst) != spawned_generation {
                debug!("Replaced WhatsApp bridge process exited");
            } else {
                warn!("WhatsApp bridge process exited");
                let _ = events.send(ClientEvent::Disconnected("bridge process exited".into()));
            }
        });

        // Stderr logger
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("[wa-bridge] {line}");
            }
        });

        Ok(BridgeProcess {
            request_tx: tx,
            child,
            alive,
        })
    }

    /// Send a request to the bridge and wait for its response.
    async fn request(
        &self,
        tx: mpsc::Sender<(BridgeRequest, Reply)>,
        method: &'static str,
        params: Option<Value>,
    ) -> Result<Value, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        tx.send((BridgeRequest { id, method, params }, reply_tx))
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;

        reply_rx.await.map_err(|_| BridgeError::ChannelClosed)?
    }
}

impl MessagingClient for NodeBridge {
    async fn initialize(&self) -> Result<(), BridgeError> {
        let tx = self.ensure_running()?;
        self.request(tx, "initialize", None).await?;
        Ok(())
    }

    async fn send_message(&self, chat_id: &ChatId, text: &str) -> Result<(), BridgeError> {
        let tx = self.running_sender()?;
        let params = json!({ "chatId": chat_id.as_str(), "text": text });
        self.request(tx, "sendMessage", Some(params)).await?;
        Ok(())
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        let tx = self.running_sender()?;
        self.request(tx, "logout", None).await?;
        Ok(())
    }

    async fn shutdown(&self) {
        self.stopping.store(true, Ordering::Relaxed);
        let process = self.process.lock().take();
        if let Some(mut process) = process {
            let _ = process.child.kill().await;
            info!("WhatsApp bridge subprocess terminated");
        }
    }
}
