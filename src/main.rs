//! WhatsApp gateway, an HTTP wrapper around a whatsapp-web.js session
//!
//! Runs one WhatsApp Web session through a Node.js bridge process and exposes
//! pairing, status, messaging and logout to the admin frontend over HTTP.
//!
//! Usage:
//!   wa-gateway                                   # Default port 5000
//!   wa-gateway --port 8080 --cors                # Custom port, browser CORS
//!   wa-gateway --autostart                       # Start the session at boot
//!   wa-gateway --reconnect-max-attempts 0        # No auto-reconnect
//!   wa-gateway --exit-on-stdin-eof               # Stop when the parent closes stdin

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wa_bridge::{MessagingClient, NodeBridge, NodeBridgeConfig};
use wa_protocol::Routes;
use wa_session::{ReconnectPolicy, WhatsAppSession};
use wa_transport::{TransportConfig, TransportServer};

#[derive(Parser, Debug)]
#[command(name = "wa-gateway", about = "WhatsApp gateway: session wrapper over HTTP")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "5000")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Allow cross-origin requests from the admin frontend
    #[arg(long)]
    cors: bool,

    /// Path to the Node.js runtime
    #[arg(long, default_value = "node")]
    node_path: String,

    /// Path to the bridge entry point (bridge/index.js)
    #[arg(long)]
    bridge_script: Option<PathBuf>,

    /// Session name for the client's local auth storage
    #[arg(long, default_value = "flash-driver")]
    client_id: String,

    /// Directory for the client's session storage (defaults to ~/.wa-gateway/session)
    #[arg(long)]
    data_path: Option<PathBuf>,

    /// Show the automated browser window
    #[arg(long)]
    no_headless: bool,

    /// First reconnect delay in milliseconds
    #[arg(long, default_value = "2000")]
    reconnect_initial_ms: u64,

    /// Reconnect delay ceiling in milliseconds
    #[arg(long, default_value = "60000")]
    reconnect_max_ms: u64,

    /// Consecutive reconnect attempts before giving up (0 disables)
    #[arg(long, default_value = "10")]
    reconnect_max_attempts: u32,

    /// Random spread applied to each reconnect delay (0.0 - 1.0)
    #[arg(long, default_value = "0.2")]
    reconnect_jitter: f64,

    /// Start the WhatsApp session immediately
    #[arg(long)]
    autostart: bool,

    /// Shut down when stdin closes (for a supervising parent that holds a pipe)
    #[arg(long)]
    exit_on_stdin_eof: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.wa-gateway/logs/gateway.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

fn gateway_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".wa-gateway")
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let Some(log_file_arg) = cli.log_file.as_deref() else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return;
    };

    let log_path = if log_file_arg == "DEFAULT" {
        gateway_home().join("logs/gateway.log")
    } else {
        PathBuf::from(log_file_arg)
    };

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .unwrap_or_else(|e| panic!("Failed to open log file {}: {e}", log_path.display()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();

    eprintln!("Logging to {}", log_path.display());
}

/// Find bridge/index.js next to the executable (cargo target dir or an
/// installed layout), falling back to the working directory.
fn resolve_bridge_script() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    [
        exe_dir.join("bridge/index.js"),
        exe_dir.join("../../bridge/index.js"), // target/{debug,release} → project root
        PathBuf::from("bridge/index.js"),
    ]
    .into_iter()
    .find(|p| p.exists())
    .unwrap_or_else(|| PathBuf::from("bridge/index.js"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let script_path = cli.bridge_script.clone().unwrap_or_else(resolve_bridge_script);
    let data_path = cli
        .data_path
        .clone()
        .unwrap_or_else(|| gateway_home().join("session"));
    if let Err(e) = std::fs::create_dir_all(&data_path) {
        warn!("Could not create session directory {}: {e}", data_path.display());
    }

    let bridge_config = NodeBridgeConfig {
        runtime: cli.node_path.clone(),
        script_path,
        client_id: cli.client_id.clone(),
        data_path,
        headless: !cli.no_headless,
        ..NodeBridgeConfig::default()
    };

    let policy = ReconnectPolicy {
        initial_delay: Duration::from_millis(cli.reconnect_initial_ms),
        max_delay: Duration::from_millis(cli.reconnect_max_ms),
        max_attempts: cli.reconnect_max_attempts,
        jitter: cli.reconnect_jitter.clamp(0.0, 1.0),
        ..ReconnectPolicy::default()
    };

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                       WhatsApp Gateway                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Port:       {}", cli.port);
    println!("  Binding:    {}", cli.hostname);
    println!("  Bridge:     {} {}", bridge_config.runtime, bridge_config.script_path.display());
    println!("  Session:    {} ({})", bridge_config.client_id, bridge_config.data_path.display());
    if policy.is_enabled() {
        println!(
            "  Reconnect:  up to {} attempts, {:?} → {:?}",
            policy.max_attempts, policy.initial_delay, policy.max_delay
        );
    } else {
        println!("  Reconnect:  disabled");
    }
    println!();

    // Bridge → session event channel
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let bridge = Arc::new(NodeBridge::new(bridge_config, events_tx));
    let session = Arc::new(WhatsAppSession::spawn(bridge.clone(), events_rx, policy));

    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        enable_cors: cli.cors,
    };

    let mut transport = match TransportServer::start(transport_config, session.clone()).await {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to start transport: {e}");
            std::process::exit(1);
        }
    };

    if cli.autostart {
        match session.start().await {
            Ok(outcome) => info!("Autostart: {}", outcome.message()),
            Err(e) => warn!("Autostart failed: {e}"),
        }
    }

    let base_url = format!("http://{}:{}", cli.hostname, transport.port());

    println!("────────────────────────────────────────────────────────────────");
    println!();
    println!("  Gateway running!");
    println!();
    println!("  Endpoints:");
    println!("    POST {base_url}{}", Routes::START);
    println!("    GET  {base_url}{}", Routes::QR_CODE);
    println!("    POST {base_url}{}", Routes::SEND);
    println!("    GET  {base_url}{}", Routes::STATUS);
    println!("    POST {base_url}{}", Routes::LOGOUT);
    println!();
    println!("────────────────────────────────────────────────────────────────");
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    // Ctrl+C, or stdin EOF when a supervising parent process goes away
    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    if cli.exit_on_stdin_eof {
        let notify = shutdown_notify.clone();
        std::thread::spawn(move || {
            use std::io::Read;
            let mut buf = [0u8; 1];
            loop {
                match std::io::stdin().read(&mut buf) {
                    Ok(0) | Err(_) => {
                        notify.notify_one();
                        return;
                    }
                    Ok(_) => continue,
                }
            }
        });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = shutdown_notify.notified() => {
            eprintln!("stdin closed (parent process gone), shutting down");
        }
    }

    println!();
    println!("  Shutting down...");
    transport.stop().await;
    bridge.shutdown().await;
    println!("  Gateway stopped.");
}
