//! Interactive WebSocket client
//!
//! Connects to the configured server, prints every session callback and
//! sends each stdin line as a text message.
//!
//! Commands:
//! - `/ping` sends a ping frame
//! - `/reconnect` re-establishes a closed session
//! - `/quit` closes the session and exits
//!
//! Run with: cargo run --bin ws_client
//! Config path: CLIENT_CONFIG_PATH (default config/client.yaml)

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{info, warn};
use websockets_client::bin_common::{init_tracing, load_config_from_env, ClientConfig, ConfigType};
use websockets_client::wsconnection::{
    CloseNotification, SessionObserver, StaticHeaders, WebSocketConnection,
};

const CLOSE_WAIT: Duration = Duration::from_secs(5);

/// Prints callbacks and wakes the main loop once the session is gone for good
struct PrintingObserver {
    closed: Notify,
}

impl SessionObserver for PrintingObserver {
    fn on_open(&self) {
        println!("[open]");
    }

    fn on_close(&self, code: CloseNotification, reason: &str) {
        println!("[close] {} ({})", code, reason);
        if code != CloseNotification::Reconnect {
            self.closed.notify_one();
        }
    }

    fn on_text_message(&self, payload: String) {
        println!("< {}", payload);
    }

    fn on_raw_text_message(&self, payload: Vec<u8>) {
        println!("< {}", String::from_utf8_lossy(&payload));
    }

    fn on_binary_message(&self, payload: Vec<u8>) {
        println!("< [{} bytes of binary]", payload.len());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("info");

    let config_path = load_config_from_env(ConfigType::Client);
    let config = ClientConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!("Connecting to {}", config.url);

    let connection = WebSocketConnection::builder()
        .headers(StaticHeaders(config.headers.clone()))
        .build();
    let observer = Arc::new(PrintingObserver {
        closed: Notify::new(),
    });

    let subprotocols: Vec<&str> = config.subprotocols.iter().map(String::as_str).collect();
    connection
        .connect_with(&config.url, &subprotocols, &observer, &config.options)
        .await
        .context("connect")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/ping" => {
                        if let Err(e) = connection.send_ping(Vec::new()) {
                            warn!("Ping not sent: {}", e);
                        }
                    }
                    "/reconnect" => {
                        if !connection.reconnect().await {
                            warn!("Nothing to reconnect");
                        }
                    }
                    text => {
                        if let Err(e) = connection.send_text_message(text) {
                            warn!("Message not sent: {}", e);
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if connection.is_connected() {
        connection.disconnect();
        if tokio::time::timeout(CLOSE_WAIT, observer.closed.notified())
            .await
            .is_err()
        {
            warn!("Server did not close the session in time");
        }
    } else {
        connection.disconnect();
    }

    info!("Bye");
    Ok(())
}
