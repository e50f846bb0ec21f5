//! Single WebSocket session with ping keep-alive.
//!
//! A `WsSession` is opened with [`WsSession::open`], which performs the
//! handshake before returning so the caller learns about connect failures
//! directly. After that a background tokio task:
//! 1. Reads messages and forwards text frames to a callback.
//! 2. Sends periodic ping messages.
//! 3. Reports an unexpected end of stream through the close callback.
//!
//! There is no reconnect loop here. The realtime coordinator owns retry
//! policy and decides when to open a new session.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, error, info, warn};

use crate::error::CvError;

/// Receives every text frame, borrowed for the duration of the call.
pub type OnTextCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked once when the session ends without being closed by us.
///
/// Parameter: human-readable reason.
pub type OnCloseCallback = Arc<dyn Fn(String) + Send + Sync>;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Ping payload format.
#[derive(Debug, Clone)]
pub enum PingPayload {
    /// Send a text frame (e.g. `"ping"`).
    Text(String),
    /// Protocol-level ping frame.
    WebSocketPing,
}

/// Configuration for a single WebSocket session.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Full WebSocket URL, including any query.
    pub url: String,
    /// Text frame written right after the handshake, if the protocol needs one.
    pub subscribe_msg: Option<String>,
    /// Keep-alive period; `None` disables pings.
    pub ping_interval: Option<Duration>,
    pub ping_payload: PingPayload,
    /// Upper bound for the TCP + TLS + WS handshake.
    pub connect_timeout: Duration,
    /// Label used in log lines.
    pub label: String,
}

impl WsConnConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subscribe_msg: None,
            ping_interval: None,
            ping_payload: PingPayload::WebSocketPing,
            connect_timeout: Duration::from_secs(10),
            label: "ws".into(),
        }
    }
}

/// An open WebSocket session managed by a background tokio task.
pub struct WsSession {
    /// Set to `true` to end the session quietly.
    shutdown_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsSession {
    /// Connect, send the subscription message, and start the read loop.
    ///
    /// Returns an error if the handshake fails, times out, or the
    /// subscription message cannot be written.
    pub async fn open(config: WsConnConfig, on_text: OnTextCallback, on_close: OnCloseCallback) -> Result<Self, CvError> {
        let label = config.label.clone();
        info!("[{label}] connecting to {}", config.url);

        let mut stream = match tokio::time::timeout(config.connect_timeout, connect_ws(&config)).await {
            Ok(result) => result?,
            Err(_) => return Err(CvError::WebSocket(format!("handshake timed out after {:?}", config.connect_timeout))),
        };

        if let Some(ref sub_msg) = config.subscribe_msg {
            debug!("[{label}] subscribing: {sub_msg}");
            stream
                .send(Message::Text(sub_msg.clone().into()))
                .await
                .map_err(|e| CvError::WebSocket(format!("subscribe send failed: {e}")))?;
        }

        info!("[{label}] connected");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(session_loop(config, stream, on_text, on_close, shutdown_rx));

        Ok(Self { shutdown_tx, task: Some(task) })
    }

    /// Whether the background task is still running.
    pub fn is_open(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Close the session and wait for the task to finish.
    ///
    /// The close callback is not invoked for a close requested here.
    pub async fn close(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WsSession {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Read/write loop for one established session.
async fn session_loop(
    config: WsConnConfig,
    stream: WsStream,
    on_text: OnTextCallback,
    on_close: OnCloseCallback,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let label = config.label.as_str();
    let (mut ws_write, mut ws_read) = stream.split();

    let ping_interval = config.ping_interval.map(tokio::time::interval);

    tokio::pin! {
        let ping_tick = async {
            if let Some(mut interval) = ping_interval {
                // First tick completes immediately; skip it.
                interval.tick().await;
                loop {
                    interval.tick().await;
                }
            } else {
                std::future::pending::<()>().await
            }
        };
    }

    let reason = loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("[{label}] close requested");
                let _ = ws_write.close().await;
                return;
            }

            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => on_text(&text),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(f) => format!("close frame {}: {}", f.code, f.reason.as_str()),
                            None => "close frame".to_string(),
                        };
                    }
                    Some(Err(e)) => break format!("read error: {e}"),
                    None => break "stream ended".to_string(),
                    _ => {} // Binary, Pong, raw frames
                }
            }

            _ = &mut ping_tick => {
                let ping_msg = match &config.ping_payload {
                    PingPayload::Text(t) => Message::Text(t.clone().into()),
                    PingPayload::WebSocketPing => Message::Ping(Vec::new().into()),
                };
                if let Err(e) = ws_write.send(ping_msg).await {
                    break format!("ping send error: {e}");
                }
            }
        }
    };

    if *shutdown_rx.borrow() {
        return;
    }
    warn!("[{label}] disconnected: {reason}");
    on_close(reason);
}

/// Establish a (TLS) WebSocket connection.
async fn connect_ws(config: &WsConnConfig) -> Result<WsStream, CvError> {
    let request =
        config.url.as_str().into_client_request().map_err(|e| CvError::WebSocket(format!("bad url {}: {e}", config.url)))?;

    let (stream, _response) = tokio_tungstenite::connect_async(request).await.map_err(|e| {
        error!("[{}] handshake failed: {e}", config.label);
        CvError::WebSocket(e.to_string())
    })?;
    Ok(stream)
}
