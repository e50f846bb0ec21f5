//! WebSocket [`Transport`] for the CoinCap prices stream.
//!
//! Each `connect` opens a fresh [`WsSession`] whose URL carries the coin set,
//! so a resubscribe is a reconnect. Decoded prices go to the registered
//! message handler; an unexpected end of the current session goes to the
//! disconnect handler. Drops of sessions that were already replaced are
//! swallowed via a generation counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use cv_core::config::RealtimeConfig;
use cv_core::ws::{OnCloseCallback, OnTextCallback, PingPayload, WsConnConfig, WsSession};
use cv_core::CvError;
use tracing::{debug, info};

use crate::coincap;
use crate::{DisconnectHandler, MessageHandler, Transport};

type HandlerSlot<T> = Arc<Mutex<Option<T>>>;

pub struct WsTransport {
    base_url: String,
    ping_interval: Option<Duration>,
    connect_timeout: Duration,
    session: tokio::sync::Mutex<Option<WsSession>>,
    generation: Arc<AtomicU64>,
    on_message: HandlerSlot<MessageHandler>,
    on_disconnect: HandlerSlot<DisconnectHandler>,
}

impl WsTransport {
    pub fn new(base_url: impl Into<String>, ping_interval: Option<Duration>, connect_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            ping_interval,
            connect_timeout,
            session: tokio::sync::Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            on_message: Arc::new(Mutex::new(None)),
            on_disconnect: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(cfg: &RealtimeConfig) -> Self {
        Self::new(cfg.effective_ws_url(), cfg.effective_ping_interval(), cfg.effective_connect_timeout())
    }

    fn session_config(&self, coin_ids: &[String]) -> Result<WsConnConfig, CvError> {
        let mut config = WsConnConfig::new(coincap::prices_url(&self.base_url, coin_ids)?);
        config.ping_interval = self.ping_interval;
        config.ping_payload = PingPayload::WebSocketPing;
        config.connect_timeout = self.connect_timeout;
        config.label = "coincap".into();
        Ok(config)
    }

    fn callbacks(&self, generation: u64) -> (OnTextCallback, OnCloseCallback) {
        let on_message = self.on_message.clone();
        let on_text: OnTextCallback = Arc::new(move |text| {
            let handler = on_message.lock().unwrap_or_else(PoisonError::into_inner).clone();
            if let Some(handler) = handler {
                for update in coincap::parse_prices(text) {
                    handler(update);
                }
            }
        });

        let on_disconnect = self.on_disconnect.clone();
        let current = self.generation.clone();
        let on_close: OnCloseCallback = Arc::new(move |reason| {
            if current.load(Ordering::Acquire) != generation {
                debug!("[coincap] ignoring drop of replaced session: {reason}");
                return;
            }
            let handler = on_disconnect.lock().unwrap_or_else(PoisonError::into_inner).clone();
            if let Some(handler) = handler {
                handler(reason);
            }
        });

        (on_text, on_close)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, coin_ids: &[String]) -> Result<(), CvError> {
        let config = self.session_config(coin_ids)?;

        let mut slot = self.session.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(old) = slot.take() {
            old.close().await;
        }

        let (on_text, on_close) = self.callbacks(generation);
        let session = WsSession::open(config, on_text, on_close).await?;
        info!("[coincap] streaming {} coins", coin_ids.len());
        *slot = Some(session);
        Ok(())
    }

    fn on_message(&self, handler: MessageHandler) {
        *self.on_message.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn on_disconnect(&self, handler: DisconnectHandler) {
        *self.on_disconnect.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    async fn close(&self) {
        let mut slot = self.session.lock().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(session) = slot.take() {
            session.close().await;
            info!("[coincap] session closed");
        }
    }
}
