//! Subscription coordinator: public API plus the background driver task.
//!
//! Mutations to the registry are serialized behind a write lock; reads of
//! the active set take a read lock and recompute the union, so they never
//! observe a stale cache. Every change to the union is published on a
//! `watch` channel that the driver task consumes.
//!
//! The driver owns the [`ConnectionLifecycle`] and is the only writer of the
//! connection state. Transport errors never escape it: they drive the state
//! machine to `RECONNECTING` / `FAILED` and are reported as [`FeedEvent`]s.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use cv_core::ConnectionState;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backoff::ReconnectionStrategy;
use crate::event::{FEED_EVENT_CAPACITY, FeedEvent, FeedEventReceiver, FeedEventSender};
use crate::lifecycle::{ConnectionLifecycle, LifecycleAction};
use crate::registry::SubscriptionRegistry;
use crate::{DisconnectHandler, MessageHandler, Transport};

/// Requests delivered to the driver from outside the registry path.
#[derive(Debug)]
enum Control {
    /// The transport reported an unexpected drop.
    Dropped(String),
    /// External reconnect request.
    Reconnect,
}

/// Aggregates per-screen interest into one upstream subscription.
///
/// Must be created inside a tokio runtime: construction spawns the driver.
pub struct SubscriptionCoordinator {
    registry: RwLock<SubscriptionRegistry>,
    active_tx: watch::Sender<BTreeSet<String>>,
    state_rx: watch::Receiver<ConnectionState>,
    control_tx: mpsc::UnboundedSender<Control>,
    events: FeedEventSender,
    shutdown_tx: watch::Sender<bool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SubscriptionCoordinator {
    /// Wire the transport handlers and start the driver task.
    pub fn spawn(transport: Arc<dyn Transport>, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        let (active_tx, active_rx) = watch::channel(BTreeSet::new());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events, _) = broadcast::channel(FEED_EVENT_CAPACITY);

        let price_events = events.clone();
        let on_message: MessageHandler = Arc::new(move |update| {
            let _ = price_events.send(FeedEvent::Price(update));
        });
        transport.on_message(on_message);

        let drop_tx = control_tx.clone();
        let on_disconnect: DisconnectHandler = Arc::new(move |reason| {
            let _ = drop_tx.send(Control::Dropped(reason));
        });
        transport.on_disconnect(on_disconnect);

        let driver = Driver {
            lifecycle: ConnectionLifecycle::new(strategy),
            transport,
            active_rx,
            control_rx,
            state_tx,
            events: events.clone(),
            retry_at: None,
        };
        let task = tokio::spawn(driver.run(shutdown_rx));

        Self {
            registry: RwLock::new(SubscriptionRegistry::new()),
            active_tx,
            state_rx,
            control_tx,
            events,
            shutdown_tx,
            task: Some(task),
        }
    }

    /// Register or replace the interest set of `screen_id`.
    ///
    /// Idempotent for an identical set. The transport is only touched when
    /// the union actually changes.
    pub fn subscribe<I, S>(&self, screen_id: &str, coin_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if registry.subscribe(screen_id, coin_ids) {
            debug!("[coordinator] screen '{screen_id}' subscribed");
            self.publish_active(&registry);
        }
    }

    /// Drop the interest of `screen_id`. No-op if it is not registered.
    pub fn unsubscribe(&self, screen_id: &str) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if registry.unsubscribe(screen_id) {
            debug!("[coordinator] screen '{screen_id}' unsubscribed");
            self.publish_active(&registry);
        }
    }

    /// Union of every registered screen's coin ids.
    pub fn active_subscriptions(&self) -> BTreeSet<String> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner).active_set()
    }

    /// Coin ids registered by `screen_id` (empty if unregistered).
    pub fn subscriptions_for_screen(&self, screen_id: &str) -> BTreeSet<String> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner).screen_set(screen_id)
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch the connection state.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Subscribe to lifecycle, price, and fallback events.
    pub fn events(&self) -> FeedEventReceiver {
        self.events.subscribe()
    }

    /// Ask the driver to leave `FAILED` (or skip a pending backoff) and
    /// connect again with a fresh strategy.
    pub fn reconnect(&self) {
        let _ = self.control_tx.send(Control::Reconnect);
    }

    /// Close the transport and stop the driver task.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Publish the new union while the write lock is still held, so the
    /// driver sees sets in mutation order.
    fn publish_active(&self, registry: &SubscriptionRegistry) {
        let active = registry.active_set();
        self.active_tx.send_if_modified(|current| {
            if *current == active {
                return false;
            }
            *current = active;
            true
        });
    }
}

impl Drop for SubscriptionCoordinator {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

// ---------------------------------------------------------------------------
// Driver: sole writer of the connection state
// ---------------------------------------------------------------------------

struct Driver {
    lifecycle: ConnectionLifecycle,
    transport: Arc<dyn Transport>,
    active_rx: watch::Receiver<BTreeSet<String>>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    state_tx: watch::Sender<ConnectionState>,
    events: FeedEventSender,
    retry_at: Option<Instant>,
}

impl Driver {
    async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("[coordinator] driver started");

        loop {
            let retry_at = self.retry_at;
            let retry_sleep = async move {
                match retry_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let action = tokio::select! {
                _ = shutdown_rx.changed() => break,

                changed = self.active_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let has_interest = !self.active_rx.borrow_and_update().is_empty();
                    self.lifecycle.on_interest_changed(has_interest)
                }

                Some(control) = self.control_rx.recv() => match control {
                    Control::Dropped(reason) => {
                        warn!("[coordinator] transport dropped: {reason}");
                        self.lifecycle.on_transport_failure()
                    }
                    Control::Reconnect => {
                        info!("[coordinator] reconnect requested");
                        let has_interest = !self.active_rx.borrow().is_empty();
                        self.lifecycle.on_reconnect_requested(has_interest)
                    }
                },

                _ = retry_sleep => {
                    self.retry_at = None;
                    self.lifecycle.on_retry_elapsed()
                }
            };

            self.publish();
            self.apply(action).await;
        }

        self.transport.close().await;
        self.retry_at = None;
        info!("[coordinator] driver stopped");
    }

    /// Perform actions until the state machine has nothing more to do.
    async fn apply(&mut self, mut action: Option<LifecycleAction>) {
        while let Some(next) = action.take() {
            action = match next {
                LifecycleAction::Connect => {
                    let coins = self.current_coins();
                    if coins.is_empty() {
                        // Interest vanished between scheduling and now.
                        self.lifecycle.on_interest_changed(false)
                    } else {
                        match self.transport.connect(&coins).await {
                            Ok(()) => {
                                info!("[coordinator] connected ({} coins)", coins.len());
                                self.lifecycle.on_connected()
                            }
                            Err(e) => {
                                self.report_error(format!("connect failed: {e}"));
                                self.lifecycle.on_transport_failure()
                            }
                        }
                    }
                }
                LifecycleAction::Resubscribe => {
                    let coins = self.current_coins();
                    match self.transport.resubscribe(&coins).await {
                        Ok(()) => {
                            debug!("[coordinator] resubscribed ({} coins)", coins.len());
                            None
                        }
                        Err(e) => {
                            self.report_error(format!("resubscribe failed: {e}"));
                            self.lifecycle.on_transport_failure()
                        }
                    }
                }
                LifecycleAction::Close => {
                    self.retry_at = None;
                    self.transport.close().await;
                    None
                }
                LifecycleAction::ScheduleRetry(delay) => {
                    info!("[coordinator] retry #{} in {delay:?}", self.lifecycle.attempt());
                    self.retry_at = Some(Instant::now() + delay);
                    None
                }
                LifecycleAction::GiveUp => {
                    self.lifecycle.give_up();
                    let attempts = self.lifecycle.attempt();
                    warn!("[coordinator] giving up after {attempts} attempts");
                    let _ = self.events.send(FeedEvent::FallbackRequested { attempts });
                    None
                }
            };
            self.publish();
        }
    }

    fn current_coins(&self) -> Vec<String> {
        self.active_rx.borrow().iter().cloned().collect()
    }

    fn report_error(&self, message: String) {
        warn!("[coordinator] {message}");
        let _ = self.events.send(FeedEvent::TransportError { message });
    }

    /// Push the lifecycle state to observers if it changed.
    fn publish(&self) {
        let to = self.lifecycle.state();
        let from = *self.state_tx.borrow();
        if from == to {
            return;
        }
        let attempt = self.lifecycle.attempt();
        info!("[coordinator] {from} -> {to} (attempt {attempt})");
        self.state_tx.send_replace(to);
        let _ = self.events.send(FeedEvent::StateChanged { from, to, attempt });
    }
}
