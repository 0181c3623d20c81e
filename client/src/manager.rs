//! # Connection Manager
//!
//! Keeps one best-effort live channel to the hub and hides disconnects
//! from callers.
//!
//! ## Lifecycle
//! 1. [`ConnectionManager::connect`] opens the channel and reports the
//!    outcome of that first attempt to the caller. A refused first attempt
//!    is also handed to the reconnect loop, like any other close
//! 2. A driver task pumps inbound frames into the [`MessageRouter`] and a
//!    writer task drains the outbound queue into the channel
//! 3. On an unexpected close the driver waits the fixed reconnect delay
//!    and tries again, up to `max_reconnect_attempts` times in a row
//! 4. Once the budget is spent the manager settles in `Disconnected` and
//!    stays there until `connect()` is called again
//!
//! Every connect cycle carries a generation number. [`close`] and a fresh
//! `connect()` bump it, and a pending reconnection checks it before each
//! attempt and again before installing the channel it opened, so a timer
//! that fires after `close()` does nothing.
//!
//! The manager is the only writer of [`ConnectionState`]. Other components
//! read it through [`is_connected`], [`state`] or [`subscribe_state`].
//!
//! The driver only holds a weak reference to the manager. Dropping the
//! last handle closes the channel and stops reconnection.
//!
//! [`close`]: ConnectionManager::close
//! [`is_connected`]: ConnectionManager::is_connected
//! [`state`]: ConnectionManager::state
//! [`subscribe_state`]: ConnectionManager::subscribe_state

use crate::config::ClientConfig;
use crate::endpoint::channel_endpoint;
use crate::error::{ClientError, ClientResult};
use crate::router::{MessageRouter, Subscription};
use crate::transport::{Channel, Connector, WebSocketConnector};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use skaia_protocol::{Envelope, MessageType};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

type OutboundRx = mpsc::UnboundedReceiver<String>;

/// The channel currently owned by the manager.
struct Link {
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    driver: Option<JoinHandle<()>>,
}

struct Inner {
    endpoint: Url,
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    router: MessageRouter,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Link>,
    reconnect_attempts: AtomicU32,
    connect_lock: tokio::sync::Mutex<()>,
}

/// Shared handle to one live channel. Clones refer to the same channel.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Creates a manager for the channel served by the page `origin`
    /// (e.g. `https://skaia.example`).
    pub fn new(origin: &str, config: ClientConfig) -> ClientResult<Self> {
        let endpoint = channel_endpoint(origin)?;
        Ok(Self::with_connector(
            endpoint,
            config,
            Arc::new(WebSocketConnector),
        ))
    }

    pub fn with_connector(
        endpoint: Url,
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                endpoint,
                config,
                connector,
                router: MessageRouter::new(),
                state,
                link: Mutex::new(Link {
                    generation: 0,
                    outbound: None,
                    driver: None,
                }),
                reconnect_attempts: AtomicU32::new(0),
                connect_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    /// Opens the channel.
    ///
    /// Resolves once the channel is open; fails if this first attempt
    /// fails, in which case reconnection carries on in the background.
    /// Calling this while the channel is open is a no-op, and concurrent
    /// calls are serialized. Calling it after the reconnect budget ran out
    /// starts a new cycle with a fresh budget.
    pub async fn connect(&self) -> ClientResult<()> {
        let _serialized = self.inner.connect_lock.lock().await;
        if self.is_connected() {
            debug!("connect() while already open; nothing to do");
            return Ok(());
        }

        let generation = self.inner.begin_cycle();
        info!("Connecting to {}", self.inner.endpoint);

        let channel = match self.inner.connector.open(&self.inner.endpoint).await {
            Ok(channel) => channel,
            Err(e) => {
                error!(error = %e, "WebSocket connection failed");
                self.inner.settle(generation, ConnectionState::Reconnecting);
                self.spawn_driver(generation, None);
                return Err(e);
            }
        };

        let Some(outbound_rx) = self.inner.install(generation) else {
            debug!("channel opened after close(); discarding it");
            return Err(ClientError::Cancelled);
        };
        info!("WebSocket connected");

        self.spawn_driver(generation, Some((channel, outbound_rx)));
        Ok(())
    }

    fn spawn_driver(&self, generation: u64, live: Option<(Channel, OutboundRx)>) {
        let driver = tokio::spawn(Inner::drive(Arc::downgrade(&self.inner), generation, live));
        let mut link = self.inner.link.lock();
        if link.generation == generation {
            link.driver = Some(driver);
        } else {
            driver.abort();
        }
    }

    /// Queues `message` for transmission if the channel is open.
    ///
    /// Delivery is at-most-once: while disconnected the message is dropped
    /// with a warning and nothing is queued for later. Never blocks.
    pub fn send(&self, message: &Envelope) {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                error!(kind = %message.kind, error = %e, "failed to encode message");
                return;
            }
        };

        let link = self.inner.link.lock();
        let queued = link
            .outbound
            .as_ref()
            .is_some_and(|tx| tx.send(text).is_ok());
        if queued {
            debug!(kind = %message.kind, "frame queued");
        } else {
            warn!(kind = %message.kind, "WebSocket not connected; message dropped");
        }
    }

    /// Registers `callback` for inbound frames tagged `kind`. Listeners
    /// survive reconnections.
    pub fn on<F>(&self, kind: MessageType, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.router.on(kind, callback)
    }

    /// Closes the channel and cancels any pending reconnection.
    pub fn close(&self) {
        let mut link = self.inner.link.lock();
        link.generation += 1;
        // Dropping the sender lets the writer task flush and send a close frame.
        link.outbound = None;
        if let Some(driver) = link.driver.take() {
            driver.abort();
        }
        self.inner.state.send_replace(ConnectionState::Disconnected);
        info!("WebSocket closed by client");
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Attempts made since the channel was last open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Feed of state changes, e.g. for a connection badge.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }
}

impl Inner {
    /// Starts a new connect cycle, superseding whatever the previous one
    /// left running.
    fn begin_cycle(&self) -> u64 {
        let mut link = self.link.lock();
        link.generation += 1;
        link.outbound = None;
        if let Some(driver) = link.driver.take() {
            driver.abort();
        }
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Connecting);
        link.generation
    }

    /// Makes a freshly opened channel the live one, unless `generation`
    /// has been superseded in the meantime.
    fn install(&self, generation: u64) -> Option<OutboundRx> {
        let mut link = self.link.lock();
        if link.generation != generation {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        link.outbound = Some(tx);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.state.send_replace(ConnectionState::Open);
        Some(rx)
    }

    /// Drops the outbound queue after the channel closed on its own.
    /// Returns `false` if the close was caused by `close()` or a newer
    /// cycle.
    fn detach(&self, generation: u64) -> bool {
        let mut link = self.link.lock();
        if link.generation != generation {
            return false;
        }
        link.outbound = None;
        true
    }

    fn settle(&self, generation: u64, state: ConnectionState) {
        let link = self.link.lock();
        if link.generation == generation {
            self.state.send_replace(state);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.link.lock().generation == generation
    }

    /// Owns the channel of one connect cycle: pumps it while it is open
    /// and runs the reconnect loop whenever it closes on its own. `live`
    /// is `None` when the first attempt of the cycle was refused.
    async fn drive(this: Weak<Self>, generation: u64, mut live: Option<(Channel, OutboundRx)>) {
        loop {
            if let Some((channel, outbound_rx)) = live.take() {
                Self::pump(&this, channel, outbound_rx).await;

                let Some(inner) = this.upgrade() else {
                    return;
                };
                if !inner.detach(generation) {
                    return;
                }
                warn!("Disconnected from {}", inner.endpoint);
            }

            live = Self::reconnect(&this, generation).await;
            if live.is_none() {
                return;
            }
        }
    }

    /// Runs one open channel until it closes.
    async fn pump(this: &Weak<Self>, channel: Channel, mut outbound_rx: OutboundRx) {
        let Channel { mut sink, mut stream } = channel;

        // ── Outbound Writer ──
        let writer = tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(text).await {
                    warn!(error = %e, "failed to write frame");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // ── Inbound Loop ──
        while let Some(frame) = stream.next().await {
            let Some(inner) = this.upgrade() else {
                break;
            };
            match frame {
                Ok(text) => {
                    inner.router.dispatch(&text);
                }
                Err(e) => {
                    warn!(error = %e, "WebSocket transport error");
                    break;
                }
            }
        }

        writer.abort();
    }

    /// Retries with a fixed delay until a channel opens, the budget runs
    /// out, or the cycle is superseded.
    async fn reconnect(this: &Weak<Self>, generation: u64) -> Option<(Channel, OutboundRx)> {
        loop {
            let delay = {
                let inner = this.upgrade()?;
                let max = inner.config.max_reconnect_attempts;
                let attempt = inner.reconnect_attempts.load(Ordering::SeqCst);
                if attempt >= max {
                    warn!(
                        "Giving up on {} after {} reconnection attempts",
                        inner.endpoint, attempt
                    );
                    inner.settle(generation, ConnectionState::Disconnected);
                    return None;
                }

                let attempt = attempt + 1;
                inner.reconnect_attempts.store(attempt, Ordering::SeqCst);
                inner.settle(generation, ConnectionState::Reconnecting);
                info!("Attempting to reconnect... ({}/{})", attempt, max);
                inner.config.reconnect_delay()
            };

            tokio::time::sleep(delay).await;

            let inner = this.upgrade()?;
            if !inner.is_current(generation) {
                debug!("reconnect timer fired after close(); skipping attempt");
                return None;
            }

            match inner.connector.open(&inner.endpoint).await {
                Ok(channel) => {
                    let rx = inner.install(generation)?;
                    info!("Reconnected to {}", inner.endpoint);
                    return Some((channel, rx));
                }
                Err(e) => warn!(error = %e, "reconnection attempt failed"),
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let link = self.link.get_mut();
        link.outbound = None;
        if let Some(driver) = link.driver.take() {
            driver.abort();
        }
    }
}
