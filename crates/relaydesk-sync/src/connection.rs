// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duplex connection manager.
//!
//! Owns the lifecycle of one duplex channel:
//!
//! ```text
//! Disconnected --connect--> Connecting --handshake ok--> Connected
//!      ^                        ^                           |
//!      |                        |                     remote close/error
//!  disconnect()                 |                           v
//!   (from any)                  +---- fixed delay ---- Reconnecting
//! ```
//!
//! A supervisor task drives the loop. `disconnect()` cancels it and bumps the
//! session generation, so a reconnect timer that is already pending can never
//! open a new channel afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::{ChannelFrame, DuplexChannel, DuplexConnector};
use relaydesk_core::types::ConnectionState;

use crate::events::InboundEvent;

/// Close code reported when the transport dropped without a close handshake.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Default fixed delay between a lost channel and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Callback for every successfully parsed inbound event.
pub type EventHandler = Arc<dyn Fn(&InboundEvent) + Send + Sync>;

/// Callback for connected (`true`) / disconnected (`false`) transitions.
pub type ConnectivityHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Connection settings.
///
/// Mirrors the `[realtime]` section of the console configuration so this
/// crate does not depend on the config crate.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Fully resolved duplex endpoint.
    pub endpoint: String,
    pub reconnect_delay: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080/ws".to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

#[derive(Default)]
struct SessionSlot {
    generation: u64,
    cancel: Option<CancellationToken>,
    outbound: Option<mpsc::Sender<String>>,
}

impl SessionSlot {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.cancel.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerKind {
    Event,
    Connectivity,
}

struct Inner {
    connector: Arc<dyn DuplexConnector>,
    options: ConnectionOptions,
    state: watch::Sender<ConnectionState>,
    event_handlers: DashMap<u64, EventHandler>,
    connectivity_handlers: DashMap<u64, ConnectivityHandler>,
    next_handler: AtomicU64,
    session: Mutex<SessionSlot>,
    /// Held across a connectivity change and its callbacks, so handlers
    /// observe transitions in the order they happened.
    connectivity: Mutex<()>,
}

/// Handle returned by the subscription methods.
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) removes the
/// handler. [`detach`](Self::detach) keeps the handler registered for the
/// lifetime of the manager.
#[must_use = "dropping a Subscription removes its handler"]
pub struct Subscription {
    inner: Weak<Inner>,
    id: u64,
    kind: HandlerKind,
    active: bool,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    pub fn detach(mut self) {
        self.active = false;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            match self.kind {
                HandlerKind::Event => {
                    inner.event_handlers.remove(&self.id);
                }
                HandlerKind::Connectivity => {
                    inner.connectivity_handlers.remove(&self.id);
                }
            }
        }
    }
}

/// Owner of one duplex channel.
///
/// Explicit instance: construct as many as needed, each with its own
/// connector. Dropping the manager stops its supervisor.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn DuplexConnector>, options: ConnectionOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector,
                options,
                state: watch::Sender::new(ConnectionState::Disconnected),
                event_handlers: DashMap::new(),
                connectivity_handlers: DashMap::new(),
                next_handler: AtomicU64::new(1),
                session: Mutex::new(SessionSlot::default()),
                connectivity: Mutex::new(()),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.options.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Starts connecting with `token`.
    ///
    /// Returns an error, leaving the state `Disconnected`, when the token is
    /// empty or the channel cannot be constructed for the endpoint. Handshake
    /// failures are not errors: they enter the reconnect loop. Calling this
    /// while a session is already running is a no-op.
    pub fn connect(&self, token: SecretString) -> Result<(), RelayDeskError> {
        let endpoint = &self.inner.options.endpoint;
        if token.expose_secret().trim().is_empty() {
            warn!(endpoint = %endpoint, "connect aborted: no credential available");
            return Err(RelayDeskError::connection("no credential available"));
        }
        if let Err(e) = self.inner.connector.validate(endpoint, &token) {
            warn!(endpoint = %endpoint, error = %e, "connect aborted: channel construction failed");
            return Err(e);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            RelayDeskError::Internal(format!("connect requires a tokio runtime: {e}"))
        })?;

        let (generation, cancel) = {
            let mut slot = self.inner.session();
            if slot.cancel.is_some() {
                debug!(endpoint = %endpoint, "connect ignored: session already running");
                return Ok(());
            }
            slot.generation += 1;
            let cancel = CancellationToken::new();
            slot.cancel = Some(cancel.clone());
            self.inner.state.send_replace(ConnectionState::Connecting);
            (slot.generation, cancel)
        };

        runtime.spawn(
            supervise(Arc::clone(&self.inner), token, generation, cancel).in_current_span(),
        );
        Ok(())
    }

    /// Closes the channel and suppresses reconnection until the next
    /// `connect`. Safe to call in any state, any number of times.
    pub fn disconnect(&self) {
        let _gate = self.inner.connectivity_gate();
        let (had_session, was_connected) = {
            let mut slot = self.inner.session();
            let had_session = match slot.cancel.take() {
                Some(cancel) => {
                    cancel.cancel();
                    true
                }
                None => false,
            };
            slot.outbound = None;
            let previous = self.inner.state.send_replace(ConnectionState::Disconnected);
            (had_session, previous == ConnectionState::Connected)
        };

        if had_session {
            info!(endpoint = %self.inner.options.endpoint, "disconnected by request");
        } else {
            debug!("disconnect: no session running");
        }
        if was_connected {
            self.inner.notify_connectivity(false);
        }
    }

    /// Serialises `payload` and queues it on the open channel.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), RelayDeskError> {
        let frame = serde_json::to_string(payload).map_err(|e| RelayDeskError::Protocol {
            message: format!("outbound payload is not serialisable: {e}"),
            source: Some(Box::new(e)),
        })?;
        let slot = self.inner.session();
        let outbound = slot.outbound.as_ref().ok_or(RelayDeskError::NotConnected)?;
        outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                RelayDeskError::connection("outbound queue is full")
            }
            mpsc::error::TrySendError::Closed(_) => RelayDeskError::NotConnected,
        })
    }

    /// Registers a handler for inbound events.
    pub fn subscribe(&self, handler: impl Fn(&InboundEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_handler.fetch_add(1, Ordering::Relaxed);
        self.inner.event_handlers.insert(id, Arc::new(handler));
        self.subscription(id, HandlerKind::Event)
    }

    /// Registers a handler for connected/disconnected transitions.
    ///
    /// Handlers run while further transitions are held back and must not
    /// call [`disconnect`](Self::disconnect).
    pub fn on_connection_change(
        &self,
        handler: impl Fn(bool) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_handler.fetch_add(1, Ordering::Relaxed);
        self.inner.connectivity_handlers.insert(id, Arc::new(handler));
        self.subscription(id, HandlerKind::Connectivity)
    }

    fn subscription(&self, id: u64, kind: HandlerKind) -> Subscription {
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
            kind,
            active: true,
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(cancel) = self.inner.session().cancel.take() {
            cancel.cancel();
        }
    }
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, SessionSlot> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `next` if `generation` still owns the session.
    fn transition(&self, generation: u64, next: ConnectionState) -> bool {
        let slot = self.session();
        if !slot.is_current(generation) {
            return false;
        }
        self.state.send_replace(next);
        true
    }

    fn attach(&self, generation: u64, outbound: mpsc::Sender<String>) -> bool {
        let mut slot = self.session();
        if !slot.is_current(generation) {
            return false;
        }
        slot.outbound = Some(outbound);
        self.state.send_replace(ConnectionState::Connected);
        true
    }

    fn connectivity_gate(&self) -> MutexGuard<'_, ()> {
        self.connectivity.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reports the handshake unless a `disconnect` got in after `attach`.
    fn announce_connected(&self, generation: u64) -> bool {
        let _gate = self.connectivity_gate();
        if !self.session().is_current(generation) {
            return false;
        }
        self.notify_connectivity(true);
        true
    }

    /// Moves to `Reconnecting` and reports the loss, if still current.
    fn announce_lost(&self, generation: u64) -> bool {
        let _gate = self.connectivity_gate();
        if !self.transition(generation, ConnectionState::Reconnecting) {
            return false;
        }
        self.notify_connectivity(false);
        true
    }

    fn detach(&self, generation: u64) {
        let mut slot = self.session();
        if slot.is_current(generation) {
            slot.outbound = None;
        }
    }

    fn dispatch(&self, event: &InboundEvent) {
        let mut handlers: Vec<(u64, EventHandler)> = self
            .event_handlers
            .iter()
            .map(|h| (*h.key(), Arc::clone(h.value())))
            .collect();
        handlers.sort_by_key(|(id, _)| *id);
        for (_, handler) in handlers {
            handler(event);
        }
    }

    fn notify_connectivity(&self, connected: bool) {
        let mut handlers: Vec<(u64, ConnectivityHandler)> = self
            .connectivity_handlers
            .iter()
            .map(|h| (*h.key(), Arc::clone(h.value())))
            .collect();
        handlers.sort_by_key(|(id, _)| *id);
        for (_, handler) in handlers {
            handler(connected);
        }
    }

    /// Delivers frames until the channel closes (`Some`) or the session is
    /// cancelled (`None`).
    async fn pump(
        &self,
        inbound: &mut mpsc::Receiver<ChannelFrame>,
        cancel: &CancellationToken,
    ) -> Option<(u16, String)> {
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                frame = inbound.recv() => frame,
            };
            match frame {
                Some(ChannelFrame::Text(text)) => match InboundEvent::parse(&text) {
                    Ok(event) => {
                        debug!(kind = event.kind(), conversation = ?event.conversation_id(), "event received");
                        self.dispatch(&event);
                    }
                    Err(e) => {
                        warn!(error = %e, bytes = text.len(), "dropping malformed inbound frame");
                    }
                },
                Some(ChannelFrame::Closed { code, reason }) => {
                    return Some((code.unwrap_or(ABNORMAL_CLOSURE), reason));
                }
                None => return Some((ABNORMAL_CLOSURE, String::new())),
            }
        }
    }
}

async fn supervise(
    inner: Arc<Inner>,
    token: SecretString,
    generation: u64,
    cancel: CancellationToken,
) {
    let endpoint = inner.options.endpoint.clone();
    let delay = inner.options.reconnect_delay;
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        if !inner.transition(generation, ConnectionState::Connecting) {
            return;
        }
        info!(endpoint = %endpoint, attempt, "connecting");

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            opened = inner.connector.open(&endpoint, &token) => opened,
        };

        match opened {
            Ok(DuplexChannel {
                outbound,
                mut inbound,
            }) => {
                if !inner.attach(generation, outbound) {
                    return;
                }
                if !inner.announce_connected(generation) {
                    return;
                }
                info!(endpoint = %endpoint, attempt, "handshake complete");
                attempt = 0;

                let Some((code, reason)) = inner.pump(&mut inbound, &cancel).await else {
                    return;
                };
                drop(inbound);
                inner.detach(generation);

                info!(code, reason = %reason, "channel closed");
                if code == ABNORMAL_CLOSURE {
                    warn!(
                        endpoint = %endpoint,
                        "abnormal closure (1006): the connection dropped without a close frame; \
                         check network reachability, proxies, and token validity"
                    );
                }
                if !inner.announce_lost(generation) {
                    return;
                }
            }
            Err(e) => {
                warn!(endpoint = %endpoint, attempt, error = %e, "connect attempt failed");
                if !inner.transition(generation, ConnectionState::Reconnecting) {
                    return;
                }
            }
        }

        info!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
