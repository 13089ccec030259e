// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debounced connectivity label derived from the raw connected signal.
//!
//! A drop from connected shows `Reconnecting` and starts a grace timer.
//! If the channel comes back first, the label flips to `Connected` and the
//! timer is discarded. If it does not, the label stays `Reconnecting`; the
//! timer only flags the outage as prolonged. `Disconnected` is shown before
//! the first connection and after a manual stop, never as the result of a
//! short blip.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{Instrument, info, warn};

use relaydesk_core::types::ConnectivityStatus;

/// Grace period before an outage is flagged as prolonged.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

#[derive(Default)]
struct TimerState {
    timer: Option<AbortHandle>,
    prolonged: bool,
}

struct Inner {
    grace: Duration,
    status: watch::Sender<ConnectivityStatus>,
    state: Mutex<TimerState>,
}

/// UI-facing connectivity projection.
#[derive(Clone)]
pub struct StatusProjection {
    inner: Arc<Inner>,
}

impl StatusProjection {
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                grace,
                status: watch::Sender::new(ConnectivityStatus::Disconnected),
                state: Mutex::new(TimerState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, TimerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ConnectivityStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.inner.status.subscribe()
    }

    /// Whether the current outage has outlived the grace period.
    pub fn is_prolonged(&self) -> bool {
        self.state().prolonged
    }

    /// Feeds one raw connected/disconnected transition.
    pub fn on_connection_change(&self, connected: bool) {
        let mut state = self.state();
        if connected {
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.prolonged = false;
            self.inner.status.send_replace(ConnectivityStatus::Connected);
            return;
        }

        if self.status() != ConnectivityStatus::Connected {
            return;
        }
        self.inner
            .status
            .send_replace(ConnectivityStatus::Reconnecting);
        state.prolonged = false;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.timer = self.start_grace_timer();
    }

    /// Shows `Disconnected` after a manual stop.
    pub fn mark_offline(&self) {
        let mut state = self.state();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.prolonged = false;
        self.inner
            .status
            .send_replace(ConnectivityStatus::Disconnected);
    }

    fn start_grace_timer(&self) -> Option<AbortHandle> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let projection = self.clone();
        let grace = self.inner.grace;
        let handle = runtime.spawn(
            async move {
                tokio::time::sleep(grace).await;
                let mut state = projection.state();
                if projection.status() == ConnectivityStatus::Reconnecting {
                    state.prolonged = true;
                    state.timer = None;
                    warn!(
                        grace_secs = grace.as_secs(),
                        "still reconnecting after grace period"
                    );
                }
            }
            .in_current_span(),
        );
        info!(grace_secs = grace.as_secs(), "connection lost, reconnecting");
        Some(handle.abort_handle())
    }
}

impl Default for StatusProjection {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE)
    }
}
