// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock duplex connector for deterministic connection tests.
//!
//! `MockConnector` implements `DuplexConnector` without a network. Every open
//! attempt is recorded with its (paused-clock) timestamp; the test side can
//! push frames into the live session, close it with a code, or refuse the
//! next handshakes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::Instant;

use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::{ChannelFrame, DuplexChannel, DuplexConnector};

const CHANNEL_CAPACITY: usize = 64;

/// One call to `open`, successful or not.
#[derive(Debug, Clone)]
pub struct OpenAttempt {
    pub endpoint: String,
    pub token: String,
    pub at: Instant,
    pub accepted: bool,
}

struct Session {
    inbound: mpsc::Sender<ChannelFrame>,
    outbound: mpsc::Receiver<String>,
}

/// A connector whose sessions are driven by the test.
pub struct MockConnector {
    attempts: Mutex<Vec<OpenAttempt>>,
    attempt_count: watch::Sender<usize>,
    refusals: AtomicUsize,
    malformed: AtomicBool,
    session: Mutex<Option<Session>>,
    sent: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            attempt_count: watch::Sender::new(0),
            refusals: AtomicUsize::new(0),
            malformed: AtomicBool::new(false),
            session: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` handshakes with a connection error.
    pub fn refuse_next(&self, n: usize) {
        self.refusals.store(n, Ordering::SeqCst);
    }

    /// Make channel construction fail before any handshake is attempted.
    pub fn reject_construction(&self, reject: bool) {
        self.malformed.store(reject, Ordering::SeqCst);
    }

    /// Every open attempt so far.
    pub async fn attempts(&self) -> Vec<OpenAttempt> {
        self.attempts.lock().await.clone()
    }

    pub fn attempt_count(&self) -> usize {
        *self.attempt_count.borrow()
    }

    /// Wait until at least `n` open attempts have been made.
    pub async fn wait_for_attempts(&self, n: usize) {
        let _ = self
            .attempt_count
            .subscribe()
            .wait_for(|count| *count >= n)
            .await;
    }

    /// Whether the last accepted session is still held by the consumer.
    pub async fn is_open(&self) -> bool {
        match self.session.lock().await.as_ref() {
            Some(session) => !session.inbound.is_closed(),
            None => false,
        }
    }

    /// Deliver a raw text frame. Returns false when no session is open.
    pub async fn push_text(&self, text: impl Into<String>) -> bool {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(s) => s.inbound.send(ChannelFrame::Text(text.into())).await.is_ok(),
            None => false,
        }
    }

    /// Deliver a JSON event frame.
    pub async fn push_event(&self, event: serde_json::Value) -> bool {
        self.push_text(event.to_string()).await
    }

    /// Close the live session with a close frame carrying `code`.
    pub async fn close(&self, code: u16, reason: &str) {
        if let Some(session) = self.session.lock().await.take() {
            let _ = session
                .inbound
                .send(ChannelFrame::Closed {
                    code: Some(code),
                    reason: reason.to_string(),
                })
                .await;
        }
    }

    /// Drop the live session without a close frame, like a dead network.
    pub async fn drop_transport(&self) {
        self.session.lock().await.take();
    }

    /// Frames the consumer sent on the live session so far.
    pub async fn sent_frames(&self) -> Vec<String> {
        let mut sent = self.sent.lock().await;
        if let Some(session) = self.session.lock().await.as_mut() {
            while let Ok(frame) = session.outbound.try_recv() {
                sent.push(frame);
            }
        }
        sent.clone()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DuplexConnector for MockConnector {
    fn validate(&self, endpoint: &str, _token: &SecretString) -> Result<(), RelayDeskError> {
        if self.malformed.load(Ordering::SeqCst) {
            return Err(RelayDeskError::connection(format!(
                "cannot build channel for {endpoint}"
            )));
        }
        Ok(())
    }

    async fn open(
        &self,
        endpoint: &str,
        token: &SecretString,
    ) -> Result<DuplexChannel, RelayDeskError> {
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        self.attempts.lock().await.push(OpenAttempt {
            endpoint: endpoint.to_string(),
            token: token.expose_secret().to_string(),
            at: Instant::now(),
            accepted: !refused,
        });
        self.attempt_count.send_modify(|count| *count += 1);

        if refused {
            return Err(RelayDeskError::connection("handshake refused"));
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        *self.session.lock().await = Some(Session {
            inbound: inbound_tx,
            outbound: outbound_rx,
        });
        Ok(DuplexChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> SecretString {
        SecretString::from("tok-1".to_string())
    }

    #[tokio::test]
    async fn open_records_attempt_and_delivers_frames() {
        let connector = MockConnector::new();
        let mut channel = connector.open("ws://x/ws", &token()).await.unwrap();

        let attempts = connector.attempts().await;
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].token, "tok-1");
        assert!(attempts[0].accepted);

        assert!(connector.push_text("{}").await);
        assert_eq!(
            channel.inbound.recv().await,
            Some(ChannelFrame::Text("{}".to_string()))
        );

        channel.outbound.send("ping".to_string()).await.unwrap();
        assert_eq!(connector.sent_frames().await, vec!["ping".to_string()]);
    }

    #[tokio::test]
    async fn refused_open_is_recorded() {
        let connector = MockConnector::new();
        connector.refuse_next(1);
        assert!(connector.open("ws://x/ws", &token()).await.is_err());
        assert!(connector.open("ws://x/ws", &token()).await.is_ok());

        let attempts = connector.attempts().await;
        assert!(!attempts[0].accepted);
        assert!(attempts[1].accepted);
        assert_eq!(connector.attempt_count(), 2);
    }

    #[tokio::test]
    async fn close_sends_code_and_ends_session() {
        let connector = MockConnector::new();
        let mut channel = connector.open("ws://x/ws", &token()).await.unwrap();
        connector.close(1006, "abnormal").await;

        assert_eq!(
            channel.inbound.recv().await,
            Some(ChannelFrame::Closed {
                code: Some(1006),
                reason: "abnormal".to_string()
            })
        );
        assert_eq!(channel.inbound.recv().await, None);
        assert!(!connector.is_open().await);
    }

    #[tokio::test]
    async fn dropped_consumer_reports_closed() {
        let connector = MockConnector::new();
        let channel = connector.open("ws://x/ws", &token()).await.unwrap();
        assert!(connector.is_open().await);
        drop(channel);
        assert!(!connector.is_open().await);
    }
}
