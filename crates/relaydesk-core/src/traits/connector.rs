// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duplex channel connector trait for the real-time event stream.

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::mpsc;

use crate::error::RelayDeskError;

/// A frame observed on the inbound half of an open duplex channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFrame {
    /// A text payload (expected to be a JSON event).
    Text(String),
    /// The channel was closed. `code` is absent when the transport dropped
    /// without a close handshake.
    Closed { code: Option<u16>, reason: String },
}

/// An open duplex channel.
///
/// The connector owns the underlying transport; the connection manager only
/// sees these two queues. Dropping `outbound` asks the transport to close.
#[derive(Debug)]
pub struct DuplexChannel {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<ChannelFrame>,
}

/// Opens authenticated duplex channels to the event endpoint.
///
/// The bearer token travels in the handshake's subprotocol negotiation,
/// never in an ad-hoc header.
#[async_trait]
pub trait DuplexConnector: Send + Sync + 'static {
    /// Checks that a channel could be constructed for `endpoint` and `token`
    /// without touching the network. A failure here aborts the connect
    /// attempt instead of scheduling a reconnect.
    fn validate(&self, _endpoint: &str, _token: &SecretString) -> Result<(), RelayDeskError> {
        Ok(())
    }

    /// Performs the handshake and returns the open channel.
    async fn open(
        &self,
        endpoint: &str,
        token: &SecretString,
    ) -> Result<DuplexChannel, RelayDeskError>;
}
