// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket connector for the real-time event stream.
//!
//! The bearer token is carried in the subprotocol list of the handshake as
//! `["access_token", <token>]`. After the upgrade the socket is split into a
//! reader task and a writer task bridged to the [`DuplexChannel`] queues.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tracing::{debug, warn};

use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::{ChannelFrame, DuplexChannel, DuplexConnector};

/// First entry of the subprotocol list; the server echoes it back.
pub const ACCESS_TOKEN_PROTOCOL: &str = "access_token";

const DEFAULT_BUFFER: usize = 256;

/// Opens duplex channels over tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsConnector {
    buffer: usize,
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the upgrade request carrying the token as a subprotocol.
pub fn handshake_request(endpoint: &str, token: &SecretString) -> Result<Request, RelayDeskError> {
    let mut request = endpoint
        .into_client_request()
        .map_err(|e| RelayDeskError::Connection {
            message: format!("invalid duplex endpoint `{endpoint}`: {e}"),
            source: Some(Box::new(e)),
        })?;

    let protocols = format!("{ACCESS_TOKEN_PROTOCOL}, {}", token.expose_secret());
    let value = HeaderValue::from_str(&protocols).map_err(|e| RelayDeskError::Connection {
        message: "bearer token is not a valid subprotocol value".to_string(),
        source: Some(Box::new(e)),
    })?;
    request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    Ok(request)
}

#[async_trait]
impl DuplexConnector for WsConnector {
    fn validate(&self, endpoint: &str, token: &SecretString) -> Result<(), RelayDeskError> {
        handshake_request(endpoint, token).map(|_| ())
    }

    async fn open(
        &self,
        endpoint: &str,
        token: &SecretString,
    ) -> Result<DuplexChannel, RelayDeskError> {
        let request = handshake_request(endpoint, token)?;
        let (socket, response) =
            connect_async(request)
                .await
                .map_err(|e| RelayDeskError::Connection {
                    message: format!("handshake with {endpoint} failed: {e}"),
                    source: Some(Box::new(e)),
                })?;
        debug!(endpoint, status = %response.status(), "duplex handshake complete");

        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(self.buffer);
        let (inbound_tx, inbound_rx) = mpsc::channel(self.buffer);

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::text(text)).await {
                    warn!(error = %e, "duplex write failed");
                    break;
                }
            }
            // Sender dropped: the consumer is done with this channel.
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            let last = loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx
                            .send(ChannelFrame::Text(text.as_str().to_string()))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => ChannelFrame::Closed {
                                code: Some(u16::from(frame.code)),
                                reason: frame.reason.as_str().to_string(),
                            },
                            None => ChannelFrame::Closed {
                                code: None,
                                reason: String::new(),
                            },
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        break ChannelFrame::Closed {
                            code: None,
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        break ChannelFrame::Closed {
                            code: None,
                            reason: "stream ended".to_string(),
                        };
                    }
                }
            };
            let _ = inbound_tx.send(last).await;
        });

        Ok(DuplexChannel {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
