// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handshake and frame bridging against a local WebSocket server.

use futures::{SinkExt, StreamExt};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use relaydesk_client::WsConnector;
use relaydesk_core::traits::{ChannelFrame, DuplexConnector};

#[tokio::test]
async fn token_travels_as_subprotocol_and_frames_are_bridged() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel::<Option<String>>();
    let (echo_tx, echo_rx) = oneshot::channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            let protocols = req
                .headers()
                .get("sec-websocket-protocol")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let _ = seen_tx.send(protocols);
            resp.headers_mut().insert(
                "sec-websocket-protocol",
                HeaderValue::from_static("access_token"),
            );
            Ok(resp)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();

        ws.send(Message::text(r#"{"type":"new_conversation"}"#))
            .await
            .unwrap();

        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let _ = echo_tx.send(text.as_str().to_string());
                break;
            }
        }

        let _ = ws
            .close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "bye".into(),
            }))
            .await;
        while ws.next().await.is_some() {}
    });

    let token = SecretString::from("eyJ.test.token".to_string());
    let mut channel = WsConnector::new()
        .open(&format!("ws://{addr}/ws"), &token)
        .await
        .expect("handshake should succeed");

    assert_eq!(
        seen_rx.await.unwrap().as_deref(),
        Some("access_token, eyJ.test.token")
    );

    assert_eq!(
        channel.inbound.recv().await,
        Some(ChannelFrame::Text(r#"{"type":"new_conversation"}"#.to_string()))
    );

    channel.outbound.send("hello".to_string()).await.unwrap();
    assert_eq!(echo_rx.await.unwrap(), "hello");

    match channel.inbound.recv().await {
        Some(ChannelFrame::Closed { code, reason }) => {
            assert_eq!(code, Some(1001));
            assert_eq!(reason, "bye");
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}
