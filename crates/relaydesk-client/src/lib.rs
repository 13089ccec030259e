// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound adapters for the relaydesk operator console.
//!
//! - [`ApiClient`]: reqwest-backed REST collaborator
//! - [`WsConnector`]: tokio-tungstenite duplex connector with subprotocol auth
//! - [`FileCredentialStore`]: bearer token persisted to disk
//! - [`resolve_endpoint`]: duplex endpoint selection per deployment mode

pub mod credentials;
pub mod endpoint;
pub mod rest;
pub mod ws;

pub use credentials::FileCredentialStore;
pub use endpoint::resolve_endpoint;
pub use rest::ApiClient;
pub use ws::WsConnector;
