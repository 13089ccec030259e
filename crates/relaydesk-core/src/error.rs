// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the relaydesk sync core.

use thiserror::Error;

/// The primary error type used across relaydesk collaborators and the sync core.
///
/// None of these variants is fatal to the process: every path that produces
/// one returns control to the caller.
#[derive(Debug, Error)]
pub enum RelayDeskError {
    /// Configuration errors (invalid endpoint, missing origin, bad header value).
    #[error("configuration error: {0}")]
    Config(String),

    /// A connect attempt was aborted before the channel could be opened
    /// (no credential available, or the channel could not be constructed).
    #[error("connection error: {message}")]
    Connection {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An inbound frame could not be parsed into a recognised event.
    #[error("protocol error: {message}")]
    Protocol {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An optimistic mutation failed on the server and was rolled back.
    #[error("{kind} failed: {source}")]
    Mutation {
        kind: String,
        #[source]
        source: Box<RelayDeskError>,
    },

    /// The REST API answered with a non-success status or could not be reached.
    #[error("api error: {message}")]
    Api { status: Option<u16>, message: String },

    /// The REST API rejected the bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// An outbound frame was sent while the duplex channel was not open.
    #[error("duplex channel is not connected")]
    NotConnected,

    /// A conversation status change that would leave a terminal state.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Credential store read/write failure.
    #[error("credential store error: {message}")]
    Credentials {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayDeskError {
    /// Wraps a collaborator failure as the error surfaced by a rolled-back mutation.
    pub fn mutation(kind: impl Into<String>, source: RelayDeskError) -> Self {
        Self::Mutation {
            kind: kind.into(),
            source: Box::new(source),
        }
    }

    /// Shorthand for a connection error without an underlying cause.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when the failure (or the failure it wraps) is an auth rejection.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Unauthorized => true,
            Self::Mutation { source, .. } => source.is_unauthorized(),
            _ => false,
        }
    }
}
