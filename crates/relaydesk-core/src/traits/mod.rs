// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions consumed by the sync core.
//!
//! Every collaborator that talks to the outside world (REST API, duplex
//! channel, credential storage, desktop notifications) sits behind one of these
//! traits so the composition root can inject real or mock implementations.

pub mod api;
pub mod connector;
pub mod credentials;
pub mod notifier;

// Re-export all traits at the traits module level for convenience.
pub use api::OperatorApi;
pub use connector::{ChannelFrame, DuplexChannel, DuplexConnector};
pub use credentials::CredentialStore;
pub use notifier::{Notifier, SoundCue, SoundPlayer};
