// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time sync core for the relaydesk operator console.
//!
//! Server-originated facts arrive on the duplex channel owned by the
//! [`ConnectionManager`], are mapped to cache scopes by [`route`], and mark
//! [`QueryCache`] entries stale so a background refetch replaces them.
//! Locally initiated changes go through the [`MutationCoordinator`], which
//! patches the same cache speculatively and rolls back on failure.
//! [`StatusProjection`] turns the raw connected signal into a debounced label.
//! [`SyncEngine`] wires all of it for one console session.

pub mod cache;
pub mod connection;
pub mod engine;
pub mod events;
pub mod mutation;
pub mod router;
pub mod status;

pub use cache::{CachedValue, KeyScope, QueryCache, QueryKey, Snapshot};
pub use connection::{ConnectionManager, ConnectionOptions, Subscription};
pub use engine::{SyncEngine, SyncOptions, SyncParts};
pub use events::{Attachment, InboundEvent, ReportedStatus};
pub use mutation::{
    AssignConversation, ChangeStatus, CloseConversation, MarkRead, MutationCoordinator,
    MutationKind, MutationPhase, OptimisticMutation, PendingMutation, SendMessage,
};
pub use router::route;
pub use status::StatusProjection;
