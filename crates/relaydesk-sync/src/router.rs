// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event router: inbound event -> cache scopes to invalidate.

use crate::cache::KeyScope;
use crate::events::InboundEvent;

/// Returns the cache scopes an event makes stale, in invalidation order.
///
/// Pure: no cache access, no I/O. Typing indicators and server error events
/// invalidate nothing.
pub fn route(event: &InboundEvent) -> Vec<KeyScope> {
    match event {
        InboundEvent::MessageReceived {
            conversation_id, ..
        }
        | InboundEvent::MessageSent {
            conversation_id, ..
        }
        | InboundEvent::MessageRead {
            conversation_id, ..
        } => vec![
            KeyScope::Messages(*conversation_id),
            KeyScope::AllConversations,
        ],
        InboundEvent::ConversationCreated { .. }
        | InboundEvent::ConversationStatusChanged { .. }
        | InboundEvent::ConversationAssigned { .. }
        | InboundEvent::ConversationClosed { .. } => vec![KeyScope::AllConversations],
        InboundEvent::UserOnline { .. } | InboundEvent::UserOffline { .. } => {
            vec![KeyScope::Users]
        }
        InboundEvent::UserTyping { .. }
        | InboundEvent::TelegramUserTyping { .. }
        | InboundEvent::Error { .. } => Vec::new(),
    }
}
