// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity builders shared by the sync-core tests.

use chrono::Utc;
use uuid::Uuid;

use relaydesk_core::types::{
    Conversation, ConversationId, ConversationStatus, EndUser, Message, MessageId, Operator,
    OperatorId,
};

/// A conversation with a fresh id, no assignee, and the given status.
pub fn conversation(status: ConversationStatus) -> Conversation {
    Conversation {
        id: ConversationId(Uuid::new_v4()),
        telegram_user: EndUser {
            id: 1001,
            username: Some("enduser".to_string()),
            first_name: "End".to_string(),
            last_name: Some("User".to_string()),
            photo_url: None,
            is_blocked: false,
        },
        assigned_operator: None,
        status,
        last_message_at: None,
        unread_count: 0,
        created_at: Utc::now(),
    }
}

/// A server-issued message written by the end user.
pub fn inbound_message(conversation_id: ConversationId, content: &str) -> Message {
    Message {
        id: MessageId::Server(Uuid::new_v4()),
        from_operator: false,
        read: false,
        ..Message::pending_outbound(conversation_id, content.to_string())
    }
}

/// A server-issued message written by an operator.
pub fn outbound_message(conversation_id: ConversationId, content: &str) -> Message {
    Message {
        id: MessageId::Server(Uuid::new_v4()),
        ..Message::pending_outbound(conversation_id, content.to_string())
    }
}

/// An active operator account.
pub fn operator(name: &str) -> Operator {
    Operator {
        id: OperatorId(Uuid::new_v4()),
        email: format!("{}@relaydesk.test", name.to_lowercase()),
        name: name.to_string(),
        is_operator: true,
        is_admin: false,
        is_active: true,
        last_seen_at: None,
        is_online: true,
        created_at: Utc::now(),
    }
}
