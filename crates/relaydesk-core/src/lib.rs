// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the relaydesk operator console.
//!
//! This crate provides the domain types, the error type, and the collaborator
//! traits (REST API, duplex connector, credential store, notifier) used by
//! the sync core and its adapters.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RelayDeskError;
pub use types::{
    ConnectionState, ConnectivityStatus, Conversation, ConversationFilter, ConversationId,
    ConversationStatus, EndUser, Message, MessageId, Operator, OperatorId,
};

// Re-export all collaborator traits at crate root.
pub use traits::{
    ChannelFrame, CredentialStore, DuplexChannel, DuplexConnector, Notifier, OperatorApi,
    SoundCue, SoundPlayer,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn conversation_json() -> serde_json::Value {
        serde_json::json!({
            "id": "7f1c1d2e-1111-4a5b-9c3d-000000000001",
            "telegram_user": {"id": 42, "first_name": "Ana", "username": "ana"},
            "user_id": null,
            "status": "waiting",
            "last_message_at": null,
            "unread_count": 3,
            "created_at": "2026-01-05T10:00:00Z"
        })
    }

    #[test]
    fn conversation_deserializes_from_api_shape() {
        let conv: Conversation = serde_json::from_value(conversation_json()).unwrap();
        assert_eq!(conv.status, ConversationStatus::Waiting);
        assert_eq!(conv.unread_count, 3);
        assert!(conv.assigned_operator.is_none());
        assert_eq!(conv.telegram_user.display_name(), "@ana");
    }

    #[test]
    fn temporary_ids_are_distinguishable() {
        let temp = MessageId::temporary();
        assert!(temp.is_temporary());
        assert!(temp.to_string().starts_with("temp-"));

        let server = MessageId::from_str("7f1c1d2e-1111-4a5b-9c3d-000000000001").unwrap();
        assert!(!server.is_temporary());
        assert_ne!(temp, server);
    }

    #[test]
    fn message_id_rejects_garbage() {
        assert!(MessageId::from_str("temp-not-a-uuid").is_err());
        assert!(serde_json::from_str::<MessageId>("\"nope\"").is_err());
    }

    #[test]
    fn message_wire_flag_maps_to_from_operator() {
        let msg: Message = serde_json::from_value(serde_json::json!({
            "id": "7f1c1d2e-1111-4a5b-9c3d-0000000000aa",
            "conversation_id": "7f1c1d2e-1111-4a5b-9c3d-000000000001",
            "from_user": false,
            "content": "hello",
            "read": false,
            "created_at": "2026-01-05T10:00:00Z"
        }))
        .unwrap();
        assert!(!msg.from_operator);
        assert!(msg.media_type.is_none());
    }

    #[test]
    fn status_transitions_are_monotonic() {
        use ConversationStatus::*;
        assert!(Waiting.can_transition_to(Active));
        assert!(Active.can_transition_to(Closed));
        assert!(Closed.can_transition_to(Closed));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Active.can_transition_to(Waiting));
        assert!(Closed.is_terminal());
    }

    #[test]
    fn status_display_matches_wire_format() {
        assert_eq!(ConversationStatus::Active.to_string(), "active");
        assert_eq!(
            ConversationStatus::from_str("closed").unwrap(),
            ConversationStatus::Closed
        );
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }

    #[test]
    fn filter_admits_by_status_and_operator() {
        let mut conv: Conversation = serde_json::from_value(conversation_json()).unwrap();
        let operator = OperatorId(uuid::Uuid::new_v4());

        let waiting = ConversationFilter {
            status: Some(ConversationStatus::Waiting),
            ..Default::default()
        };
        assert!(waiting.admits(&conv));

        let mine = ConversationFilter {
            operator: Some(operator),
            ..Default::default()
        };
        assert!(!mine.admits(&conv));
        conv.assigned_operator = Some(operator);
        assert!(mine.admits(&conv));
    }

    #[test]
    fn mutation_error_reports_unauthorized_source() {
        let err = RelayDeskError::mutation("assign conversation", RelayDeskError::Unauthorized);
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "assign conversation failed: unauthorized");
    }

    #[test]
    fn silent_collaborators_accept_calls() {
        let silent = traits::notifier::Silent;
        silent.notify("title", "body");
        silent.play(SoundCue::IncomingMessage);
    }
}
