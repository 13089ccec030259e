// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound event shapes pushed over the duplex channel.
//!
//! Every frame is a JSON object whose `type` field selects one of twelve
//! variants. Anything else (including well-formed JSON with an unknown tag)
//! is a protocol error and the frame is dropped by the connection manager.

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use relaydesk_core::RelayDeskError;
use relaydesk_core::types::{ConversationId, ConversationStatus, OperatorId};
use uuid::Uuid;

/// Optional attachment metadata carried by message events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
}

impl Attachment {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Status label carried by a status-change event.
///
/// Labels this console does not model yet are kept verbatim rather than
/// failing the whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportedStatus {
    Known(ConversationStatus),
    Other(String),
}

impl ReportedStatus {
    pub fn known(&self) -> Option<ConversationStatus> {
        match self {
            Self::Known(status) => Some(*status),
            Self::Other(_) => None,
        }
    }
}

impl From<ConversationStatus> for ReportedStatus {
    fn from(status: ConversationStatus) -> Self {
        Self::Known(status)
    }
}

/// A server-originated fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InboundEvent {
    /// An end user wrote into a conversation.
    MessageReceived {
        conversation_id: ConversationId,
        message_id: Uuid,
        content: String,
        telegram_user_id: i64,
        telegram_user_name: String,
        #[serde(flatten)]
        attachment: Attachment,
    },
    /// An operator message was delivered.
    MessageSent {
        conversation_id: ConversationId,
        message_id: Uuid,
        content: String,
        user_id: OperatorId,
        user_name: String,
        #[serde(flatten)]
        attachment: Attachment,
    },
    ConversationCreated {
        conversation_id: ConversationId,
        telegram_user_id: i64,
        telegram_user_name: String,
    },
    ConversationStatusChanged {
        conversation_id: ConversationId,
        status: ReportedStatus,
        #[serde(default)]
        user_id: Option<OperatorId>,
    },
    ConversationAssigned {
        conversation_id: ConversationId,
        user_id: OperatorId,
        user_name: String,
    },
    ConversationClosed {
        conversation_id: ConversationId,
    },
    /// An operator is typing.
    UserTyping {
        conversation_id: ConversationId,
        user_id: OperatorId,
        user_name: String,
    },
    /// The end user is typing.
    TelegramUserTyping {
        conversation_id: ConversationId,
        telegram_user_id: i64,
    },
    UserOnline {
        user_id: OperatorId,
        user_name: String,
    },
    UserOffline {
        user_id: OperatorId,
    },
    MessageRead {
        message_id: Uuid,
        conversation_id: ConversationId,
    },
    /// A server-side error reported over the channel.
    Error { message: String, code: String },
}

impl InboundEvent {
    /// Parses one text frame.
    pub fn parse(frame: &str) -> Result<Self, RelayDeskError> {
        serde_json::from_str(frame).map_err(|e| RelayDeskError::Protocol {
            message: format!("unrecognised inbound frame: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// The wire discriminant, e.g. `message_received`.
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// The conversation this event concerns, if any.
    pub fn conversation_id(&self) -> Option<ConversationId> {
        match self {
            Self::MessageReceived {
                conversation_id, ..
            }
            | Self::MessageSent {
                conversation_id, ..
            }
            | Self::ConversationCreated {
                conversation_id, ..
            }
            | Self::ConversationStatusChanged {
                conversation_id, ..
            }
            | Self::ConversationAssigned {
                conversation_id, ..
            }
            | Self::ConversationClosed { conversation_id }
            | Self::UserTyping {
                conversation_id, ..
            }
            | Self::TelegramUserTyping {
                conversation_id, ..
            }
            | Self::MessageRead {
                conversation_id, ..
            } => Some(*conversation_id),
            Self::UserOnline { .. } | Self::UserOffline { .. } | Self::Error { .. } => None,
        }
    }

    /// Whether the event only drives a transient UI hint.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::UserTyping { .. } | Self::TelegramUserTyping { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CID: &str = "7f1c1d2e-1111-4a5b-9c3d-000000000001";
    const UID: &str = "7f1c1d2e-1111-4a5b-9c3d-0000000000ff";

    #[test]
    fn message_received_with_media() {
        let frame = json!({
            "type": "message_received",
            "conversation_id": CID,
            "message_id": "7f1c1d2e-1111-4a5b-9c3d-0000000000aa",
            "content": "photo",
            "telegram_user_id": 99,
            "telegram_user_name": "ana",
            "media_type": "photo",
            "file_size": 2048
        })
        .to_string();

        let event = InboundEvent::parse(&frame).unwrap();
        assert_eq!(event.kind(), "message_received");
        assert_eq!(event.conversation_id().unwrap().to_string(), CID);
        match event {
            InboundEvent::MessageReceived { attachment, .. } => {
                assert_eq!(attachment.media_type.as_deref(), Some("photo"));
                assert_eq!(attachment.file_size, Some(2048));
                assert!(attachment.media_url.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn plain_message_has_empty_attachment() {
        let frame = json!({
            "type": "message_sent",
            "conversation_id": CID,
            "message_id": "7f1c1d2e-1111-4a5b-9c3d-0000000000ab",
            "content": "hi",
            "user_id": UID,
            "user_name": "Op"
        })
        .to_string();
        match InboundEvent::parse(&frame).unwrap() {
            InboundEvent::MessageSent { attachment, .. } => assert!(attachment.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn status_change_parses_status_enum() {
        let frame = json!({
            "type": "conversation_status_changed",
            "conversation_id": CID,
            "status": "closed",
            "user_id": null
        })
        .to_string();
        assert_eq!(
            InboundEvent::parse(&frame).unwrap(),
            InboundEvent::ConversationStatusChanged {
                conversation_id: CID.parse().unwrap(),
                status: ReportedStatus::Known(ConversationStatus::Closed),
                user_id: None,
            }
        );
    }

    #[test]
    fn status_change_keeps_unknown_labels() {
        let frame = json!({
            "type": "conversation_status_changed",
            "conversation_id": CID,
            "status": "escalated",
        })
        .to_string();
        let event = InboundEvent::parse(&frame).unwrap();
        match &event {
            InboundEvent::ConversationStatusChanged { status, user_id, .. } => {
                assert_eq!(status, &ReportedStatus::Other("escalated".to_string()));
                assert_eq!(status.known(), None);
                assert!(user_id.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(event.conversation_id(), Some(CID.parse().unwrap()));
    }

    #[test]
    fn presence_and_error_have_no_conversation() {
        let online = InboundEvent::parse(
            &json!({"type": "user_online", "user_id": UID, "user_name": "Op"}).to_string(),
        )
        .unwrap();
        assert!(online.conversation_id().is_none());

        let error = InboundEvent::parse(
            &json!({"type": "error", "message": "boom", "code": "E1"}).to_string(),
        )
        .unwrap();
        assert_eq!(error.kind(), "error");
        assert!(error.conversation_id().is_none());
    }

    #[test]
    fn typing_is_transient() {
        let typing = InboundEvent::parse(
            &json!({"type": "telegram_user_typing", "conversation_id": CID, "telegram_user_id": 5})
                .to_string(),
        )
        .unwrap();
        assert!(typing.is_transient());
        assert_eq!(typing.kind(), "telegram_user_typing");
    }

    #[test]
    fn unknown_tags_are_protocol_errors() {
        let bot = json!({"type": "bot_status", "status": "running"}).to_string();
        assert!(matches!(
            InboundEvent::parse(&bot),
            Err(RelayDeskError::Protocol { .. })
        ));
        assert!(InboundEvent::parse("not json").is_err());
        assert!(InboundEvent::parse(r#"{"conversation_id": "x"}"#).is_err());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let frame = json!({"type": "conversation_closed"}).to_string();
        assert!(InboundEvent::parse(&frame).is_err());
    }
}
