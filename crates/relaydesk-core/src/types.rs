// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the REST collaborator, the cache, and the sync core.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Prefix that marks a client-synthesized message identity.
pub const TEMPORARY_ID_PREFIX: &str = "temp-";

/// Unique identifier for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub Uuid);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Unique identifier for an operator (a console user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub Uuid);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for OperatorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identity of a message.
///
/// Server identities are plain UUIDs. Messages synthesized by an optimistic
/// send carry a `Temporary` identity, serialized with the `temp-` prefix so it
/// can never collide with an authoritative one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageId {
    Server(Uuid),
    Temporary(Uuid),
}

impl MessageId {
    /// Generates a fresh client-side identity.
    pub fn temporary() -> Self {
        Self::Temporary(Uuid::new_v4())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Temporary(id) => write!(f, "{TEMPORARY_ID_PREFIX}{id}"),
        }
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(TEMPORARY_ID_PREFIX) {
            Some(rest) => Uuid::parse_str(rest).map(Self::Temporary),
            None => Uuid::parse_str(s).map(Self::Server),
        }
    }
}

impl TryFrom<String> for MessageId {
    type Error = uuid::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.to_string()
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self::Server(id)
    }
}

/// Lifecycle status of a conversation.
///
/// Transitions are monotonic: `Waiting -> Active -> Closed`, and `Closed` is terminal.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Waiting,
    Active,
    Closed,
}

impl ConversationStatus {
    /// Whether a conversation in this status may be moved to `next`.
    pub fn can_transition_to(self, next: ConversationStatus) -> bool {
        self <= next
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }
}

/// The end user on the far side of the messaging-bot relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_blocked: bool,
}

impl EndUser {
    /// `@username` when available, otherwise the full name.
    pub fn display_name(&self) -> String {
        match (&self.username, &self.last_name) {
            (Some(username), _) => format!("@{username}"),
            (None, Some(last)) => format!("{} {}", self.first_name, last),
            (None, None) => self.first_name.clone(),
        }
    }
}

/// A conversation as returned by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub telegram_user: EndUser,
    /// Operator the conversation is assigned to.
    #[serde(rename = "user_id", default)]
    pub assigned_operator: Option<OperatorId>,
    pub status: ConversationStatus,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
}

/// A single message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    /// `true` when written by an operator, `false` when it came from the end user.
    #[serde(rename = "from_user")]
    pub from_operator: bool,
    pub content: String,
    #[serde(default)]
    pub read: bool,
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
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Builds the speculative entity appended by an optimistic send.
    pub fn pending_outbound(conversation_id: ConversationId, content: String) -> Self {
        Self {
            id: MessageId::temporary(),
            conversation_id,
            from_operator: true,
            content,
            read: true,
            media_type: None,
            media_url: None,
            file_name: None,
            file_size: None,
            mime_type: None,
            duration: None,
            created_at: Utc::now(),
        }
    }
}

/// A console operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub is_operator: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
}

/// Filter applied to a conversations list query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConversationStatus>,
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<OperatorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ConversationFilter {
    /// Whether a conversation belongs in a list fetched with this filter.
    pub fn admits(&self, conversation: &Conversation) -> bool {
        if let Some(status) = self.status
            && conversation.status != status
        {
            return false;
        }
        if let Some(operator) = self.operator
            && conversation.assigned_operator != Some(operator)
        {
            return false;
        }
        true
    }
}

/// State of the duplex channel, driven only by the connection manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// UI-facing connectivity label derived from the raw connected signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectivityStatus {
    Connected,
    Reconnecting,
    #[default]
    Disconnected,
}
