// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST collaborator used by refetches and optimistic mutations.

use async_trait::async_trait;

use crate::error::RelayDeskError;
use crate::types::{
    Conversation, ConversationFilter, ConversationId, ConversationStatus, Message, Operator,
    OperatorId,
};

/// Authoritative source for conversations, messages, and operators.
///
/// Reads are issued by cache refetches; writes are issued by the mutation
/// coordinator after it has applied its speculative patch.
#[async_trait]
pub trait OperatorApi: Send + Sync + 'static {
    /// Lists conversations matching `filter`.
    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, RelayDeskError>;

    /// Fetches a single conversation.
    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, RelayDeskError>;

    /// Lists messages of a conversation in ascending `created_at` order.
    async fn list_messages(&self, conversation: ConversationId)
    -> Result<Vec<Message>, RelayDeskError>;

    /// Lists console operators.
    async fn list_operators(&self) -> Result<Vec<Operator>, RelayDeskError>;

    /// Sends an operator message into a conversation.
    async fn send_message(
        &self,
        conversation: ConversationId,
        content: &str,
    ) -> Result<Message, RelayDeskError>;

    /// Assigns a conversation to an operator.
    async fn assign_conversation(
        &self,
        conversation: ConversationId,
        operator: OperatorId,
    ) -> Result<Conversation, RelayDeskError>;

    /// Changes the status of a conversation.
    async fn update_status(
        &self,
        conversation: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, RelayDeskError>;

    /// Closes a conversation.
    async fn close_conversation(
        &self,
        conversation: ConversationId,
    ) -> Result<Conversation, RelayDeskError>;

    /// Resets the unread counter of a conversation.
    async fn mark_read(&self, conversation: ConversationId)
    -> Result<Conversation, RelayDeskError>;
}
