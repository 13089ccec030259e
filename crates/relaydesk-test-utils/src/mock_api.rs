// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory REST collaborator for deterministic testing.
//!
//! `MockOperatorApi` keeps an authoritative copy of the server state, records
//! every call, and can hold or fail reads and writes independently so tests
//! can observe the speculative window of a mutation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::OperatorApi;
use relaydesk_core::types::{
    Conversation, ConversationFilter, ConversationId, ConversationStatus, Message, MessageId,
    Operator, OperatorId,
};

/// A call observed by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    ListConversations(ConversationFilter),
    GetConversation(ConversationId),
    ListMessages(ConversationId),
    ListOperators,
    SendMessage(ConversationId, String),
    Assign(ConversationId, OperatorId),
    UpdateStatus(ConversationId, ConversationStatus),
    Close(ConversationId),
    MarkRead(ConversationId),
}

impl ApiCall {
    /// Whether this call only reads server state.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::ListConversations(_)
                | Self::GetConversation(_)
                | Self::ListMessages(_)
                | Self::ListOperators
        )
    }
}

/// How the mock answers a failing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Unauthorized,
    Status(u16),
}

impl Failure {
    fn to_error(self) -> RelayDeskError {
        match self {
            Self::Unauthorized => RelayDeskError::Unauthorized,
            Self::Status(code) => RelayDeskError::Api {
                status: Some(code),
                message: format!("server answered {code}"),
            },
        }
    }
}

#[derive(Default)]
struct ServerState {
    conversations: Vec<Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    operators: Vec<Operator>,
}

impl ServerState {
    fn conversation_mut(
        &mut self,
        id: ConversationId,
    ) -> Result<&mut Conversation, RelayDeskError> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| not_found(id))
    }
}

fn not_found(id: ConversationId) -> RelayDeskError {
    RelayDeskError::Api {
        status: Some(404),
        message: format!("conversation {id} not found"),
    }
}

/// A mock REST API backed by in-memory server state.
pub struct MockOperatorApi {
    state: Mutex<ServerState>,
    calls: Mutex<Vec<ApiCall>>,
    read_failure: Mutex<Option<Failure>>,
    write_failure: Mutex<Option<Failure>>,
    reads_held: watch::Sender<bool>,
    writes_held: watch::Sender<bool>,
}

impl MockOperatorApi {
    /// Create a mock with empty server state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::default()),
            calls: Mutex::new(Vec::new()),
            read_failure: Mutex::new(None),
            write_failure: Mutex::new(None),
            reads_held: watch::Sender::new(false),
            writes_held: watch::Sender::new(false),
        }
    }

    /// Add a conversation to the server state.
    pub async fn insert_conversation(&self, conversation: Conversation) {
        self.state.lock().await.conversations.push(conversation);
    }

    /// Add a message to the server state, as if it arrived from the relay.
    pub async fn insert_message(&self, message: Message) {
        let mut state = self.state.lock().await;
        if let Ok(conv) = state.conversation_mut(message.conversation_id) {
            conv.last_message_at = Some(message.created_at);
            if !message.from_operator {
                conv.unread_count += 1;
            }
        }
        state
            .messages
            .entry(message.conversation_id)
            .or_default()
            .push(message);
    }

    /// Add an operator to the server state.
    pub async fn insert_operator(&self, operator: Operator) {
        self.state.lock().await.operators.push(operator);
    }

    /// Current server copy of a conversation.
    pub async fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        let state = self.state.lock().await;
        state.conversations.iter().find(|c| c.id == id).cloned()
    }

    /// Current server copy of a conversation's messages.
    pub async fn messages(&self, id: ConversationId) -> Vec<Message> {
        let state = self.state.lock().await;
        state.messages.get(&id).cloned().unwrap_or_default()
    }

    /// Every call received so far.
    pub async fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().await.clone()
    }

    /// Number of read calls received so far.
    pub async fn read_count(&self) -> usize {
        self.calls.lock().await.iter().filter(|c| c.is_read()).count()
    }

    /// Make every subsequent read fail (or succeed again with `None`).
    pub async fn fail_reads(&self, failure: Option<Failure>) {
        *self.read_failure.lock().await = failure;
    }

    /// Make every subsequent write fail (or succeed again with `None`).
    pub async fn fail_writes(&self, failure: Option<Failure>) {
        *self.write_failure.lock().await = failure;
    }

    /// Park reads after they are recorded until `release_reads` is called.
    pub fn hold_reads(&self) {
        self.reads_held.send_replace(true);
    }

    pub fn release_reads(&self) {
        self.reads_held.send_replace(false);
    }

    /// Park writes after they are recorded until `release_writes` is called.
    pub fn hold_writes(&self) {
        self.writes_held.send_replace(true);
    }

    pub fn release_writes(&self) {
        self.writes_held.send_replace(false);
    }

    async fn read(&self, call: ApiCall) -> Result<(), RelayDeskError> {
        self.calls.lock().await.push(call);
        let _ = self.reads_held.subscribe().wait_for(|held| !*held).await;
        match *self.read_failure.lock().await {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }

    async fn write(&self, call: ApiCall) -> Result<(), RelayDeskError> {
        self.calls.lock().await.push(call);
        let _ = self.writes_held.subscribe().wait_for(|held| !*held).await;
        match *self.write_failure.lock().await {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

impl Default for MockOperatorApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorApi for MockOperatorApi {
    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, RelayDeskError> {
        self.read(ApiCall::ListConversations(filter.clone())).await?;
        let state = self.state.lock().await;
        let search = filter.search.as_deref().map(str::to_lowercase);
        Ok(state
            .conversations
            .iter()
            .filter(|c| filter.admits(c))
            .filter(|c| match &search {
                Some(needle) => c.telegram_user.display_name().to_lowercase().contains(needle),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation, RelayDeskError> {
        self.read(ApiCall::GetConversation(id)).await?;
        let state = self.state.lock().await;
        state
            .conversations
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn list_messages(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>, RelayDeskError> {
        self.read(ApiCall::ListMessages(conversation)).await?;
        Ok(self.messages(conversation).await)
    }

    async fn list_operators(&self) -> Result<Vec<Operator>, RelayDeskError> {
        self.read(ApiCall::ListOperators).await?;
        Ok(self.state.lock().await.operators.clone())
    }

    async fn send_message(
        &self,
        conversation: ConversationId,
        content: &str,
    ) -> Result<Message, RelayDeskError> {
        self.write(ApiCall::SendMessage(conversation, content.to_string()))
            .await?;
        let mut state = self.state.lock().await;
        let conv = state.conversation_mut(conversation)?;
        let message = Message {
            id: MessageId::Server(Uuid::new_v4()),
            ..Message::pending_outbound(conversation, content.to_string())
        };
        conv.last_message_at = Some(message.created_at);
        state
            .messages
            .entry(conversation)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn assign_conversation(
        &self,
        conversation: ConversationId,
        operator: OperatorId,
    ) -> Result<Conversation, RelayDeskError> {
        self.write(ApiCall::Assign(conversation, operator)).await?;
        let mut state = self.state.lock().await;
        let conv = state.conversation_mut(conversation)?;
        conv.assigned_operator = Some(operator);
        conv.status = ConversationStatus::Active;
        Ok(conv.clone())
    }

    async fn update_status(
        &self,
        conversation: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, RelayDeskError> {
        self.write(ApiCall::UpdateStatus(conversation, status)).await?;
        let mut state = self.state.lock().await;
        let conv = state.conversation_mut(conversation)?;
        conv.status = status;
        Ok(conv.clone())
    }

    async fn close_conversation(
        &self,
        conversation: ConversationId,
    ) -> Result<Conversation, RelayDeskError> {
        self.write(ApiCall::Close(conversation)).await?;
        let mut state = self.state.lock().await;
        let conv = state.conversation_mut(conversation)?;
        conv.status = ConversationStatus::Closed;
        Ok(conv.clone())
    }

    async fn mark_read(
        &self,
        conversation: ConversationId,
    ) -> Result<Conversation, RelayDeskError> {
        self.write(ApiCall::MarkRead(conversation)).await?;
        let mut state = self.state.lock().await;
        let conv = state.conversation_mut(conversation)?;
        conv.unread_count = 0;
        Ok(conv.clone())
    }
}
