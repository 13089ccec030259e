// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimistic mutation coordinator.
//!
//! Every locally initiated change runs the same sequence:
//!
//! 1. cancel in-flight refetches of the touched keys, snapshot them, and apply
//!    the speculative patch (one cache lock, no suspension point)
//! 2. commit through the REST collaborator
//! 3. on success, invalidate so a refetch replaces speculative content
//! 4. on failure, undo the patch from the snapshot and return the error
//!
//! Mutations on different conversations are independent. Two mutations on
//! the same conversation are not serialised; the server's last write wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use strum::Display;
use tracing::{debug, warn};

use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::OperatorApi;
use relaydesk_core::types::{
    Conversation, ConversationId, ConversationStatus, Message, MessageId, OperatorId,
};

use crate::cache::{CachedValue, KeyScope, QueryCache, QueryKey};

/// The mutation families the console issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MutationKind {
    #[strum(serialize = "send message")]
    SendMessage,
    #[strum(serialize = "assign conversation")]
    AssignConversation,
    #[strum(serialize = "change status")]
    ChangeStatus,
    #[strum(serialize = "close conversation")]
    CloseConversation,
    #[strum(serialize = "mark read")]
    MarkRead,
}

/// Lifecycle of one pending mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MutationPhase {
    Idle,
    Optimistic,
    Confirmed,
    RolledBack,
}

/// A mutation that has been patched into the cache and not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub id: u64,
    pub kind: MutationKind,
    pub conversation: ConversationId,
    pub phase: MutationPhase,
}

/// One optimistic change: how to patch the cache, and how to commit it.
#[async_trait]
pub trait OptimisticMutation: Send + Sync {
    type Output: Send;

    fn kind(&self) -> MutationKind;

    fn conversation(&self) -> ConversationId;

    /// Scopes whose entries are cancelled, snapshotted and patched.
    fn touched(&self) -> Vec<KeyScope>;

    /// Speculative patch for one touched entry.
    fn patch(&self, key: &QueryKey, value: &mut CachedValue);

    /// Undoes this mutation's patch on one entry after a failed commit.
    ///
    /// `saved` is the entry's pre-patch value. The default puts it back whole.
    fn revert(&self, _key: &QueryKey, current: &mut CachedValue, saved: &CachedValue) {
        *current = saved.clone();
    }

    /// Scopes refetched after the server confirmed the change.
    fn invalidates(&self) -> Vec<KeyScope> {
        self.touched()
    }

    /// Local validation before anything is patched or sent.
    fn precheck(&self, _cache: &QueryCache) -> Result<(), RelayDeskError> {
        Ok(())
    }

    async fn commit(&self, api: &dyn OperatorApi) -> Result<Self::Output, RelayDeskError>;
}

/// Appends a temporary operator message to the thread.
#[derive(Debug, Clone)]
pub struct SendMessage {
    pub conversation: ConversationId,
    pub content: String,
    temporary_id: MessageId,
}

impl SendMessage {
    pub fn new(conversation: ConversationId, content: impl Into<String>) -> Self {
        Self {
            conversation,
            content: content.into(),
            temporary_id: MessageId::temporary(),
        }
    }

    /// Identity of the speculative message this send appends.
    pub fn temporary_id(&self) -> MessageId {
        self.temporary_id
    }
}

#[async_trait]
impl OptimisticMutation for SendMessage {
    type Output = Message;

    fn kind(&self) -> MutationKind {
        MutationKind::SendMessage
    }

    fn conversation(&self) -> ConversationId {
        self.conversation
    }

    fn touched(&self) -> Vec<KeyScope> {
        vec![KeyScope::Messages(self.conversation)]
    }

    fn patch(&self, _key: &QueryKey, value: &mut CachedValue) {
        if let CachedValue::Messages(messages) = value {
            messages.push(Message {
                id: self.temporary_id,
                ..Message::pending_outbound(self.conversation, self.content.clone())
            });
        }
    }

    fn revert(&self, _key: &QueryKey, current: &mut CachedValue, _saved: &CachedValue) {
        if let CachedValue::Messages(messages) = current {
            messages.retain(|m| m.id != self.temporary_id);
        }
    }

    fn invalidates(&self) -> Vec<KeyScope> {
        vec![
            KeyScope::Messages(self.conversation),
            KeyScope::AllConversations,
        ]
    }

    async fn commit(&self, api: &dyn OperatorApi) -> Result<Message, RelayDeskError> {
        api.send_message(self.conversation, &self.content).await
    }
}

/// Sets the assignee; a waiting conversation becomes active.
#[derive(Debug, Clone)]
pub struct AssignConversation {
    pub conversation: ConversationId,
    pub operator: OperatorId,
}

#[async_trait]
impl OptimisticMutation for AssignConversation {
    type Output = Conversation;

    fn kind(&self) -> MutationKind {
        MutationKind::AssignConversation
    }

    fn conversation(&self) -> ConversationId {
        self.conversation
    }

    fn touched(&self) -> Vec<KeyScope> {
        vec![KeyScope::AllConversations]
    }

    fn patch(&self, _key: &QueryKey, value: &mut CachedValue) {
        value.for_conversation(self.conversation, |c| {
            c.assigned_operator = Some(self.operator);
            if c.status == ConversationStatus::Waiting {
                c.status = ConversationStatus::Active;
            }
        });
    }

    fn revert(&self, _key: &QueryKey, current: &mut CachedValue, saved: &CachedValue) {
        revert_conversation(self.conversation, current, saved);
    }

    async fn commit(&self, api: &dyn OperatorApi) -> Result<Conversation, RelayDeskError> {
        api.assign_conversation(self.conversation, self.operator)
            .await
    }
}

/// Moves a conversation to another status.
#[derive(Debug, Clone)]
pub struct ChangeStatus {
    pub conversation: ConversationId,
    pub status: ConversationStatus,
}

#[async_trait]
impl OptimisticMutation for ChangeStatus {
    type Output = Conversation;

    fn kind(&self) -> MutationKind {
        MutationKind::ChangeStatus
    }

    fn conversation(&self) -> ConversationId {
        self.conversation
    }

    fn touched(&self) -> Vec<KeyScope> {
        vec![KeyScope::AllConversations]
    }

    fn patch(&self, _key: &QueryKey, value: &mut CachedValue) {
        value.for_conversation(self.conversation, |c| c.status = self.status);
    }

    fn revert(&self, _key: &QueryKey, current: &mut CachedValue, saved: &CachedValue) {
        revert_conversation(self.conversation, current, saved);
    }

    fn precheck(&self, cache: &QueryCache) -> Result<(), RelayDeskError> {
        match cache.find_conversation(self.conversation) {
            Some(current) if !current.status.can_transition_to(self.status) => {
                Err(RelayDeskError::InvalidTransition {
                    from: current.status.to_string(),
                    to: self.status.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn commit(&self, api: &dyn OperatorApi) -> Result<Conversation, RelayDeskError> {
        api.update_status(self.conversation, self.status).await
    }
}

#[derive(Debug, Clone)]
pub struct CloseConversation {
    pub conversation: ConversationId,
}

#[async_trait]
impl OptimisticMutation for CloseConversation {
    type Output = Conversation;

    fn kind(&self) -> MutationKind {
        MutationKind::CloseConversation
    }

    fn conversation(&self) -> ConversationId {
        self.conversation
    }

    fn touched(&self) -> Vec<KeyScope> {
        vec![KeyScope::AllConversations]
    }

    fn patch(&self, _key: &QueryKey, value: &mut CachedValue) {
        value.for_conversation(self.conversation, |c| {
            c.status = ConversationStatus::Closed;
        });
    }

    fn revert(&self, _key: &QueryKey, current: &mut CachedValue, saved: &CachedValue) {
        revert_conversation(self.conversation, current, saved);
    }

    async fn commit(&self, api: &dyn OperatorApi) -> Result<Conversation, RelayDeskError> {
        api.close_conversation(self.conversation).await
    }
}

/// Clears the unread counter. Message read flags are left to the server.
#[derive(Debug, Clone)]
pub struct MarkRead {
    pub conversation: ConversationId,
}

#[async_trait]
impl OptimisticMutation for MarkRead {
    type Output = Conversation;

    fn kind(&self) -> MutationKind {
        MutationKind::MarkRead
    }

    fn conversation(&self) -> ConversationId {
        self.conversation
    }

    fn touched(&self) -> Vec<KeyScope> {
        vec![KeyScope::AllConversations]
    }

    fn patch(&self, _key: &QueryKey, value: &mut CachedValue) {
        value.for_conversation(self.conversation, |c| c.unread_count = 0);
    }

    fn revert(&self, _key: &QueryKey, current: &mut CachedValue, saved: &CachedValue) {
        revert_conversation(self.conversation, current, saved);
    }

    async fn commit(&self, api: &dyn OperatorApi) -> Result<Conversation, RelayDeskError> {
        api.mark_read(self.conversation).await
    }
}

/// Puts back the saved copy of conversation `id`, leaving other records as
/// they are now.
fn revert_conversation(id: ConversationId, current: &mut CachedValue, saved: &CachedValue) {
    let previous = match saved {
        CachedValue::Conversations(list) => list.iter().find(|c| c.id == id),
        CachedValue::Conversation(c) if c.id == id => Some(c),
        _ => None,
    };
    if let Some(previous) = previous {
        current.for_conversation(id, |c| *c = previous.clone());
    }
}

/// Runs optimistic mutations against a shared cache.
#[derive(Clone)]
pub struct MutationCoordinator {
    cache: QueryCache,
    pending: Arc<DashMap<u64, PendingMutation>>,
    next_id: Arc<AtomicU64>,
}

impl MutationCoordinator {
    pub fn new(cache: QueryCache) -> Self {
        Self {
            cache,
            pending: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Mutations currently in their optimistic window, oldest first.
    pub fn pending(&self) -> Vec<PendingMutation> {
        let mut pending: Vec<_> = self.pending.iter().map(|p| p.value().clone()).collect();
        pending.sort_by_key(|p| p.id);
        pending
    }

    /// Phase of mutation `id`; settled and unknown mutations are `Idle`.
    pub fn phase(&self, id: u64) -> MutationPhase {
        self.pending
            .get(&id)
            .map_or(MutationPhase::Idle, |p| p.phase)
    }

    /// Patches, commits, and either confirms or rolls back `mutation`.
    ///
    /// A failed precheck returns its error untouched, before any cache or
    /// network activity. A failed commit is wrapped in
    /// [`RelayDeskError::Mutation`] after the snapshot has been restored.
    pub async fn run<M: OptimisticMutation>(&self, mutation: M) -> Result<M::Output, RelayDeskError> {
        let kind = mutation.kind();
        let conversation = mutation.conversation();
        mutation.precheck(&self.cache)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let snapshot = self
            .cache
            .begin_optimistic(&mutation.touched(), |key, value| mutation.patch(key, value));
        self.pending.insert(
            id,
            PendingMutation {
                id,
                kind,
                conversation,
                phase: MutationPhase::Optimistic,
            },
        );
        debug!(%kind, %conversation, patched = snapshot.keys().count(), "optimistic patch applied");

        let result = mutation.commit(self.cache.api().as_ref()).await;
        self.pending.remove(&id);

        match result {
            Ok(output) => {
                for scope in mutation.invalidates() {
                    self.cache.invalidate(scope);
                }
                debug!(%kind, %conversation, phase = %MutationPhase::Confirmed, "mutation settled");
                Ok(output)
            }
            Err(e) => {
                self.cache
                    .restore_with(snapshot, |key, current, saved| {
                        mutation.revert(key, current, saved)
                    });
                warn!(
                    %kind,
                    %conversation,
                    phase = %MutationPhase::RolledBack,
                    error = %e,
                    "mutation failed, optimistic patch rolled back"
                );
                Err(RelayDeskError::mutation(kind.to_string(), e))
            }
        }
    }

    pub async fn send_message(
        &self,
        conversation: ConversationId,
        content: impl Into<String>,
    ) -> Result<Message, RelayDeskError> {
        self.run(SendMessage::new(conversation, content)).await
    }

    pub async fn assign(
        &self,
        conversation: ConversationId,
        operator: OperatorId,
    ) -> Result<Conversation, RelayDeskError> {
        self.run(AssignConversation {
            conversation,
            operator,
        })
        .await
    }

    pub async fn change_status(
        &self,
        conversation: ConversationId,
        status: ConversationStatus,
    ) -> Result<Conversation, RelayDeskError> {
        self.run(ChangeStatus {
            conversation,
            status,
        })
        .await
    }

    pub async fn close(&self, conversation: ConversationId) -> Result<Conversation, RelayDeskError> {
        self.run(CloseConversation { conversation }).await
    }

    pub async fn mark_read(
        &self,
        conversation: ConversationId,
    ) -> Result<Conversation, RelayDeskError> {
        self.run(MarkRead { conversation }).await
    }
}
