// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query cache: the single source of UI truth.
//!
//! Entries are keyed by a semantic [`QueryKey`] and hold a value, a freshness
//! flag, and at most one in-flight refetch. Invalidation never writes data; it
//! marks the entry stale and schedules a background refetch through the
//! [`OperatorApi`]. Repeated invalidations of a key whose refetch is still
//! outstanding collapse into that refetch.
//!
//! Optimistic writers go through [`QueryCache::begin_optimistic`], which
//! cancels in-flight refetches, snapshots the entries and applies the patch
//! under one lock acquisition. [`QueryCache::restore`] puts the snapshot back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{Instrument, debug, warn};

use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::OperatorApi;
use relaydesk_core::types::{
    Conversation, ConversationFilter, ConversationId, Message, Operator,
};

/// Identity of a cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// A conversations list fetched under a filter.
    Conversations(ConversationFilter),
    /// A single conversation's detail.
    Conversation(ConversationId),
    /// The message thread of a conversation.
    Messages(ConversationId),
    /// The operators list.
    Users,
}

/// A family of query keys, as produced by the event router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// Every conversations list under any filter, plus conversation details.
    AllConversations,
    Messages(ConversationId),
    Users,
}

impl KeyScope {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match (self, key) {
            (Self::AllConversations, QueryKey::Conversations(_) | QueryKey::Conversation(_)) => {
                true
            }
            (Self::Messages(a), QueryKey::Messages(b)) => a == b,
            (Self::Users, QueryKey::Users) => true,
            _ => false,
        }
    }
}

/// A cached query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Conversations(Vec<Conversation>),
    Conversation(Conversation),
    Messages(Vec<Message>),
    Users(Vec<Operator>),
}

impl CachedValue {
    pub fn as_messages(&self) -> Option<&[Message]> {
        match self {
            Self::Messages(messages) => Some(messages),
            _ => None,
        }
    }

    pub fn as_conversations(&self) -> Option<&[Conversation]> {
        match self {
            Self::Conversations(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_conversation(&self) -> Option<&Conversation> {
        match self {
            Self::Conversation(conversation) => Some(conversation),
            _ => None,
        }
    }

    /// Applies `f` to every copy of conversation `id` held by this value.
    pub fn for_conversation(&mut self, id: ConversationId, mut f: impl FnMut(&mut Conversation)) {
        match self {
            Self::Conversations(list) => list.iter_mut().filter(|c| c.id == id).for_each(f),
            Self::Conversation(conversation) if conversation.id == id => f(conversation),
            _ => {}
        }
    }
}

struct InFlight {
    id: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct Entry {
    value: Option<CachedValue>,
    stale: bool,
    in_flight: Option<InFlight>,
    /// Bumped whenever authoritative data lands or the entry is invalidated.
    generation: u64,
}

/// Pre-patch state of the entries an optimistic mutation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<SavedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SavedEntry {
    key: QueryKey,
    value: Option<CachedValue>,
    stale: bool,
    generation: u64,
}

impl Snapshot {
    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.entries.iter().map(|e| &e.key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Inner {
    api: Arc<dyn OperatorApi>,
    entries: Mutex<HashMap<QueryKey, Entry>>,
    next_fetch: AtomicU64,
    revision: watch::Sender<u64>,
}

/// Shared handle to the query cache. Cloning is cheap.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new(api: Arc<dyn OperatorApi>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                entries: Mutex::new(HashMap::new()),
                next_fetch: AtomicU64::new(1),
                revision: watch::Sender::new(0),
            }),
        }
    }

    /// The REST collaborator refetches and mutations go through.
    pub fn api(&self) -> &Arc<dyn OperatorApi> {
        &self.inner.api
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|rev| *rev += 1);
    }

    /// Current value of `key`, stale or not.
    pub fn get(&self, key: &QueryKey) -> Option<CachedValue> {
        self.entries().get(key).and_then(|e| e.value.clone())
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries().get(key).is_some_and(|e| e.stale)
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entries().get(key).is_some_and(|e| e.in_flight.is_some())
    }

    /// The freshest cached copy of conversation `id`: its detail entry when
    /// present, otherwise the first list that contains it.
    pub fn find_conversation(&self, id: ConversationId) -> Option<Conversation> {
        let entries = self.entries();
        if let Some(CachedValue::Conversation(c)) = entries
            .get(&QueryKey::Conversation(id))
            .and_then(|e| e.value.as_ref())
        {
            return Some(c.clone());
        }
        entries.values().find_map(|e| match &e.value {
            Some(CachedValue::Conversations(list)) => list.iter().find(|c| c.id == id).cloned(),
            _ => None,
        })
    }

    /// Keys currently held by the cache.
    pub fn keys(&self) -> Vec<QueryKey> {
        self.entries().keys().cloned().collect()
    }

    /// Watch channel bumped on every observable change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Stores a fresh value for `key`.
    pub fn set(&self, key: QueryKey, value: CachedValue) {
        {
            let mut entries = self.entries();
            let entry = entries.entry(key).or_default();
            entry.value = Some(value);
            entry.stale = false;
            entry.generation += 1;
        }
        self.bump();
    }

    /// Starts observing `key`: creates an empty stale entry and fetches it.
    pub fn track(&self, key: QueryKey) {
        {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_default();
            if entry.value.is_some() && !entry.stale {
                return;
            }
            entry.stale = true;
            if entry.in_flight.is_none() {
                entry.in_flight = self.spawn_fetch(key);
            }
        }
        self.bump();
    }

    /// Returns the cached value, fetching it first when absent or stale.
    pub async fn ensure(&self, key: QueryKey) -> Result<CachedValue, RelayDeskError> {
        let cached = self
            .entries()
            .get(&key)
            .filter(|e| !e.stale)
            .and_then(|e| e.value.clone());
        if let Some(value) = cached {
            return Ok(value);
        }
        let value = fetch(self.inner.api.as_ref(), &key).await?;
        self.set(key, value.clone());
        Ok(value)
    }

    /// Marks every cached key in `scope` stale and schedules one refetch per
    /// key that has none outstanding. Returns the number of keys touched.
    pub fn invalidate(&self, scope: KeyScope) -> usize {
        self.invalidate_where(|key| scope.matches(key))
    }

    /// Invalidates every cached key.
    pub fn invalidate_all(&self) -> usize {
        self.invalidate_where(|_| true)
    }

    /// Like [`invalidate`](Self::invalidate) for a single key.
    pub fn invalidate_key(&self, key: &QueryKey) -> usize {
        self.invalidate_where(|k| k == key)
    }

    fn invalidate_where(&self, pred: impl Fn(&QueryKey) -> bool) -> usize {
        let mut touched = 0;
        {
            let mut entries = self.entries();
            for (key, entry) in entries.iter_mut().filter(|(k, _)| pred(k)) {
                touched += 1;
                entry.stale = true;
                entry.generation += 1;
                if entry.in_flight.is_none() {
                    entry.in_flight = self.spawn_fetch(key.clone());
                } else {
                    debug!(?key, "refetch already outstanding");
                }
            }
        }
        if touched > 0 {
            self.bump();
        }
        touched
    }

    /// Aborts in-flight refetches for every key in `scope`. The entries stay stale.
    pub fn cancel(&self, scope: KeyScope) -> usize {
        let mut entries = self.entries();
        let mut cancelled = 0;
        for (_, entry) in entries.iter_mut().filter(|(k, _)| scope.matches(k)) {
            if let Some(flight) = entry.in_flight.take() {
                flight.handle.abort();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Cancels, snapshots and patches every cached key in `scopes` without
    /// releasing the cache lock between the three steps.
    ///
    /// `patch` only sees keys that already hold a value.
    pub fn begin_optimistic(
        &self,
        scopes: &[KeyScope],
        mut patch: impl FnMut(&QueryKey, &mut CachedValue),
    ) -> Snapshot {
        let mut saved = Vec::new();
        {
            let mut entries = self.entries();
            for (key, entry) in entries
                .iter_mut()
                .filter(|(k, _)| scopes.iter().any(|s| s.matches(k)))
            {
                if let Some(flight) = entry.in_flight.take() {
                    flight.handle.abort();
                    debug!(?key, "cancelled refetch before optimistic patch");
                }
                saved.push(SavedEntry {
                    key: key.clone(),
                    value: entry.value.clone(),
                    stale: entry.stale,
                    generation: entry.generation,
                });
                if let Some(value) = entry.value.as_mut() {
                    patch(key, value);
                }
            }
        }
        self.bump();
        Snapshot { entries: saved }
    }

    /// Puts a snapshot back verbatim. Entries that were stale get their
    /// cancelled refetch re-armed.
    pub fn restore(&self, snapshot: Snapshot) {
        self.restore_with(snapshot, |_, current, saved| *current = saved.clone());
    }

    /// Undoes a patch entry by entry. `revert` receives the current value and
    /// the saved one, so it can undo only its own change and leave concurrent
    /// patches to other entities in place.
    ///
    /// If server data landed or an invalidation arrived since the snapshot,
    /// the reverted entry may hide it, so it is marked stale and refetched.
    pub fn restore_with(
        &self,
        snapshot: Snapshot,
        mut revert: impl FnMut(&QueryKey, &mut CachedValue, &CachedValue),
    ) {
        {
            let mut entries = self.entries();
            for saved in snapshot.entries {
                let entry = entries.entry(saved.key.clone()).or_default();
                match (entry.value.as_mut(), saved.value.as_ref()) {
                    (Some(current), Some(previous)) => revert(&saved.key, current, previous),
                    (_, previous) => entry.value = previous.cloned(),
                }
                if entry.generation != saved.generation {
                    debug!(
                        key = ?saved.key,
                        "entry changed during mutation, refetching after rollback"
                    );
                    entry.stale = true;
                }
                entry.stale |= saved.stale;
                if entry.stale && entry.in_flight.is_none() {
                    entry.in_flight = self.spawn_fetch(saved.key);
                }
            }
        }
        self.bump();
    }

    /// Waits until `key` is fresh with no refetch outstanding.
    pub async fn settled(&self, key: &QueryKey) {
        let mut rx = self.subscribe();
        let _ = rx
            .wait_for(|_| {
                self.entries()
                    .get(key)
                    .is_none_or(|e| !e.stale && e.in_flight.is_none())
            })
            .await;
    }

    fn spawn_fetch(&self, key: QueryKey) -> Option<InFlight> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(?key, "no runtime available, refetch not scheduled");
            return None;
        };
        let id = self.inner.next_fetch.fetch_add(1, Ordering::Relaxed);
        let cache = self.clone();
        debug!(?key, fetch = id, "refetch scheduled");
        let handle = runtime
            .spawn(
                async move {
                    let result = fetch(cache.inner.api.as_ref(), &key).await;
                    cache.complete_fetch(key, id, result);
                }
                .in_current_span(),
            )
            .abort_handle();
        Some(InFlight { id, handle })
    }

    fn complete_fetch(&self, key: QueryKey, id: u64, result: Result<CachedValue, RelayDeskError>) {
        {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(&key) else {
                return;
            };
            if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
                debug!(?key, fetch = id, "superseded refetch result discarded");
                return;
            }
            entry.in_flight = None;
            match result {
                Ok(value) => {
                    entry.value = Some(value);
                    entry.stale = false;
                    entry.generation += 1;
                }
                Err(e) => {
                    warn!(?key, error = %e, "refetch failed, keeping stale value");
                }
            }
        }
        self.bump();
    }
}

async fn fetch(api: &dyn OperatorApi, key: &QueryKey) -> Result<CachedValue, RelayDeskError> {
    Ok(match key {
        QueryKey::Conversations(filter) => {
            CachedValue::Conversations(api.list_conversations(filter).await?)
        }
        QueryKey::Conversation(id) => CachedValue::Conversation(api.get_conversation(*id).await?),
        QueryKey::Messages(id) => CachedValue::Messages(api.list_messages(*id).await?),
        QueryKey::Users => CachedValue::Users(api.list_operators().await?),
    })
}
