// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end behaviour of the sync core against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::Instant;

use relaydesk_core::RelayDeskError;
use relaydesk_core::types::{
    ConnectionState, ConnectivityStatus, ConversationFilter, ConversationId, ConversationStatus,
};
use relaydesk_sync::{KeyScope, QueryKey, SyncEngine, SyncOptions, SyncParts};
use relaydesk_test_utils::{Failure, MockConnector, MockOperatorApi, RecordingNotifier, fixtures};

const DELAY: Duration = Duration::from_millis(3000);

struct Console {
    api: Arc<MockOperatorApi>,
    connector: Arc<MockConnector>,
    engine: SyncEngine,
}

fn console(reconnect_delay: Duration) -> Console {
    let api = Arc::new(MockOperatorApi::new());
    let connector = Arc::new(MockConnector::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = SyncEngine::new(
        SyncParts {
            api: api.clone(),
            connector: connector.clone(),
            notifier: notifier.clone(),
            sound: notifier,
        },
        SyncOptions {
            endpoint: "ws://console.test/ws".to_string(),
            reconnect_delay,
            status_grace: Duration::from_secs(10),
            ..Default::default()
        },
    );
    Console {
        api,
        connector,
        engine,
    }
}

fn token() -> SecretString {
    SecretString::from("operator-token".to_string())
}

async fn wait_state(engine: &SyncEngine, state: ConnectionState) {
    engine
        .connection()
        .watch_state()
        .wait_for(|s| *s == state)
        .await
        .unwrap();
}

fn list_key() -> QueryKey {
    QueryKey::Conversations(ConversationFilter::default())
}

/// Seeds one conversation on the server and caches its list, detail and thread.
async fn seeded(c: &Console, status: ConversationStatus) -> ConversationId {
    let conversation = fixtures::conversation(status);
    let cid = conversation.id;
    c.api.insert_conversation(conversation).await;
    c.api
        .insert_message(fixtures::inbound_message(cid, "hello"))
        .await;
    let cache = c.engine.cache();
    cache.ensure(list_key()).await.unwrap();
    cache.ensure(QueryKey::Conversation(cid)).await.unwrap();
    cache.ensure(QueryKey::Messages(cid)).await.unwrap();
    cid
}

fn snapshot_all(c: &Console, cid: ConversationId) -> Vec<Option<relaydesk_sync::CachedValue>> {
    let cache = c.engine.cache();
    [list_key(), QueryKey::Conversation(cid), QueryKey::Messages(cid)]
        .iter()
        .map(|k| cache.get(k))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn no_reconnect_after_manual_disconnect_with_pending_timer() {
    let c = console(DELAY);
    c.engine.start(token()).unwrap();
    wait_state(&c.engine, ConnectionState::Connected).await;

    c.connector.close(1011, "server restart").await;
    wait_state(&c.engine, ConnectionState::Reconnecting).await;

    tokio::time::sleep(DELAY / 2).await;
    c.engine.stop();
    tokio::time::sleep(DELAY * 20).await;

    assert_eq!(c.connector.attempt_count(), 1);
    assert_eq!(c.engine.connection().state(), ConnectionState::Disconnected);
    assert_eq!(c.engine.status().status(), ConnectivityStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn reconnect_attempt_happens_after_the_fixed_delay() {
    let c = console(DELAY);
    c.engine.start(token()).unwrap();
    wait_state(&c.engine, ConnectionState::Connected).await;

    let closed_at = Instant::now();
    c.connector.close(1000, "normal closure").await;
    c.connector.wait_for_attempts(2).await;

    let attempts = c.connector.attempts().await;
    assert_eq!(attempts[1].at.duration_since(closed_at), DELAY);
    assert_eq!(attempts[1].token, "operator-token");
    assert_eq!(attempts[1].endpoint, "ws://console.test/ws");
}

#[tokio::test(start_paused = true)]
async fn short_outage_never_surfaces_disconnected() {
    let c = console(Duration::from_millis(1500));
    let mut status = c.engine.status().subscribe();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let _ = seen_tx.send(*status.borrow_and_update());
        }
    });

    c.engine.start(token()).unwrap();
    wait_state(&c.engine, ConnectionState::Connected).await;
    c.connector.drop_transport().await;
    wait_state(&c.engine, ConnectionState::Reconnecting).await;
    tokio::task::yield_now().await;
    assert_eq!(c.engine.status().status(), ConnectivityStatus::Reconnecting);

    wait_state(&c.engine, ConnectionState::Connected).await;
    assert_eq!(c.engine.status().status(), ConnectivityStatus::Connected);
    tokio::time::sleep(Duration::from_secs(30)).await;

    let mut seen = Vec::new();
    while let Ok(s) = seen_rx.try_recv() {
        seen.push(s);
    }
    assert!(!seen.contains(&ConnectivityStatus::Disconnected), "{seen:?}");
    assert_eq!(seen.last(), Some(&ConnectivityStatus::Connected));
    assert!(!c.engine.status().is_prolonged());
}

#[tokio::test]
async fn repeated_invalidation_yields_one_outstanding_refetch() {
    let c = console(DELAY);
    let conversation = fixtures::conversation(ConversationStatus::Active);
    let cid = conversation.id;
    c.api.insert_conversation(conversation).await;
    let key = QueryKey::Messages(cid);
    c.engine.cache().ensure(key.clone()).await.unwrap();
    assert_eq!(c.api.read_count().await, 1);

    let (tx, mut rx) = mpsc::unbounded_channel();
    c.engine
        .connection()
        .subscribe(move |_| {
            let _ = tx.send(());
        })
        .detach();
    c.engine.start(token()).unwrap();
    wait_state(&c.engine, ConnectionState::Connected).await;

    c.api.hold_reads();
    for i in 0..5 {
        c.connector
            .push_event(json!({
                "type": "message_received",
                "conversation_id": cid,
                "message_id": uuid::Uuid::new_v4(),
                "content": format!("burst {i}"),
                "telegram_user_id": 7,
                "telegram_user_name": "ana"
            }))
            .await;
    }
    for _ in 0..5 {
        rx.recv().await.unwrap();
    }
    tokio::task::yield_now().await;

    assert!(c.engine.cache().is_fetching(&key));
    assert_eq!(c.api.read_count().await, 2);

    c.api.release_reads();
    c.engine.cache().settled(&key).await;
    assert_eq!(c.api.read_count().await, 2);
}

#[tokio::test]
async fn send_settles_without_duplicates() {
    let c = console(DELAY);
    let cid = seeded(&c, ConversationStatus::Active).await;
    let key = QueryKey::Messages(cid);
    let cache = c.engine.cache().clone();
    let before = cache.get(&key).unwrap().as_messages().unwrap().len();

    c.api.hold_writes();
    let mutations = c.engine.mutations().clone();
    let send = tokio::spawn(async move { mutations.send_message(cid, "hi").await });

    cache
        .subscribe()
        .wait_for(|_| {
            cache
                .get(&key)
                .and_then(|v| v.as_messages().map(|m| m.iter().any(|m| m.id.is_temporary())))
                .unwrap_or(false)
        })
        .await
        .unwrap();
    let speculative = cache.get(&key).unwrap();
    let speculative = speculative.as_messages().unwrap();
    assert_eq!(speculative.len(), before + 1);
    let temp = speculative.last().unwrap();
    assert_eq!(temp.content, "hi");
    assert!(temp.from_operator);

    c.api.release_writes();
    let sent = send.await.unwrap().unwrap();
    assert!(!sent.id.is_temporary());

    cache.settled(&key).await;
    let settled = cache.get(&key).unwrap();
    let settled = settled.as_messages().unwrap();
    assert_eq!(settled.len(), before + 1);
    assert!(settled.iter().all(|m| !m.id.is_temporary()));
    assert_eq!(settled.iter().filter(|m| m.id == sent.id).count(), 1);
}

#[tokio::test]
async fn every_failed_mutation_rolls_back_every_touched_key() {
    let c = console(DELAY);
    let cid = seeded(&c, ConversationStatus::Waiting).await;
    let operator = fixtures::operator("Op").id;
    c.api.fail_writes(Some(Failure::Status(500))).await;

    let before = snapshot_all(&c, cid);
    let m = c.engine.mutations();
    let outcomes = vec![
        m.send_message(cid, "hi").await.map(|_| ()),
        m.assign(cid, operator).await.map(|_| ()),
        m.change_status(cid, ConversationStatus::Active)
            .await
            .map(|_| ()),
        m.close(cid).await.map(|_| ()),
        m.mark_read(cid).await.map(|_| ()),
    ];

    for outcome in outcomes {
        assert!(matches!(outcome, Err(RelayDeskError::Mutation { .. })));
    }
    assert_eq!(snapshot_all(&c, cid), before);
    assert!(m.pending().is_empty());
}

#[tokio::test]
async fn failed_assignment_restores_prior_assignee() {
    let c = console(DELAY);
    let unassigned = seeded(&c, ConversationStatus::Waiting).await;

    let first = fixtures::operator("First").id;
    let mut taken = fixtures::conversation(ConversationStatus::Active);
    taken.assigned_operator = Some(first);
    let taken_id = taken.id;
    c.api.insert_conversation(taken).await;
    let cache = c.engine.cache();
    cache.invalidate_key(&list_key());
    cache.settled(&list_key()).await;

    c.api.fail_writes(Some(Failure::Unauthorized)).await;
    let second = fixtures::operator("Second").id;

    let err = c.engine.mutations().assign(unassigned, second).await.unwrap_err();
    assert!(err.is_unauthorized());
    let err = c.engine.mutations().assign(taken_id, second).await.unwrap_err();
    assert!(err.is_unauthorized());

    let list = cache.get(&list_key()).unwrap();
    let list = list.as_conversations().unwrap();
    let find = |id| list.iter().find(|c| c.id == id).unwrap();
    assert_eq!(find(unassigned).assigned_operator, None);
    assert_eq!(find(unassigned).status, ConversationStatus::Waiting);
    assert_eq!(find(taken_id).assigned_operator, Some(first));
}

#[tokio::test]
async fn rollback_does_not_hide_data_fetched_during_the_write() {
    let c = console(DELAY);
    let cid = seeded(&c, ConversationStatus::Waiting).await;
    let cache = c.engine.cache().clone();
    let listed = |cache: &relaydesk_sync::QueryCache| {
        cache
            .get(&list_key())
            .and_then(|v| v.as_conversations()?.iter().find(|x| x.id == cid).cloned())
            .unwrap()
    };

    c.api.hold_writes();
    c.api.fail_writes(Some(Failure::Status(500))).await;
    let mutations = c.engine.mutations().clone();
    let operator = fixtures::operator("Op").id;
    let assign = tokio::spawn(async move { mutations.assign(cid, operator).await });
    cache
        .subscribe()
        .wait_for(|_| listed(&cache).assigned_operator.is_some())
        .await
        .unwrap();

    c.api
        .insert_message(fixtures::inbound_message(cid, "still there?"))
        .await;
    cache.invalidate(KeyScope::AllConversations);
    cache.settled(&list_key()).await;
    cache.settled(&QueryKey::Conversation(cid)).await;

    c.api.release_writes();
    assert!(assign.await.unwrap().is_err());
    cache.settled(&list_key()).await;
    cache.settled(&QueryKey::Conversation(cid)).await;

    let server = c.api.conversation(cid).await.unwrap();
    assert_eq!(server.unread_count, 2);
    assert_eq!(listed(&cache), server);
    assert_eq!(
        cache
            .get(&QueryKey::Conversation(cid))
            .and_then(|v| v.as_conversation().cloned()),
        Some(server)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_right_after_start_leaves_the_console_offline() {
    let c = console(DELAY);
    for _ in 0..200 {
        c.engine.start(token()).unwrap();
        tokio::task::yield_now().await;
        c.engine.stop();
        tokio::time::sleep(Duration::from_millis(2)).await;

        assert_eq!(c.engine.connection().state(), ConnectionState::Disconnected);
        assert_eq!(c.engine.status().status(), ConnectivityStatus::Disconnected);
    }
}
