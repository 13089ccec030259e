// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync engine: wires the connection manager, router, cache, status
//! projection and notifications together for one console session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use secrecy::SecretString;
use tracing::{debug, info};

use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::{DuplexConnector, Notifier, OperatorApi, SoundCue, SoundPlayer};

use crate::cache::QueryCache;
use crate::connection::{ConnectionManager, ConnectionOptions, DEFAULT_RECONNECT_DELAY, Subscription};
use crate::events::InboundEvent;
use crate::mutation::MutationCoordinator;
use crate::router::route;
use crate::status::{DEFAULT_GRACE, StatusProjection};

/// Engine settings, mapped from configuration by the composition root.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub endpoint: String,
    pub reconnect_delay: Duration,
    pub status_grace: Duration,
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            endpoint: ConnectionOptions::default().endpoint,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            status_grace: DEFAULT_GRACE,
            notifications_enabled: true,
            sound_enabled: true,
        }
    }
}

/// Collaborators injected by the composition root.
pub struct SyncParts {
    pub api: Arc<dyn OperatorApi>,
    pub connector: Arc<dyn DuplexConnector>,
    pub notifier: Arc<dyn Notifier>,
    pub sound: Arc<dyn SoundPlayer>,
}

pub struct SyncEngine {
    connection: ConnectionManager,
    cache: QueryCache,
    mutations: MutationCoordinator,
    status: StatusProjection,
    notifier: Arc<dyn Notifier>,
    sound: Arc<dyn SoundPlayer>,
    options: SyncOptions,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SyncEngine {
    pub fn new(parts: SyncParts, options: SyncOptions) -> Self {
        let connection = ConnectionManager::new(
            parts.connector,
            ConnectionOptions {
                endpoint: options.endpoint.clone(),
                reconnect_delay: options.reconnect_delay,
            },
        );
        let cache = QueryCache::new(parts.api);
        Self {
            connection,
            mutations: MutationCoordinator::new(cache.clone()),
            cache,
            status: StatusProjection::new(options.status_grace),
            notifier: parts.notifier,
            sound: parts.sound,
            options,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn mutations(&self) -> &MutationCoordinator {
        &self.mutations
    }

    pub fn status(&self) -> &StatusProjection {
        &self.status
    }

    /// Registers the engine's handlers (once) and connects.
    pub fn start(&self, token: SecretString) -> Result<(), RelayDeskError> {
        self.wire();
        self.connection.connect(token)
    }

    /// Disconnects and shows the console as offline.
    pub fn stop(&self) {
        self.connection.disconnect();
        self.status.mark_offline();
    }

    fn wire(&self) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !subscriptions.is_empty() {
            return;
        }

        let cache = self.cache.clone();
        subscriptions.push(self.connection.subscribe(move |event| {
            for scope in route(event) {
                let touched = cache.invalidate(scope);
                debug!(kind = event.kind(), ?scope, touched, "invalidated");
            }
        }));

        if self.options.notifications_enabled {
            let notifier = Arc::clone(&self.notifier);
            let sound = Arc::clone(&self.sound);
            let sound_enabled = self.options.sound_enabled;
            subscriptions.push(self.connection.subscribe(move |event| {
                if let Some((title, body)) = notification_for(event) {
                    notifier.notify(&title, &body);
                    if sound_enabled {
                        sound.play(SoundCue::IncomingMessage);
                    }
                }
            }));
        }

        // Events missed while the channel was down are recovered by
        // refetching everything on every reconnect.
        let status = self.status.clone();
        let cache = self.cache.clone();
        let connected_before = AtomicBool::new(false);
        subscriptions.push(self.connection.on_connection_change(move |connected| {
            status.on_connection_change(connected);
            if connected && connected_before.swap(true, Ordering::Relaxed) {
                let touched = cache.invalidate_all();
                info!(touched, "reconnected, refetching cached queries");
            }
        }));
    }
}

/// Title and body of the notification for an incoming end-user message.
fn notification_for(event: &InboundEvent) -> Option<(String, String)> {
    let InboundEvent::MessageReceived {
        content,
        telegram_user_name,
        attachment,
        ..
    } = event
    else {
        return None;
    };
    let body = match (content.trim().is_empty(), attachment.media_type.as_deref()) {
        (true, Some(media)) => format!("[{media}]"),
        _ => content.clone(),
    };
    Some((format!("New message from {telegram_user_name}"), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedValue, QueryKey};
    use relaydesk_core::types::{ConnectivityStatus, ConversationFilter, ConversationStatus};
    use relaydesk_test_utils::{MockConnector, MockOperatorApi, RecordingNotifier, fixtures};
    use serde_json::json;

    struct Harness {
        api: Arc<MockOperatorApi>,
        connector: Arc<MockConnector>,
        notifier: Arc<RecordingNotifier>,
        engine: SyncEngine,
    }

    fn harness(options: SyncOptions) -> Harness {
        let api = Arc::new(MockOperatorApi::new());
        let connector = Arc::new(MockConnector::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = SyncEngine::new(
            SyncParts {
                api: api.clone(),
                connector: connector.clone(),
                notifier: notifier.clone(),
                sound: notifier.clone(),
            },
            options,
        );
        Harness {
            api,
            connector,
            notifier,
            engine,
        }
    }

    fn token() -> SecretString {
        SecretString::from("tok".to_string())
    }

    async fn connected(engine: &SyncEngine) {
        engine
            .status()
            .subscribe()
            .wait_for(|s| *s == ConnectivityStatus::Connected)
            .await
            .unwrap();
    }

    fn received(cid: &str, content: &str) -> serde_json::Value {
        json!({
            "type": "message_received",
            "conversation_id": cid,
            "message_id": uuid::Uuid::new_v4(),
            "content": content,
            "telegram_user_id": 7,
            "telegram_user_name": "ana"
        })
    }

    #[tokio::test]
    async fn message_event_refetches_thread_and_notifies() {
        let h = harness(SyncOptions::default());
        let conversation = fixtures::conversation(ConversationStatus::Active);
        let cid = conversation.id;
        h.api.insert_conversation(conversation).await;
        let key = QueryKey::Messages(cid);
        h.engine.cache().ensure(key.clone()).await.unwrap();

        h.engine.start(token()).unwrap();
        connected(&h.engine).await;

        h.api
            .insert_message(fixtures::inbound_message(cid, "ping"))
            .await;
        h.connector
            .push_event(received(&cid.to_string(), "ping"))
            .await;

        let cache = h.engine.cache().clone();
        cache
            .subscribe()
            .wait_for(|_| {
                cache
                    .get(&key)
                    .and_then(|v| v.as_messages().map(<[_]>::len))
                    == Some(1)
                    && !cache.is_stale(&key)
            })
            .await
            .unwrap();

        assert_eq!(
            h.notifier.notifications(),
            vec![("New message from ana".to_string(), "ping".to_string())]
        );
        assert_eq!(h.notifier.cues(), vec![SoundCue::IncomingMessage]);
    }

    #[tokio::test]
    async fn notifications_can_be_disabled() {
        let h = harness(SyncOptions {
            notifications_enabled: false,
            ..Default::default()
        });
        h.engine.start(token()).unwrap();
        connected(&h.engine).await;

        let cid = uuid::Uuid::new_v4().to_string();
        h.connector.push_event(received(&cid, "one")).await;
        h.connector
            .push_event(json!({"type": "conversation_closed", "conversation_id": cid}))
            .await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(h.notifier.notifications().is_empty());
        assert!(h.notifier.cues().is_empty());
    }

    #[tokio::test]
    async fn sound_follows_its_own_switch() {
        let h = harness(SyncOptions {
            sound_enabled: false,
            ..Default::default()
        });
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        h.engine
            .connection()
            .subscribe(move |e| {
                let _ = tx.send(e.kind());
            })
            .detach();
        h.engine.start(token()).unwrap();
        connected(&h.engine).await;

        h.connector
            .push_event(received(&uuid::Uuid::new_v4().to_string(), "x"))
            .await;
        rx.recv().await.unwrap();
        assert_eq!(h.notifier.notifications().len(), 1);
        assert!(h.notifier.cues().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_refetches_cached_queries() {
        let h = harness(SyncOptions::default());
        h.api
            .insert_conversation(fixtures::conversation(ConversationStatus::Waiting))
            .await;
        let list = QueryKey::Conversations(ConversationFilter::default());
        h.engine.cache().ensure(list.clone()).await.unwrap();

        h.engine.start(token()).unwrap();
        connected(&h.engine).await;
        let reads_before = h.api.read_count().await;

        h.api
            .insert_conversation(fixtures::conversation(ConversationStatus::Waiting))
            .await;
        h.connector.close(1001, "going away").await;
        h.connector.wait_for_attempts(2).await;
        connected(&h.engine).await;
        h.engine.cache().settled(&list).await;

        assert_eq!(h.api.read_count().await, reads_before + 1);
        assert!(matches!(
            h.engine.cache().get(&list),
            Some(CachedValue::Conversations(list)) if list.len() == 2
        ));
    }

    #[tokio::test]
    async fn stop_shows_offline_and_start_wires_once() {
        let h = harness(SyncOptions::default());
        h.engine.start(token()).unwrap();
        connected(&h.engine).await;
        h.engine.stop();
        assert_eq!(h.engine.status().status(), ConnectivityStatus::Disconnected);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        h.engine
            .connection()
            .subscribe(move |e| {
                let _ = tx.send(e.kind());
            })
            .detach();
        h.engine.start(token()).unwrap();
        connected(&h.engine).await;
        h.connector
            .push_event(received(&uuid::Uuid::new_v4().to_string(), "once"))
            .await;
        rx.recv().await.unwrap();
        assert_eq!(h.notifier.notifications().len(), 1);
    }

    #[test]
    fn media_only_message_uses_placeholder_body() {
        let event: InboundEvent = serde_json::from_value(json!({
            "type": "message_received",
            "conversation_id": uuid::Uuid::new_v4(),
            "message_id": uuid::Uuid::new_v4(),
            "content": "",
            "telegram_user_id": 7,
            "telegram_user_name": "@ana",
            "media_type": "voice"
        }))
        .unwrap();
        assert_eq!(
            notification_for(&event),
            Some(("New message from @ana".to_string(), "[voice]".to_string()))
        );
    }
}
