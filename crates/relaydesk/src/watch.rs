// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `relaydesk watch` command implementation.
//!
//! Connects with the stored token and follows live traffic until a shutdown
//! signal arrives: inbound events, cache refetches and the projected
//! connectivity label are all reported through tracing.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use relaydesk_config::RelayDeskConfig;
use relaydesk_core::RelayDeskError;
use relaydesk_core::types::ConversationFilter;
use relaydesk_sync::{QueryKey, SyncEngine};

use crate::console::Console;
use crate::shutdown;

/// Runs the `relaydesk watch` command.
pub async fn run_watch(config: &RelayDeskConfig) -> Result<(), RelayDeskError> {
    let console = Console::build(config)?;
    let token = console.token()?;
    let cancel = shutdown::install_signal_handler();

    info!(endpoint = %console.engine.connection().endpoint(), "starting relaydesk watch");
    follow(&console.engine, token, cancel).await
}

/// Follows `engine` until `cancel` fires, then disconnects.
pub async fn follow(
    engine: &SyncEngine,
    token: secrecy::SecretString,
    cancel: CancellationToken,
) -> Result<(), RelayDeskError> {
    let _events = engine.connection().subscribe(|event| match event.conversation_id() {
        Some(conversation) => info!(kind = event.kind(), %conversation, "event"),
        None => info!(kind = event.kind(), "event"),
    });

    let cache = engine.cache();
    let list = QueryKey::Conversations(ConversationFilter::default());
    cache.track(list.clone());
    cache.track(QueryKey::Users);

    engine.start(token)?;

    let mut status = engine.status().subscribe();
    let mut revisions = cache.subscribe();
    let mut last_count = None;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                if engine.status().is_prolonged() {
                    warn!(status = %current, "connectivity");
                } else {
                    info!(status = %current, "connectivity");
                }
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let count = cache
                    .get(&list)
                    .and_then(|v| v.as_conversations().map(<[_]>::len));
                if count.is_some() && count != last_count {
                    info!(conversations = count, "conversation list refreshed");
                    last_count = count;
                }
            }
        }
    }

    engine.stop();
    info!("relaydesk watch stopped");
    Ok(())
}
