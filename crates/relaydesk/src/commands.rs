// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot commands: token management and single optimistic mutations.

use secrecy::SecretString;
use tracing::info;

use relaydesk_config::RelayDeskConfig;
use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::CredentialStore;
use relaydesk_core::types::{ConversationId, ConversationStatus, OperatorId};
use relaydesk_sync::{MutationCoordinator, QueryKey};

use crate::console::{Console, open_credentials};

/// A single mutation requested on the command line.
#[derive(Debug, Clone)]
pub enum Mutation {
    Send {
        conversation: ConversationId,
        text: String,
    },
    Assign {
        conversation: ConversationId,
        operator: OperatorId,
    },
    Close {
        conversation: ConversationId,
    },
    MarkRead {
        conversation: ConversationId,
    },
    Status {
        conversation: ConversationId,
        status: ConversationStatus,
    },
}

impl Mutation {
    pub fn conversation(&self) -> ConversationId {
        match self {
            Self::Send { conversation, .. }
            | Self::Assign { conversation, .. }
            | Self::Close { conversation }
            | Self::MarkRead { conversation }
            | Self::Status { conversation, .. } => *conversation,
        }
    }
}

/// Runs the `relaydesk token set` command.
pub fn run_token_set(config: &RelayDeskConfig, token: String) -> Result<(), RelayDeskError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(RelayDeskError::Credentials {
            message: "token must not be empty".to_string(),
            source: None,
        });
    }
    let store = open_credentials(config)?;
    store.set_token(SecretString::from(token.to_string()))?;
    info!(path = %store.path().display(), "token stored");
    println!("token stored in {}", store.path().display());
    Ok(())
}

/// Runs the `relaydesk token clear` command.
pub fn run_token_clear(config: &RelayDeskConfig) -> Result<(), RelayDeskError> {
    let store = open_credentials(config)?;
    store.clear()?;
    println!("token cleared");
    Ok(())
}

/// Runs one mutation through the coordinator and prints the server's answer.
pub async fn run_mutation(config: &RelayDeskConfig, mutation: Mutation) -> Result<(), RelayDeskError> {
    let console = Console::build(config)?;
    console.token()?;
    let outcome = execute(console.engine.mutations(), mutation).await?;
    let rendered = serde_json::to_string_pretty(&outcome)
        .map_err(|e| RelayDeskError::Internal(format!("failed to render outcome: {e}")))?;
    println!("{rendered}");
    Ok(())
}

/// Primes the cache entries the mutation patches, then runs it.
///
/// Priming is best effort: a failed read leaves the entry absent and the
/// mutation still goes to the server.
pub async fn execute(
    mutations: &MutationCoordinator,
    mutation: Mutation,
) -> Result<serde_json::Value, RelayDeskError> {
    let cache = mutations.cache();
    let conversation = mutation.conversation();
    let mut keys = vec![QueryKey::Conversation(conversation)];
    if matches!(mutation, Mutation::Send { .. }) {
        keys.push(QueryKey::Messages(conversation));
    }
    for key in keys {
        if let Err(e) = cache.ensure(key.clone()).await {
            tracing::debug!(?key, error = %e, "could not prime cache entry");
        }
    }

    let value = match mutation {
        Mutation::Send { conversation, text } => {
            to_json(&mutations.send_message(conversation, text).await?)
        }
        Mutation::Assign {
            conversation,
            operator,
        } => to_json(&mutations.assign(conversation, operator).await?),
        Mutation::Close { conversation } => to_json(&mutations.close(conversation).await?),
        Mutation::MarkRead { conversation } => to_json(&mutations.mark_read(conversation).await?),
        Mutation::Status {
            conversation,
            status,
        } => to_json(&mutations.change_status(conversation, status).await?),
    }?;
    info!(%conversation, "mutation confirmed");
    Ok(value)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RelayDeskError> {
    serde_json::to_value(value)
        .map_err(|e| RelayDeskError::Internal(format!("failed to encode outcome: {e}")))
}
