// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composition root: builds the collaborators and the sync engine from
//! configuration.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, info};

use relaydesk_client::{ApiClient, FileCredentialStore, WsConnector, resolve_endpoint};
use relaydesk_config::RelayDeskConfig;
use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::notifier::Silent;
use relaydesk_core::traits::{CredentialStore, Notifier};
use relaydesk_sync::{SyncEngine, SyncOptions, SyncParts};

/// Notifier that surfaces incoming-message notifications as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!(%title, %body, "notification");
    }
}

/// Maps configuration onto engine settings.
pub fn sync_options(config: &RelayDeskConfig, endpoint: String) -> SyncOptions {
    SyncOptions {
        endpoint,
        reconnect_delay: config.realtime.reconnect_delay(),
        status_grace: config.realtime.status_grace(),
        notifications_enabled: config.notifications.enabled,
        sound_enabled: config.notifications.sound_enabled,
    }
}

/// Opens the credential store named by `[credentials]`.
pub fn open_credentials(config: &RelayDeskConfig) -> Result<Arc<FileCredentialStore>, RelayDeskError> {
    FileCredentialStore::open(&config.credentials.token_path).map(Arc::new)
}

/// Returns the stored token or explains how to provide one.
pub fn require_token(credentials: &dyn CredentialStore) -> Result<SecretString, RelayDeskError> {
    credentials.token().ok_or_else(|| RelayDeskError::Credentials {
        message: "no token stored, run `relaydesk token set <TOKEN>` first".to_string(),
        source: None,
    })
}

/// Every instance one console session owns.
pub struct Console {
    pub credentials: Arc<FileCredentialStore>,
    pub engine: SyncEngine,
}

impl Console {
    pub fn build(config: &RelayDeskConfig) -> Result<Self, RelayDeskError> {
        let credentials = open_credentials(config)?;
        let api = ApiClient::new(&config.api, credentials.clone())?;
        let endpoint = resolve_endpoint(&config.realtime)?;
        debug!(%endpoint, api = %config.api.base_url, "console collaborators built");

        let engine = SyncEngine::new(
            SyncParts {
                api: Arc::new(api),
                connector: Arc::new(WsConnector::new()),
                notifier: Arc::new(LogNotifier),
                sound: Arc::new(Silent),
            },
            sync_options(config, endpoint),
        );
        Ok(Self {
            credentials,
            engine,
        })
    }

    pub fn token(&self) -> Result<SecretString, RelayDeskError> {
        require_token(self.credentials.as_ref())
    }
}
