// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording notifier, sound player, and in-memory credential store.

use std::sync::{Mutex, RwLock};

use secrecy::{ExposeSecret, SecretString};

use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::{CredentialStore, Notifier, SoundCue, SoundPlayer};

/// Captures every notification and sound cue for assertion.
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<(String, String)>>,
    cues: Mutex<Vec<SoundCue>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(title, body)` pairs in the order they were shown.
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn cues(&self) -> Vec<SoundCue> {
        self.cues.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        if let Ok(mut n) = self.notifications.lock() {
            n.push((title.to_string(), body.to_string()));
        }
    }
}

impl SoundPlayer for RecordingNotifier {
    fn play(&self, cue: SoundCue) {
        if let Ok(mut c) = self.cues.lock() {
            c.push(cue);
        }
    }
}

/// Credential store that never touches disk.
#[derive(Default)]
pub struct MemoryCredentials {
    token: RwLock<Option<String>>,
}

impl MemoryCredentials {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }
}

impl CredentialStore for MemoryCredentials {
    fn token(&self) -> Option<SecretString> {
        self.token
            .read()
            .ok()
            .and_then(|t| t.clone())
            .map(SecretString::from)
    }

    fn set_token(&self, token: SecretString) -> Result<(), RelayDeskError> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| RelayDeskError::Internal("credential lock poisoned".to_string()))?;
        *slot = Some(token.expose_secret().to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), RelayDeskError> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| RelayDeskError::Internal("credential lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}
