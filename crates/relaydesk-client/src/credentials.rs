// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed bearer token store.
//!
//! The token is kept in memory as a [`SecretString`] and persisted to a single
//! file. On Unix the file is created owner-read/write only.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use relaydesk_core::RelayDeskError;
use relaydesk_core::traits::CredentialStore;

/// Credential store persisted to `token_path`.
pub struct FileCredentialStore {
    path: PathBuf,
    token: RwLock<Option<SecretString>>,
}

impl FileCredentialStore {
    /// Opens the store, loading an existing token if the file is present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RelayDeskError> {
        let path = path.into();
        let token = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let trimmed = content.trim();
                (!trimmed.is_empty()).then(|| SecretString::from(trimmed.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(io_error(&path, "read", e)),
        };
        debug!(path = %path.display(), present = token.is_some(), "credential store opened");
        Ok(Self {
            path,
            token: RwLock::new(token),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, Option<SecretString>>, RelayDeskError> {
        self.token
            .write()
            .map_err(|_| RelayDeskError::Internal("credential lock poisoned".to_string()))
    }
}

fn io_error(path: &Path, action: &str, e: std::io::Error) -> RelayDeskError {
    RelayDeskError::Credentials {
        message: format!("failed to {action} {}: {e}", path.display()),
        source: Some(Box::new(e)),
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    std::fs::write(path, content)
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Option<SecretString> {
        self.token
            .read()
            .ok()?
            .as_ref()
            .map(|t| SecretString::from(t.expose_secret().to_string()))
    }

    fn set_token(&self, token: SecretString) -> Result<(), RelayDeskError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, "create", e))?;
        }
        write_private(&self.path, token.expose_secret())
            .map_err(|e| io_error(&self.path, "write", e))?;
        *self.slot()? = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<(), RelayDeskError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&self.path, "remove", e)),
        }
        *self.slot()? = None;
        Ok(())
    }
}
