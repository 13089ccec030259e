// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential store trait for the operator's bearer token.

use secrecy::SecretString;

use crate::error::RelayDeskError;

/// Holds the bearer token used by the REST client and the duplex handshake.
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns the current token, if any.
    fn token(&self) -> Option<SecretString>;

    /// Replaces the stored token.
    fn set_token(&self, token: SecretString) -> Result<(), RelayDeskError>;

    /// Forgets the token. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), RelayDeskError>;
}
