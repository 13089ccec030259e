// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes, non-zero timers, and mode-dependent required keys.

use crate::diagnostic::ConfigError;
use crate::model::{EndpointMode, RelayDeskConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RelayDeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let level = config.console.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "console.log_level `{}` is not one of {}",
            config.console.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if !has_scheme(&config.api.base_url, &["http://", "https://"]) {
        fail(format!(
            "api.base_url `{}` must start with http:// or https://",
            config.api.base_url
        ));
    }

    if config.api.request_timeout_secs == 0 {
        fail("api.request_timeout_secs must be greater than 0".to_string());
    }

    let realtime = &config.realtime;
    if realtime.reconnect_delay_ms == 0 {
        fail("realtime.reconnect_delay_ms must be greater than 0".to_string());
    }

    if realtime.status_grace_secs == 0 {
        fail("realtime.status_grace_secs must be greater than 0".to_string());
    }

    if !realtime.path.starts_with('/') {
        fail(format!(
            "realtime.path `{}` must start with `/`",
            realtime.path
        ));
    }

    match realtime.mode {
        EndpointMode::Development => {
            if !has_scheme(&realtime.dev_endpoint, &["ws://", "wss://"]) {
                fail(format!(
                    "realtime.dev_endpoint `{}` must start with ws:// or wss://",
                    realtime.dev_endpoint
                ));
            }
        }
        EndpointMode::Deployed => match realtime.origin.as_deref() {
            None => fail("realtime.origin is required when realtime.mode = \"deployed\"".to_string()),
            Some(origin) if !has_scheme(origin, &["http://", "https://"]) => fail(format!(
                "realtime.origin `{origin}` must start with http:// or https://"
            )),
            Some(_) => {}
        },
    }

    if config.credentials.token_path.trim().is_empty() {
        fail("credentials.token_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    schemes
        .iter()
        .any(|scheme| lower.len() > scheme.len() && lower.starts_with(scheme))
}
