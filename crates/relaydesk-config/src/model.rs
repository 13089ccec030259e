// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the relaydesk console.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently falling back to a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Every configuration section with its keys, in declaration order.
///
/// Used to map environment variables onto sections and to explain unknown
/// or misplaced keys.
pub const SECTIONS: &[(&str, &[&str])] = &[
    ("console", &["log_level"]),
    ("api", &["base_url", "request_timeout_secs"]),
    (
        "realtime",
        &[
            "mode",
            "dev_endpoint",
            "origin",
            "path",
            "reconnect_delay_ms",
            "status_grace_secs",
        ],
    ),
    ("credentials", &["token_path"]),
    ("notifications", &["enabled", "sound_enabled"]),
];

/// Keys accepted inside `[section]`, if it exists.
pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    SECTIONS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

/// Top-level relaydesk configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayDeskConfig {
    /// Console-wide settings.
    #[serde(default)]
    pub console: ConsoleConfig,

    /// REST API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Real-time duplex channel settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Bearer token storage settings.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Desktop notification settings.
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// Console-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// REST API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the REST API, including the `/api` prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Where the duplex endpoint comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointMode {
    /// Local development: a fixed endpoint on the dev proxy.
    #[default]
    Development,
    /// Deployed build: a path relative to the serving origin.
    Deployed,
}

/// Real-time duplex channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Endpoint selection mode.
    #[serde(default)]
    pub mode: EndpointMode,

    /// Fixed endpoint used in development mode.
    #[serde(default = "default_dev_endpoint")]
    pub dev_endpoint: String,

    /// Serving origin used in deployed mode (e.g. `https://desk.example.com`).
    #[serde(default)]
    pub origin: Option<String>,

    /// Endpoint path appended to the origin in deployed mode.
    #[serde(default = "default_path")]
    pub path: String,

    /// Fixed delay between a close and the next connect attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// How long the status projection keeps the "reconnecting" window open.
    #[serde(default = "default_status_grace_secs")]
    pub status_grace_secs: u64,
}

impl RealtimeConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn status_grace(&self) -> Duration {
        Duration::from_secs(self.status_grace_secs)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            mode: EndpointMode::default(),
            dev_endpoint: default_dev_endpoint(),
            origin: None,
            path: default_path(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            status_grace_secs: default_status_grace_secs(),
        }
    }
}

fn default_dev_endpoint() -> String {
    "ws://localhost:8080/ws".to_string()
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_status_grace_secs() -> u64 {
    10
}

/// Bearer token storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// File the bearer token is persisted to.
    #[serde(default = "default_token_path")]
    pub token_path: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
        }
    }
}

fn default_token_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("relaydesk").join("token"))
        .unwrap_or_else(|| std::path::PathBuf::from("relaydesk.token"))
        .to_string_lossy()
        .into_owned()
}

/// Desktop notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Show a notification for each message received from an end user.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Play a sound cue alongside the notification.
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound_enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}
