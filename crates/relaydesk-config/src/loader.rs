// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./relaydesk.toml` > `~/.config/relaydesk/relaydesk.toml`
//! > `/etc/relaydesk/relaydesk.toml`, with environment variable overrides via
//! the `RELAYDESK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::{RelayDeskConfig, SECTIONS};

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/relaydesk/relaydesk.toml";

/// Local configuration file, resolved against the working directory.
pub const LOCAL_CONFIG_FILE: &str = "relaydesk.toml";

/// Path of the per-user configuration file, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("relaydesk").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/relaydesk/relaydesk.toml`
/// 3. `~/.config/relaydesk/relaydesk.toml`
/// 4. `./relaydesk.toml`
/// 5. `RELAYDESK_*` environment variables
pub fn load_config() -> Result<RelayDeskConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
pub fn load_config_from_str(toml_content: &str) -> Result<RelayDeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayDeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RelayDeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayDeskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RelayDeskConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider mapping `RELAYDESK_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `RELAYDESK_REALTIME_RECONNECT_DELAY_MS` must map to
/// `realtime.reconnect_delay_ms`.
fn env_provider() -> Env {
    Env::prefixed("RELAYDESK_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for &(section, _) in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
