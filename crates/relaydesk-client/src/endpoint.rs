// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duplex endpoint resolution.

use relaydesk_config::model::{EndpointMode, RealtimeConfig};
use relaydesk_core::RelayDeskError;

/// Resolves the duplex endpoint for the configured mode.
///
/// Development mode uses the fixed proxy endpoint. Deployed mode derives the
/// endpoint from the serving origin: `https` maps to `wss`, `http` to `ws`,
/// and the configured path is appended.
pub fn resolve_endpoint(config: &RealtimeConfig) -> Result<String, RelayDeskError> {
    match config.mode {
        EndpointMode::Development => Ok(config.dev_endpoint.clone()),
        EndpointMode::Deployed => {
            let origin = config.origin.as_deref().ok_or_else(|| {
                RelayDeskError::Config("realtime.origin is required in deployed mode".to_string())
            })?;
            let origin = origin.trim().trim_end_matches('/');
            let ws_origin = if let Some(rest) = origin.strip_prefix("https://") {
                format!("wss://{rest}")
            } else if let Some(rest) = origin.strip_prefix("http://") {
                format!("ws://{rest}")
            } else {
                return Err(RelayDeskError::Config(format!(
                    "origin `{origin}` must start with http:// or https://"
                )));
            };
            Ok(format!("{ws_origin}/{}", config.path.trim_start_matches('/')))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployed(origin: &str) -> RealtimeConfig {
        RealtimeConfig {
            mode: EndpointMode::Deployed,
            origin: Some(origin.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn development_uses_fixed_endpoint() {
        let config = RealtimeConfig::default();
        assert_eq!(resolve_endpoint(&config).unwrap(), "ws://localhost:8080/ws");
    }

    #[test]
    fn secure_origin_maps_to_wss() {
        assert_eq!(
            resolve_endpoint(&deployed("https://desk.example.com/")).unwrap(),
            "wss://desk.example.com/ws"
        );
    }

    #[test]
    fn plain_origin_maps_to_ws() {
        let mut config = deployed("http://10.0.0.5:3000");
        config.path = "realtime".to_string();
        assert_eq!(
            resolve_endpoint(&config).unwrap(),
            "ws://10.0.0.5:3000/realtime"
        );
    }

    #[test]
    fn deployed_without_origin_fails() {
        let config = RealtimeConfig {
            mode: EndpointMode::Deployed,
            ..Default::default()
        };
        assert!(matches!(
            resolve_endpoint(&config),
            Err(RelayDeskError::Config(_))
        ));
    }

    #[test]
    fn unknown_scheme_fails() {
        assert!(resolve_endpoint(&deployed("ftp://desk")).is_err());
    }
}
