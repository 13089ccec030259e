// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for relaydesk sync-core tests.
//!
//! Provides mock collaborators for fast, deterministic, CI-runnable tests
//! without a server or a network.
//!
//! # Components
//!
//! - [`MockOperatorApi`] - In-memory REST API with call recording and hold/fail switches
//! - [`MockConnector`] - Duplex connector whose sessions are driven by the test
//! - [`RecordingNotifier`] - Captures notifications and sound cues
//! - [`MemoryCredentials`] - Credential store that never touches disk
//! - [`fixtures`] - Entity builders

pub mod fixtures;
pub mod mock_api;
pub mod mock_connector;
pub mod mock_notifier;

pub use mock_api::{ApiCall, Failure, MockOperatorApi};
pub use mock_connector::{MockConnector, OpenAttempt};
pub use mock_notifier::{MemoryCredentials, RecordingNotifier};
