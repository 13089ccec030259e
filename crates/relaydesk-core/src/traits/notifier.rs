// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget notification capabilities.

/// Sound cues the console can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    IncomingMessage,
}

/// Shows a user-visible notification. Implementations must not block.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, title: &str, body: &str);
}

/// Plays a short audio cue. Implementations must not block.
pub trait SoundPlayer: Send + Sync + 'static {
    fn play(&self, cue: SoundCue);
}

/// Notifier and sound player that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Notifier for Silent {
    fn notify(&self, _title: &str, _body: &str) {}
}

impl SoundPlayer for Silent {
    fn play(&self, _cue: SoundCue) {}
}
