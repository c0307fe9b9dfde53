// Caller-visible playback status and its transition rules

use crate::error::{PlayerError, Result};
use serde::{Serialize, Serializer};
use std::fmt;

/// Player status as reported through `updateStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackStatus {
    /// Nothing prepared
    Idle,
    /// Loading or waiting for data
    Buffering,
    Playing,
    Paused,
    /// Reached the end of the playlist
    Ended,
    /// A fatal error was reported; left only by preparing again
    Error,
}

impl PlaybackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Buffering => "buffering",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Ended => "ended",
            PlaybackStatus::Error => "error",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PlaybackStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Tracks the last reported status and rejects transitions the engine should never produce
#[derive(Debug)]
pub struct StatusMachine {
    current: PlaybackStatus,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self {
            current: PlaybackStatus::Idle,
        }
    }

    pub fn current(&self) -> PlaybackStatus {
        self.current
    }

    /// Move to `to`. Returns `Ok(false)` when already there (nothing to report).
    pub fn transition(&mut self, to: PlaybackStatus) -> Result<bool> {
        let from = self.current;
        if from == to {
            return Ok(false);
        }
        validate_transition(from, to)?;
        self.current = to;
        log::debug!("Player status changed: {} -> {}", from, to);
        Ok(true)
    }

    /// Force the idle status (new playlist, dispose)
    pub fn reset(&mut self) -> bool {
        let changed = self.current != PlaybackStatus::Idle;
        self.current = PlaybackStatus::Idle;
        changed
    }
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_transition(from: PlaybackStatus, to: PlaybackStatus) -> Result<()> {
    use PlaybackStatus::*;

    match (from, to) {
        // Any live status may fail
        (Idle | Buffering | Playing | Paused | Ended, Error) => Ok(()),

        // From Idle
        (Idle, Buffering | Playing | Paused) => Ok(()),

        // From Buffering
        (Buffering, Idle | Playing | Paused | Ended) => Ok(()),

        // From Playing / Paused
        (Playing, Idle | Buffering | Paused | Ended) => Ok(()),
        (Paused, Idle | Buffering | Playing | Ended) => Ok(()),

        // From Ended (replay from the first item)
        (Ended, Idle | Buffering | Playing | Paused) => Ok(()),

        // From Error: only a new prepare gets out
        (Error, Buffering) => Ok(()),

        _ => Err(PlayerError::InvalidState(format!(
            "Invalid status transition from {} to {}",
            from, to
        ))),
    }
}
