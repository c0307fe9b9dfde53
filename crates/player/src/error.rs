// Error types for the player

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Unknown Subtitle Mime Type: {0}")]
    UnknownSubtitleType(String),

    #[error("Index {index} out of range for a playlist of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No Source")]
    NoSource,

    #[error("Transform needs 9 values, got {0}")]
    InvalidTransform(usize),

    #[error("Invalid value for player option {name}: {value}")]
    InvalidOption { name: String, value: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Thumbnail cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Player disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, PlayerError>;
