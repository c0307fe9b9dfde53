// Playback engine abstraction: one command surface over swappable media engines

pub mod engine;
pub mod error;
pub mod item;
pub mod mpv;
pub mod player;
pub mod recovery;
pub mod state;
pub mod thumbnail;
pub mod trim;
pub mod viewport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use engine::{
    DiscontinuityReason, Engine, EngineEvent, EngineFactory, EngineKind, EngineOptions,
    EngineState, Track, TrackKind,
};
pub use error::{PlayerError, Result};
pub use item::{PlaybackItem, SourceType, Subtitle, SubtitleFormat};
pub use player::{InitOptions, Player, PlayerEvent, PlayerOption, SkipKind};
pub use recovery::{EngineError, LoaderCause};
pub use state::{PlaybackStatus, StatusMachine};
pub use thumbnail::{ExtractorFactory, FrameExtractor, ThumbnailReply, Thumbnails};
pub use viewport::{Layout, SubtitleStyle, Viewport};
