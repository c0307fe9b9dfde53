// Media engine capability traits
//
// The engine does decoding and rendering; the orchestrator only issues commands
// and consumes the ordered stream of `EngineEvent`s the host pumps back in.

use crate::error::Result;
use crate::item::PlaybackItem;
use crate::mpv::MpvSetup;
use crate::recovery::EngineError;
use crate::state::PlaybackStatus;
use crate::viewport::{Layout, SubtitleStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which engine implementation backs the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// The platform's standard library player
    #[default]
    Media3,
    /// The alternative native player
    Mpv,
}

/// Settings an engine is built with. Changing one requires a new engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineOptions {
    pub kind: EngineKind,
    /// Preferred audio and subtitle language
    pub language: Option<String>,
    pub extension_renderer_mode: Option<i32>,
    pub enable_decoder_fallback: Option<bool>,
    /// Installed mpv build, for engines that load it at runtime
    pub mpv_version: Option<String>,
    /// Startup options and observed properties; set for mpv engines only
    pub mpv: Option<MpvSetup>,
}

/// Engine-level lifecycle, independent of play/pause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    #[serde(rename = "sub")]
    Text,
    Image,
    Metadata,
}

impl TrackKind {
    pub const ALL: [TrackKind; 5] = [
        TrackKind::Video,
        TrackKind::Audio,
        TrackKind::Text,
        TrackKind::Image,
        TrackKind::Metadata,
    ];

    /// Parse the shell's track type names (`video`, `audio`, `sub`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "video" => Some(TrackKind::Video),
            "audio" => Some(TrackKind::Audio),
            "sub" => Some(TrackKind::Text),
            _ => None,
        }
    }

    /// Whether tracks of this kind are reported to the shell
    pub fn is_selectable(self) -> bool {
        matches!(self, TrackKind::Video | TrackKind::Audio | TrackKind::Text)
    }
}

/// One selectable track of the current item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: String,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    pub selected: bool,
    #[serde(skip)]
    pub supported: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscontinuityReason {
    AutoTransition,
    Seek,
    SeekAdjustment,
    Skip,
    Remove,
    Internal,
}

/// Everything an engine reports, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    IsPlayingChanged(bool),
    MediaItemTransition,
    PositionDiscontinuity {
        reason: DiscontinuityReason,
        old_index: usize,
        old_position_ms: u64,
        new_index: usize,
        new_position_ms: u64,
    },
    TracksChanged,
    Error(EngineError),
    /// Engines that derive the caller status themselves (mpv)
    StatusReported(PlaybackStatus),
    Position(u64),
    Duration(u64),
    /// The engine started playing playlist entry `index`
    ItemPlaying(usize),
    Log { level: i32, message: String },
}

/// A media engine driving decode and render of one playlist.
///
/// All calls happen on the owner's thread; results of commands are observed
/// through [`EngineEvent`]s.
pub trait Engine: Send {
    fn kind(&self) -> EngineKind;

    fn set_media_items(&mut self, items: &[PlaybackItem], index: usize, start_ms: u64);

    fn replace_media_item(&mut self, index: usize, item: &PlaybackItem);

    fn clear_media_items(&mut self);

    fn prepare(&mut self);

    /// Whether playback starts as soon as the engine is ready
    fn set_play_when_ready(&mut self, play: bool);

    fn play(&mut self);

    fn pause(&mut self);

    fn seek_to(&mut self, position_ms: u64);

    fn seek_to_item(&mut self, index: usize, position_ms: u64);

    fn seek_to_previous_item(&mut self);

    fn state(&self) -> EngineState;

    fn is_playing(&self) -> bool;

    fn current_index(&self) -> usize;

    fn item_count(&self) -> usize;

    fn position_ms(&self) -> u64;

    fn buffered_position_ms(&self) -> u64;

    /// `None` while the duration is unknown
    fn duration_ms(&self) -> Option<u64>;

    /// Width and height of the decoded video, if any
    fn video_size(&self) -> Option<(u32, u32)>;

    fn tracks(&self) -> Vec<Track>;

    fn set_track_kind_disabled(&mut self, kind: TrackKind, disabled: bool);

    /// Select the track with `id`, enabling its kind; false if no such track
    fn select_track(&mut self, kind: TrackKind, id: &str) -> bool;

    fn set_playback_speed(&mut self, speed: f32);

    fn set_volume(&mut self, volume: f32);

    fn set_layout(&mut self, layout: Layout);

    fn set_aspect_ratio(&mut self, ratio: Option<f32>);

    fn set_transform(&mut self, matrix: [f32; 9]);

    fn set_subtitle_style(&mut self, style: &SubtitleStyle);

    fn release(&mut self);
}

/// Builds engines; the player asks for a new one when engine options change
pub trait EngineFactory: Send {
    fn create(&self, options: &EngineOptions) -> Result<Box<dyn Engine>>;
}

/// A shared factory, so one host factory can back successive players
impl<F: EngineFactory + Sync + ?Sized> EngineFactory for Arc<F> {
    fn create(&self, options: &EngineOptions) -> Result<Box<dyn Engine>> {
        (**self).create(options)
    }
}
