// Player orchestrator
//
// Owns the engine, the playlist and the status machine. Commands and engine
// events are both handled on the owner's thread, so no state here is shared;
// everything the shell needs to know leaves through the event bus.

use crate::engine::{
    DiscontinuityReason, Engine, EngineEvent, EngineFactory, EngineKind, EngineOptions,
    EngineState, Track, TrackKind,
};
use crate::error::{PlayerError, Result};
use crate::item::PlaybackItem;
use crate::mpv::{MpvAggregator, MpvSetup, MpvValue};
use crate::recovery::{self, EngineError, Outcome, Recovery};
use crate::state::{PlaybackStatus, StatusMachine};
use crate::thumbnail::{ExtractorFactory, Thumbnails};
use crate::trim::{SkipTriggers, TriggerAction};
use crate::viewport::{self, SubtitleStyle, Viewport};
use ghosten_core::{EventBus, HostLifecycle, PlayerConfig, Throttle};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A new item is only seeked to its stored start when that lies before this share of the duration
const RESUME_LIMIT: f64 = 0.95;

/// Notifications for the application shell, in order
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    IsInitialized,
    UpdateStatus(PlaybackStatus),
    Position(u64),
    BufferingUpdate(u64),
    Duration(u64),
    MediaChanged { index: usize, position: u64 },
    BeforeMediaChange { index: usize, position: u64 },
    TracksChanged(Vec<Track>),
    /// An end-trim skip is coming up
    WillSkip,
    /// Recovered failure, playback continues
    Error(String),
    /// Unrecoverable failure; the status moves to `Error`
    FatalError(String),
    Log { level: i32, message: String },
    VolumeChanged(f32),
    /// Answer to [`Player::request_video_thumbnail`]; `None` when no frame was produced
    VideoThumbnail {
        request_id: u64,
        path: Option<PathBuf>,
    },
}

/// Which trim offset `set_skip_position` updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    Start,
    End,
}

impl SkipKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(SkipKind::Start),
            "end" => Some(SkipKind::End),
            _ => None,
        }
    }
}

/// Engine options that can change at runtime (each rebuilds the engine)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerOption {
    ExtensionRendererMode(i32),
    EnableDecoderFallback(bool),
}

impl PlayerOption {
    /// `Ok(None)` for options this player does not know
    pub fn from_json(name: &str, value: &Value) -> Result<Option<Self>> {
        let invalid = || PlayerError::InvalidOption {
            name: name.to_string(),
            value: value.to_string(),
        };
        let option = match name {
            "extensionRendererMode" => {
                let mode = value.as_i64().ok_or_else(invalid)?;
                let mode = i32::try_from(mode).map_err(|_| invalid())?;
                PlayerOption::ExtensionRendererMode(mode)
            }
            "enableDecoderFallback" => {
                PlayerOption::EnableDecoderFallback(value.as_bool().ok_or_else(invalid)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(option))
    }
}

/// Arguments of the shell's `init` call
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitOptions {
    #[serde(rename = "type")]
    pub kind: EngineKind,
    pub language: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub top: Option<i32>,
    pub left: Option<i32>,
    pub auto_pip: bool,
    pub extension_renderer_mode: Option<i32>,
    pub enable_decoder_fallback: Option<bool>,
    /// ARGB colors: foreground, background, window, edge
    pub subtitle_style: Option<Vec<i64>>,
    pub mpv_version: Option<String>,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            kind: EngineKind::Media3,
            language: None,
            width: None,
            height: None,
            top: None,
            left: None,
            auto_pip: true,
            extension_renderer_mode: None,
            enable_decoder_fallback: None,
            subtitle_style: None,
            mpv_version: None,
        }
    }
}

impl InitOptions {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            kind: self.kind,
            language: self.language.clone(),
            extension_renderer_mode: self.extension_renderer_mode,
            enable_decoder_fallback: self.enable_decoder_fallback,
            mpv_version: self.mpv_version.clone(),
            mpv: (self.kind == EngineKind::Mpv)
                .then(|| MpvSetup::new(self.language.as_deref(), true)),
        }
    }
}

/// Colors arrive as signed 64-bit ints; only the low 32 bits carry ARGB
pub fn argb_colors(values: &[i64]) -> Vec<u32> {
    values.iter().map(|value| *value as u32).collect()
}

pub struct Player {
    engine: Box<dyn Engine>,
    factory: Box<dyn EngineFactory>,
    options: EngineOptions,
    config: PlayerConfig,
    events: EventBus<PlayerEvent>,
    playlist: Vec<PlaybackItem>,
    status: StatusMachine,
    triggers: SkipTriggers,
    /// Items that already used their one automatic retry
    retried: HashSet<usize>,
    position_throttle: Throttle,
    viewport: Viewport,
    auto_pip: bool,
    aspect_ratio: Option<f32>,
    subtitle_style: Option<SubtitleStyle>,
    volume: f32,
    mpv: Option<MpvAggregator>,
    thumbnails: Option<Thumbnails>,
    last_thumbnail_request: u64,
    disposed: bool,
}

impl Player {
    /// Build the engine and announce `isInitialized` on `events`
    pub fn new(
        factory: Box<dyn EngineFactory>,
        init: InitOptions,
        config: PlayerConfig,
        events: EventBus<PlayerEvent>,
    ) -> Result<Self> {
        let options = init.engine_options();
        let engine = factory.create(&options)?;
        log::info!("Player created with {:?} engine", options.kind);

        let mut player = Self {
            engine,
            factory,
            mpv: (options.kind == EngineKind::Mpv).then(MpvAggregator::new),
            options,
            position_throttle: Throttle::new(Duration::from_millis(config.position_interval_ms)),
            config,
            events,
            playlist: Vec::new(),
            status: StatusMachine::new(),
            triggers: SkipTriggers::new(),
            retried: HashSet::new(),
            viewport: Viewport::new(init.width, init.height, init.top, init.left),
            auto_pip: init.auto_pip,
            aspect_ratio: None,
            subtitle_style: None,
            volume: 1.0,
            thumbnails: None,
            last_thumbnail_request: 0,
            disposed: false,
        };
        if let Some(colors) = init.subtitle_style.as_deref() {
            player.set_subtitle_style(&argb_colors(colors));
        }
        player.fullscreen(false);
        player.publish(PlayerEvent::IsInitialized);
        player.publish(PlayerEvent::VolumeChanged(player.volume));
        Ok(player)
    }

    /// Enable `request_video_thumbnail` using frames from `extractors`
    pub fn with_thumbnails(mut self, extractors: Arc<dyn ExtractorFactory>) -> Result<Self> {
        self.thumbnails = Some(Thumbnails::open(&self.config.thumbnail, extractors)?);
        Ok(self)
    }

    pub fn subscribe(&self) -> crossbeam_channel::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.current()
    }

    pub fn playlist(&self) -> &[PlaybackItem] {
        &self.playlist
    }

    pub fn current_index(&self) -> usize {
        self.engine.current_index()
    }

    pub fn engine_options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn publish(&self, event: PlayerEvent) {
        self.events.publish(event);
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        match self.status.transition(status) {
            Ok(true) => self.publish(PlayerEvent::UpdateStatus(status)),
            Ok(false) => {}
            Err(e) => log::debug!("Ignoring status report: {}", e),
        }
    }

    // Transport

    pub fn play(&mut self) {
        match self.engine.state() {
            EngineState::Buffering | EngineState::Ready => self.engine.play(),
            EngineState::Ended => {
                if let Some(first) = self.playlist.first() {
                    self.engine.seek_to_item(0, first.start_position);
                }
            }
            EngineState::Idle => {
                self.engine.prepare();
                self.engine.play();
            }
        }
    }

    pub fn pause(&mut self) {
        self.engine.pause();
    }

    /// Jump to playlist entry `index` at its start offset.
    ///
    /// Past the last entry seeks to the end of the current media; a negative
    /// index does nothing.
    pub fn next(&mut self, index: i64) {
        if index >= self.engine.item_count() as i64 {
            if let Some(duration) = self.engine.duration_ms() {
                self.engine.seek_to(duration);
            }
            return;
        }
        if index < 0 {
            return;
        }
        let index = index as usize;
        let start = self.playlist.get(index).map_or(0, |item| item.start_position);
        self.engine.seek_to_item(index, start);
        if self.engine.state() == EngineState::Idle {
            self.engine.prepare();
            self.engine.play();
        }
    }

    pub fn previous(&mut self) {
        self.engine.seek_to_previous_item();
    }

    pub fn seek_to(&mut self, position_ms: u64) {
        self.engine.seek_to(position_ms);
    }

    // Playlist

    /// Replace the playlist and start preparing entry `index`
    pub fn set_sources(&mut self, items: Vec<PlaybackItem>, index: usize) -> Result<()> {
        if index >= items.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: items.len(),
            });
        }
        self.playlist = items;
        self.retried.clear();
        self.triggers.clear();
        let start = self.playlist[index].start_position;
        self.engine.set_media_items(&self.playlist, index, start);
        self.engine.set_play_when_ready(true);
        self.engine.prepare();
        log::info!("Playlist of {} items, starting at {}", self.playlist.len(), index);
        Ok(())
    }

    /// Replace the playlist with a single entry; `None` clears it
    pub fn set_source(&mut self, item: Option<PlaybackItem>) {
        self.retried.clear();
        self.triggers.clear();
        match item {
            Some(item) => {
                let start = item.start_position;
                self.playlist = vec![item];
                self.engine.set_media_items(&self.playlist, 0, start);
            }
            None => {
                self.playlist.clear();
                self.engine.clear_media_items();
            }
        }
    }

    /// Swap entry `index` for `item` and prepare again
    pub fn update_source(&mut self, item: PlaybackItem, index: usize) -> Result<()> {
        let len = self.playlist.len();
        let slot = self
            .playlist
            .get_mut(index)
            .ok_or(PlayerError::IndexOutOfRange { index, len })?;
        *slot = item;
        self.retried.remove(&index);
        self.triggers.cancel(index);
        self.engine.replace_media_item(index, &self.playlist[index]);
        self.engine.prepare();
        Ok(())
    }

    /// Set the start or end offset of each entry from `offsets`, in playlist order
    pub fn set_skip_position(&mut self, kind: SkipKind, offsets: &[u64]) {
        for (item, offset) in self.playlist.iter_mut().zip(offsets) {
            match kind {
                SkipKind::Start => item.start_position = *offset,
                SkipKind::End => item.end_position = *offset,
            }
        }
    }

    // Tracks and rendering

    /// Select track `id`, or disable the whole kind when `id` is `None`
    pub fn set_track(&mut self, kind: Option<TrackKind>, id: Option<&str>) {
        let Some(kind) = kind else {
            return;
        };
        match id {
            None => self.engine.set_track_kind_disabled(kind, true),
            Some(id) => {
                if !self.engine.select_track(kind, id) {
                    log::warn!("No {:?} track with id {}", kind, id);
                }
            }
        }
    }

    pub fn set_playback_speed(&mut self, speed: f32) {
        self.engine.set_playback_speed(speed);
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;
        self.engine.set_volume(volume);
        self.publish(PlayerEvent::VolumeChanged(volume));
    }

    /// `None` follows the video's own ratio
    pub fn set_aspect_ratio(&mut self, ratio: Option<f32>) {
        self.aspect_ratio = ratio;
        self.apply_aspect_ratio();
    }

    fn apply_aspect_ratio(&mut self) {
        match self.options.kind {
            EngineKind::Media3 => {
                let ratio = viewport::resolve_aspect_ratio(self.aspect_ratio, self.engine.video_size());
                self.engine.set_aspect_ratio(Some(ratio));
            }
            // mpv takes "no override" natively
            EngineKind::Mpv => self.engine.set_aspect_ratio(self.aspect_ratio),
        }
    }

    pub fn fullscreen(&mut self, fullscreen: bool) {
        let layout = self.viewport.set_fullscreen(fullscreen);
        self.engine.set_layout(layout);
    }

    pub fn set_transform(&mut self, matrix: &[f64]) -> Result<()> {
        let matrix = self.viewport.set_transform(matrix)?;
        self.engine.set_transform(matrix);
        Ok(())
    }

    pub fn set_subtitle_style(&mut self, colors: &[u32]) {
        if let Some(style) = SubtitleStyle::from_colors(colors) {
            self.subtitle_style = Some(style);
            self.engine.set_subtitle_style(&style);
        }
    }

    /// Rebuild the engine with the new option, keeping item, position and play state
    pub fn set_player_option(&mut self, option: PlayerOption) -> Result<()> {
        match option {
            PlayerOption::ExtensionRendererMode(mode) => {
                self.options.extension_renderer_mode = Some(mode)
            }
            PlayerOption::EnableDecoderFallback(enabled) => {
                self.options.enable_decoder_fallback = Some(enabled)
            }
        }
        self.reset_engine()
    }

    fn reset_engine(&mut self) -> Result<()> {
        let index = self.engine.current_index();
        let playing = self.engine.is_playing();
        let position = self.engine.position_ms();
        if let Some(item) = self.playlist.get_mut(index) {
            item.start_position = position;
        }

        let engine = self.factory.create(&self.options)?;
        let mut previous = std::mem::replace(&mut self.engine, engine);
        previous.release();
        log::info!("Engine rebuilt at item {} ({} ms)", index, position);

        self.engine.set_layout(self.viewport.layout());
        self.engine.set_volume(self.volume);
        if let Some(style) = self.subtitle_style {
            self.engine.set_subtitle_style(&style);
        }
        if let Some(item) = self.playlist.get(index) {
            let start = item.start_position;
            self.engine.set_media_items(&self.playlist, index, start);
            if playing {
                self.engine.set_play_when_ready(true);
                self.engine.prepare();
            }
        }
        Ok(())
    }

    pub fn can_enter_picture_in_picture(&self) -> bool {
        match &self.mpv {
            Some(mpv) => !mpv.is_paused(),
            None => matches!(
                self.engine.state(),
                EngineState::Buffering | EngineState::Ready
            ),
        }
    }

    /// Whether the host should enter picture-in-picture on its own when backgrounded
    pub fn auto_enter_picture_in_picture(&self) -> bool {
        self.auto_pip && self.engine.is_playing()
    }

    // Thumbnails

    /// Ask for a thumbnail of the current item at `position_ms`.
    ///
    /// Returns a request id right away. The answer follows on the event bus as
    /// [`PlayerEvent::VideoThumbnail`] with the same id; mpv players always
    /// answer `None`.
    pub fn request_video_thumbnail(&mut self, position_ms: u64) -> Result<u64> {
        let item = self
            .playlist
            .get(self.engine.current_index())
            .ok_or(PlayerError::NoSource)?;
        let request_id = self.last_thumbnail_request + 1;
        let events = self.events.clone();
        let reply = move |path: Option<PathBuf>| events.publish(PlayerEvent::VideoThumbnail { request_id, path });

        match (&self.thumbnails, self.options.kind) {
            (Some(thumbnails), EngineKind::Media3) => {
                thumbnails.request_with(&item.url, position_ms, reply)?
            }
            _ => reply(None),
        }
        self.last_thumbnail_request = request_id;
        Ok(request_id)
    }

    // Engine events

    /// Periodic position report; also fires due end-trim triggers
    pub fn tick(&mut self) {
        if self.disposed || !self.engine.is_playing() {
            return;
        }
        let position = self.engine.position_ms();
        if self.position_throttle.ready() {
            self.publish(PlayerEvent::Position(position));
            self.publish(PlayerEvent::BufferingUpdate(self.engine.buffered_position_ms()));
        }
        self.run_triggers(self.engine.current_index(), position);
    }

    /// Feed one observed mpv property change
    pub fn handle_mpv_property(&mut self, name: &str, value: MpvValue) {
        let events = match self.mpv.as_mut() {
            Some(mpv) => mpv.property_changed(name, value),
            None => return,
        };
        for event in events {
            self.handle_engine_event(event);
        }
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.disposed {
            return;
        }
        match event {
            EngineEvent::StateChanged(state) => self.on_state_changed(state),
            EngineEvent::IsPlayingChanged(playing) => {
                if matches!(self.engine.state(), EngineState::Buffering | EngineState::Idle) {
                    return;
                }
                self.set_status(if playing {
                    PlaybackStatus::Playing
                } else {
                    PlaybackStatus::Paused
                });
            }
            EngineEvent::MediaItemTransition => {
                self.publish(PlayerEvent::MediaChanged {
                    index: self.engine.current_index(),
                    position: self.engine.position_ms(),
                });
                self.clear_thumbnail_requests();
            }
            EngineEvent::PositionDiscontinuity {
                reason,
                old_index,
                old_position_ms,
                new_index,
                new_position_ms,
            } => {
                if matches!(
                    reason,
                    DiscontinuityReason::AutoTransition | DiscontinuityReason::Seek
                ) {
                    self.on_discontinuity(old_index, old_position_ms, new_index, new_position_ms);
                }
            }
            EngineEvent::TracksChanged => {
                let tracks: Vec<Track> = self
                    .engine
                    .tracks()
                    .into_iter()
                    .filter(|track| track.supported && track.kind.is_selectable())
                    .collect();
                self.publish(PlayerEvent::TracksChanged(tracks));
            }
            EngineEvent::Error(error) => self.on_error(error),
            EngineEvent::StatusReported(status) => self.set_status(status),
            EngineEvent::Position(position) => {
                self.publish(PlayerEvent::Position(position));
                self.run_triggers(self.engine.current_index(), position);
            }
            EngineEvent::Duration(duration) => {
                self.publish(PlayerEvent::Duration(duration));
                self.arm_skip(self.engine.current_index(), duration);
            }
            EngineEvent::ItemPlaying(index) => {
                self.publish(PlayerEvent::MediaChanged { index, position: 0 });
                self.clear_thumbnail_requests();
            }
            EngineEvent::Log { level, message } => self.publish(PlayerEvent::Log { level, message }),
        }
    }

    fn on_state_changed(&mut self, state: EngineState) {
        match state {
            EngineState::Idle => self.set_status(PlaybackStatus::Idle),
            EngineState::Buffering => {
                self.set_status(PlaybackStatus::Buffering);
                self.publish(PlayerEvent::BufferingUpdate(self.engine.buffered_position_ms()));
            }
            EngineState::Ready => {
                self.set_status(if self.engine.is_playing() {
                    PlaybackStatus::Playing
                } else {
                    PlaybackStatus::Paused
                });
                let duration = self.engine.duration_ms();
                self.publish(PlayerEvent::Duration(duration.unwrap_or(0)));
                if let Some(duration) = duration {
                    self.arm_skip(self.engine.current_index(), duration);
                }
                if self.aspect_ratio.is_none() {
                    self.apply_aspect_ratio();
                }
            }
            EngineState::Ended => {
                if !self.playlist.is_empty() {
                    self.set_status(PlaybackStatus::Ended);
                }
            }
        }
    }

    fn on_discontinuity(&mut self, old_index: usize, old_position: u64, new_index: usize, new_position: u64) {
        if old_index != new_index {
            self.publish(PlayerEvent::BeforeMediaChange {
                index: old_index,
                position: old_position,
            });
            if let Some(item) = self.playlist.get_mut(old_index) {
                item.start_position = old_position;
            }
            for kind in TrackKind::ALL {
                self.engine.set_track_kind_disabled(kind, false);
            }
            if let (Some(item), Some(duration)) = (self.playlist.get(new_index), self.engine.duration_ms()) {
                if (item.start_position as f64) < duration as f64 * RESUME_LIMIT {
                    self.engine.seek_to(item.start_position);
                }
            }
        }
        self.publish(PlayerEvent::Position(new_position));
    }

    fn on_error(&mut self, error: EngineError) {
        let index = self.engine.current_index();
        let has_next = index + 1 < self.engine.item_count();
        match recovery::classify(&error, has_next) {
            Outcome::Recover { action, message }
                if !action.retries_item() || self.retried.insert(index) =>
            {
                log::warn!("Recovering from playback error ({:?}): {}", action, message);
                self.apply_recovery(action, index);
                self.publish(PlayerEvent::Error(message));
            }
            Outcome::Recover { message, .. } | Outcome::Fatal(message) => {
                log::error!("Playback failed: {}", message);
                self.publish(PlayerEvent::FatalError(message));
                self.set_status(PlaybackStatus::Error);
            }
        }
    }

    fn apply_recovery(&mut self, action: Recovery, index: usize) {
        match action {
            Recovery::Resume => self.play(),
            Recovery::DisableTrack(kind) => {
                self.engine.set_track_kind_disabled(kind, true);
                self.engine.prepare();
            }
            Recovery::Restart => {
                self.engine.prepare();
                self.engine.play();
            }
            Recovery::SkipToNext => {
                self.next(index as i64 + 1);
                self.play();
            }
        }
    }

    fn arm_skip(&mut self, index: usize, duration: u64) {
        let Some(item) = self.playlist.get(index) else {
            return;
        };
        self.triggers
            .arm(index, duration, item.end_position, self.config.skip_warning_ms);
    }

    fn run_triggers(&mut self, index: usize, position: u64) {
        for action in self.triggers.poll(index, position) {
            match action {
                TriggerAction::WarnSkip => self.publish(PlayerEvent::WillSkip),
                TriggerAction::SkipTo(next) => {
                    log::info!("End trim reached on item {}, skipping to {}", index, next);
                    self.next(next as i64);
                }
            }
        }
    }

    fn clear_thumbnail_requests(&self) {
        if let Some(thumbnails) = &self.thumbnails {
            thumbnails.clear_pending();
        }
    }

    /// Release the engine and the thumbnail worker. Later calls are ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.engine.release();
        if let Some(thumbnails) = self.thumbnails.as_mut() {
            thumbnails.cancel();
        }
        self.triggers.clear();
        log::info!("Player disposed");
    }
}

impl HostLifecycle for Player {
    fn on_resume(&mut self) {
        if !self.disposed {
            self.play();
        }
    }

    fn on_pause(&mut self) {
        if !self.disposed {
            self.pause();
        }
    }

    fn on_destroy(&mut self) {
        self.dispose();
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.dispose();
    }
}
