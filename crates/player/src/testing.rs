// In-memory engine and frame extractors for exercising the player without media

use crate::engine::{Engine, EngineFactory, EngineKind, EngineOptions, EngineState, Track, TrackKind};
use crate::error::{PlayerError, Result};
use crate::item::PlaybackItem;
use crate::thumbnail::{ExtractorFactory, FrameExtractor};
use crate::viewport::{Layout, SubtitleStyle};
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct FakeState {
    pub options: EngineOptions,
    pub calls: Vec<String>,
    pub items: Vec<PlaybackItem>,
    pub index: usize,
    pub position_ms: u64,
    pub buffered_ms: u64,
    pub duration_ms: Option<u64>,
    pub video_size: Option<(u32, u32)>,
    pub state: EngineState,
    pub playing: bool,
    pub play_when_ready: bool,
    pub tracks: Vec<Track>,
    pub disabled: HashSet<TrackKind>,
    pub volume: f32,
    pub layout: Option<Layout>,
    pub aspect_ratio: Option<f32>,
    pub subtitle_style: Option<SubtitleStyle>,
    pub released: bool,
}

impl FakeState {
    fn new(options: EngineOptions) -> Self {
        Self {
            options,
            calls: Vec::new(),
            items: Vec::new(),
            index: 0,
            position_ms: 0,
            buffered_ms: 0,
            duration_ms: None,
            video_size: None,
            state: EngineState::Idle,
            playing: false,
            play_when_ready: false,
            tracks: Vec::new(),
            disabled: HashSet::new(),
            volume: 1.0,
            layout: None,
            aspect_ratio: None,
            subtitle_style: None,
            released: false,
        }
    }
}

/// Test-side view of a [`FakeEngine`]
#[derive(Debug, Clone)]
pub struct FakeHandle(Arc<Mutex<FakeState>>);

impl FakeHandle {
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.0.lock())
    }

    /// Commands received so far, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.0.lock().calls.clear();
    }

    pub fn set_state(&self, state: EngineState) {
        self.0.lock().state = state;
    }

    pub fn set_playing(&self, playing: bool) {
        self.0.lock().playing = playing;
    }

    pub fn set_duration(&self, duration_ms: Option<u64>) {
        self.0.lock().duration_ms = duration_ms;
    }

    pub fn set_position(&self, position_ms: u64) {
        self.0.lock().position_ms = position_ms;
    }

    pub fn set_index(&self, index: usize) {
        self.0.lock().index = index;
    }

    pub fn set_tracks(&self, tracks: Vec<Track>) {
        self.0.lock().tracks = tracks;
    }

    pub fn items(&self) -> Vec<PlaybackItem> {
        self.0.lock().items.clone()
    }

    pub fn is_disabled(&self, kind: TrackKind) -> bool {
        self.0.lock().disabled.contains(&kind)
    }

    pub fn is_released(&self) -> bool {
        self.0.lock().released
    }
}

/// Records every command; state only moves when a test sets it
pub struct FakeEngine {
    kind: EngineKind,
    state: Arc<Mutex<FakeState>>,
}

impl FakeEngine {
    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }
}

impl Engine for FakeEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn set_media_items(&mut self, items: &[PlaybackItem], index: usize, start_ms: u64) {
        {
            let mut state = self.state.lock();
            state.items = items.to_vec();
            state.index = index;
            state.position_ms = start_ms;
        }
        self.record(format!("set_media_items({},{})", index, start_ms));
    }

    fn replace_media_item(&mut self, index: usize, item: &PlaybackItem) {
        if let Some(slot) = self.state.lock().items.get_mut(index) {
            *slot = item.clone();
        }
        self.record(format!("replace_media_item({})", index));
    }

    fn clear_media_items(&mut self) {
        self.state.lock().items.clear();
        self.record("clear_media_items".into());
    }

    fn prepare(&mut self) {
        self.record("prepare".into());
    }

    fn set_play_when_ready(&mut self, play: bool) {
        self.state.lock().play_when_ready = play;
        self.record(format!("set_play_when_ready({})", play));
    }

    fn play(&mut self) {
        self.state.lock().playing = true;
        self.record("play".into());
    }

    fn pause(&mut self) {
        self.state.lock().playing = false;
        self.record("pause".into());
    }

    fn seek_to(&mut self, position_ms: u64) {
        self.state.lock().position_ms = position_ms;
        self.record(format!("seek_to({})", position_ms));
    }

    fn seek_to_item(&mut self, index: usize, position_ms: u64) {
        {
            let mut state = self.state.lock();
            state.index = index;
            state.position_ms = position_ms;
        }
        self.record(format!("seek_to_item({},{})", index, position_ms));
    }

    fn seek_to_previous_item(&mut self) {
        {
            let mut state = self.state.lock();
            state.index = state.index.saturating_sub(1);
        }
        self.record("seek_to_previous_item".into());
    }

    fn state(&self) -> EngineState {
        self.state.lock().state
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn current_index(&self) -> usize {
        self.state.lock().index
    }

    fn item_count(&self) -> usize {
        self.state.lock().items.len()
    }

    fn position_ms(&self) -> u64 {
        self.state.lock().position_ms
    }

    fn buffered_position_ms(&self) -> u64 {
        self.state.lock().buffered_ms
    }

    fn duration_ms(&self) -> Option<u64> {
        self.state.lock().duration_ms
    }

    fn video_size(&self) -> Option<(u32, u32)> {
        self.state.lock().video_size
    }

    fn tracks(&self) -> Vec<Track> {
        self.state.lock().tracks.clone()
    }

    fn set_track_kind_disabled(&mut self, kind: TrackKind, disabled: bool) {
        {
            let mut state = self.state.lock();
            if disabled {
                state.disabled.insert(kind);
            } else {
                state.disabled.remove(&kind);
            }
        }
        self.record(format!("set_track_kind_disabled({:?},{})", kind, disabled));
    }

    fn select_track(&mut self, kind: TrackKind, id: &str) -> bool {
        let found = {
            let mut state = self.state.lock();
            let found = state
                .tracks
                .iter()
                .any(|track| track.kind == kind && track.id == id);
            if found {
                state.disabled.remove(&kind);
                for track in state.tracks.iter_mut().filter(|track| track.kind == kind) {
                    track.selected = track.id == id;
                }
            }
            found
        };
        self.record(format!("select_track({:?},{})", kind, id));
        found
    }

    fn set_playback_speed(&mut self, speed: f32) {
        self.record(format!("set_playback_speed({})", speed));
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volume = volume;
        self.record(format!("set_volume({})", volume));
    }

    fn set_layout(&mut self, layout: Layout) {
        self.state.lock().layout = Some(layout);
        self.record("set_layout".into());
    }

    fn set_aspect_ratio(&mut self, ratio: Option<f32>) {
        self.state.lock().aspect_ratio = ratio;
        self.record(format!("set_aspect_ratio({:?})", ratio));
    }

    fn set_transform(&mut self, _matrix: [f32; 9]) {
        self.record("set_transform".into());
    }

    fn set_subtitle_style(&mut self, style: &SubtitleStyle) {
        self.state.lock().subtitle_style = Some(*style);
        self.record("set_subtitle_style".into());
    }

    fn release(&mut self) {
        self.state.lock().released = true;
        self.record("release".into());
    }
}

/// Builds [`FakeEngine`]s and keeps a handle to each one
#[derive(Clone, Default)]
pub struct FakeEngineFactory {
    engines: Arc<Mutex<Vec<FakeHandle>>>,
    fail: Arc<Mutex<bool>>,
}

impl FakeEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.engines.lock().len()
    }

    /// Handle to the most recently created engine
    pub fn last(&self) -> FakeHandle {
        match self.engines.lock().last() {
            Some(handle) => handle.clone(),
            None => panic!("no engine created yet"),
        }
    }

    pub fn engine(&self, n: usize) -> FakeHandle {
        self.engines.lock()[n].clone()
    }

    /// Make later `create` calls fail
    pub fn fail_next(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

impl EngineFactory for FakeEngineFactory {
    fn create(&self, options: &EngineOptions) -> Result<Box<dyn Engine>> {
        if *self.fail.lock() {
            return Err(PlayerError::Engine("engine unavailable".into()));
        }
        let state = Arc::new(Mutex::new(FakeState::new(options.clone())));
        self.engines.lock().push(FakeHandle(state.clone()));
        Ok(Box::new(FakeEngine {
            kind: options.kind,
            state,
        }))
    }
}

#[derive(Default)]
struct Recorded {
    opened: Vec<String>,
    frames: Vec<u64>,
}

/// Extractors producing `frame@{position}` bytes, recording what was asked of them
#[derive(Default)]
pub struct RecordingExtractors {
    recorded: Arc<Mutex<Recorded>>,
    failing: Option<String>,
}

impl RecordingExtractors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to open `url`
    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing = Some(url.to_string());
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.recorded.lock().opened.clone()
    }

    /// Positions extracted, in extraction order
    pub fn frames(&self) -> Vec<u64> {
        self.recorded.lock().frames.clone()
    }
}

impl ExtractorFactory for RecordingExtractors {
    fn open(&self, url: &str) -> io::Result<Box<dyn FrameExtractor>> {
        if self.failing.as_deref() == Some(url) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "unreadable source"));
        }
        self.recorded.lock().opened.push(url.to_string());
        Ok(Box::new(RecordingExtractor {
            recorded: self.recorded.clone(),
            gate: None,
        }))
    }
}

struct RecordingExtractor {
    recorded: Arc<Mutex<Recorded>>,
    gate: Option<Gate>,
}

impl FrameExtractor for RecordingExtractor {
    fn frame_at(&mut self, position_ms: u64, _width: u32, _height: u32) -> io::Result<Option<Vec<u8>>> {
        self.recorded.lock().frames.push(position_ms);
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        Ok(Some(format!("frame@{}", position_ms).into_bytes()))
    }
}

#[derive(Default)]
struct GateState {
    started: usize,
    released: bool,
}

/// Holds every extraction until released
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl Gate {
    fn pass(&self) {
        let (state, cond) = &*self.inner;
        let mut state = state.lock();
        state.started += 1;
        cond.notify_all();
        while !state.released {
            cond.wait(&mut state);
        }
    }

    /// Block until an extraction is waiting at the gate
    pub fn wait_started(&self, timeout: Duration) {
        let (state, cond) = &*self.inner;
        let mut state = state.lock();
        while state.started == 0 {
            if cond.wait_for(&mut state, timeout).timed_out() {
                panic!("no extraction started within {:?}", timeout);
            }
        }
    }

    pub fn release_all(&self) {
        let (state, cond) = &*self.inner;
        state.lock().released = true;
        cond.notify_all();
    }
}

/// Extractors whose frames block on a shared [`Gate`]
pub struct GatedExtractor {
    recorded: Arc<Mutex<Recorded>>,
    gate: Gate,
}

impl GatedExtractor {
    pub fn factory() -> (Arc<GatedExtractor>, Gate) {
        let gate = Gate::default();
        let factory = Arc::new(GatedExtractor {
            recorded: Arc::default(),
            gate: gate.clone(),
        });
        (factory, gate)
    }

    pub fn frames(&self) -> Vec<u64> {
        self.recorded.lock().frames.clone()
    }
}

impl ExtractorFactory for GatedExtractor {
    fn open(&self, url: &str) -> io::Result<Box<dyn FrameExtractor>> {
        self.recorded.lock().opened.push(url.to_string());
        Ok(Box::new(RecordingExtractor {
            recorded: self.recorded.clone(),
            gate: Some(self.gate.clone()),
        }))
    }
}
