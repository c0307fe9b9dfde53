// Video player plugin: method dispatch onto one `Player` and its outgoing invocations

use crate::call::{ChannelEvent, MethodCall, MethodHandler, MethodResult};
use crate::error::MethodError;
use crossbeam_channel::Receiver;
use ghosten_core::{EventBus, HostLifecycle, PlayerConfig};
use ghosten_player::player::argb_colors;
use ghosten_player::{
    EngineFactory, ExtractorFactory, InitOptions, PlaybackItem, Player, PlayerEvent, PlayerOption,
    SkipKind, TrackKind,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Owns the player between `init` and `dispose`.
///
/// Calls other than `init`, `canPip` and `requestPip` are ignored while no
/// player exists and answer `null`.
pub struct PlayerChannel {
    engines: Arc<dyn EngineFactory + Sync>,
    extractors: Option<Arc<dyn ExtractorFactory>>,
    config: PlayerConfig,
    events: EventBus<PlayerEvent>,
    pip_supported: bool,
    player: Option<Player>,
}

impl PlayerChannel {
    pub fn new(engines: Arc<dyn EngineFactory + Sync>, config: PlayerConfig) -> Self {
        Self {
            engines,
            extractors: None,
            config,
            events: EventBus::new(),
            pip_supported: false,
            player: None,
        }
    }

    /// Serve `getVideoThumbnail` with frames from `extractors`
    pub fn with_thumbnails(mut self, extractors: Arc<dyn ExtractorFactory>) -> Self {
        self.extractors = Some(extractors);
        self
    }

    /// Whether the host supports picture-in-picture at all
    pub fn with_picture_in_picture(mut self, supported: bool) -> Self {
        self.pip_supported = supported;
        self
    }

    /// Events of every player this channel creates
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    /// For the host to pump engine events and ticks into the live player
    pub fn player_mut(&mut self) -> Option<&mut Player> {
        self.player.as_mut()
    }

    fn init(&mut self, call: &MethodCall) -> MethodResult {
        if self.player.is_some() {
            log::debug!("Player already initialized");
            return Ok(Value::Null);
        }
        let init: InitOptions = match &call.arguments {
            Value::Null => InitOptions::default(),
            _ => call.arguments()?,
        };
        let mut player = Player::new(
            Box::new(self.engines.clone()),
            init,
            self.config.clone(),
            self.events.clone(),
        )?;
        if let Some(extractors) = &self.extractors {
            player = player.with_thumbnails(extractors.clone())?;
        }
        self.player = Some(player);
        Ok(Value::Null)
    }

    fn dispatch(&mut self, call: &MethodCall) -> MethodResult {
        match call.method.as_str() {
            "canPip" => return Ok(json!(self.pip_supported)),
            "requestPip" => {
                let allowed = self.pip_supported
                    && self
                        .player
                        .as_ref()
                        .is_some_and(Player::can_enter_picture_in_picture);
                return Ok(json!(allowed));
            }
            "init" => return self.init(call),
            "dispose" => {
                if let Some(mut player) = self.player.take() {
                    player.dispose();
                }
                return Ok(Value::Null);
            }
            _ => {}
        }

        let Some(player) = self.player.as_mut() else {
            return match is_player_method(&call.method) {
                true => Ok(Value::Null),
                false => Err(MethodError::NotImplemented),
            };
        };

        match call.method.as_str() {
            "play" => player.play(),
            "pause" => player.pause(),
            "next" => player.next(call.arguments()?),
            "previous" => player.previous(),
            "seekTo" => player.seek_to(call.arguments()?),
            "setSource" => player.set_source(call.arguments::<Option<PlaybackItem>>()?),
            "setSources" => {
                let playlist: Vec<PlaybackItem> = call.argument("playlist")?;
                let index: usize = call.argument("index")?;
                player.set_sources(playlist, index)?;
            }
            "updateSource" => {
                let source: PlaybackItem = call.argument("source")?;
                let index = call
                    .argument::<Option<usize>>("index")?
                    .unwrap_or_else(|| player.current_index());
                player.update_source(source, index)?;
            }
            "setSkipPosition" => {
                let kind: String = call.argument("type")?;
                let Some(kind) = SkipKind::from_name(&kind) else {
                    log::debug!("Ignoring skip position of type {}", kind);
                    return Ok(Value::Null);
                };
                let offsets: Vec<u64> = call.argument("list")?;
                player.set_skip_position(kind, &offsets);
            }
            "setTrack" => {
                let name: Option<String> = call.argument("type")?;
                let Some(kind) = name.as_deref().and_then(TrackKind::from_name) else {
                    log::debug!("Ignoring track of type {:?}", name);
                    return Ok(Value::Null);
                };
                let id: Option<String> = call.argument("id")?;
                player.set_track(Some(kind), id.as_deref());
            }
            "setPlaybackSpeed" => player.set_playback_speed(call.arguments::<f64>()? as f32),
            "setVolume" => player.set_volume(call.arguments::<f64>()? as f32),
            "setAspectRatio" => {
                let ratio: Option<f64> = call.arguments()?;
                player.set_aspect_ratio(ratio.map(|r| r as f32));
            }
            "setTransform" => {
                let matrix: Vec<f64> = call.argument("matrix")?;
                player.set_transform(&matrix)?;
            }
            "fullscreen" => player.fullscreen(call.arguments()?),
            "setPlayerOption" => {
                let name: String = call.argument("name")?;
                let value: Value = call.argument("value")?;
                match PlayerOption::from_json(&name, &value)? {
                    Some(option) => player.set_player_option(option)?,
                    None => log::warn!("Unsupported player option {} = {}", name, value),
                }
            }
            "setSubtitleStyle" => {
                let style: Vec<i64> = call.argument("style")?;
                player.set_subtitle_style(&argb_colors(&style));
            }
            "getVideoThumbnail" => {
                let position: u64 = call.argument("position")?;
                // The path follows as a `videoThumbnail` invocation carrying this id
                return Ok(json!(player.request_video_thumbnail(position)?));
            }
            _ => return Err(MethodError::NotImplemented),
        }
        Ok(Value::Null)
    }
}

fn is_player_method(method: &str) -> bool {
    matches!(
        method,
        "play"
            | "pause"
            | "next"
            | "previous"
            | "seekTo"
            | "setSource"
            | "setSources"
            | "updateSource"
            | "setSkipPosition"
            | "setTrack"
            | "setPlaybackSpeed"
            | "setVolume"
            | "setAspectRatio"
            | "setTransform"
            | "fullscreen"
            | "setPlayerOption"
            | "setSubtitleStyle"
            | "getVideoThumbnail"
    )
}

impl MethodHandler for PlayerChannel {
    fn handle(&mut self, call: &MethodCall) -> MethodResult {
        log::debug!("player call {}", call.method);
        self.dispatch(call)
    }
}

impl HostLifecycle for PlayerChannel {
    fn on_resume(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.on_resume();
        }
    }

    fn on_pause(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.on_pause();
        }
    }

    fn on_destroy(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.on_destroy();
        }
    }
}

/// Map a player event onto the method the shell expects
pub fn channel_event(event: &PlayerEvent) -> ChannelEvent {
    let (method, arguments) = match event {
        PlayerEvent::IsInitialized => ("isInitialized", Value::Null),
        PlayerEvent::UpdateStatus(status) => ("updateStatus", json!(status.as_str())),
        PlayerEvent::Position(position) => ("position", json!(position)),
        PlayerEvent::BufferingUpdate(buffered) => ("bufferingUpdate", json!(buffered)),
        PlayerEvent::Duration(duration) => ("duration", json!(duration)),
        PlayerEvent::MediaChanged { index, position } => {
            ("mediaChanged", json!({"index": index, "position": position}))
        }
        PlayerEvent::BeforeMediaChange { index, position } => {
            ("beforeMediaChange", json!({"index": index, "position": position}))
        }
        PlayerEvent::TracksChanged(tracks) => (
            "tracksChanged",
            serde_json::to_value(tracks).unwrap_or(Value::Null),
        ),
        PlayerEvent::WillSkip => ("willSkip", Value::Null),
        PlayerEvent::Error(message) => ("error", json!(message)),
        PlayerEvent::FatalError(message) => ("fatalError", json!(message)),
        PlayerEvent::Log { level, message } => ("log", json!({"level": level, "message": message})),
        PlayerEvent::VolumeChanged(volume) => ("volumeChanged", json!(volume)),
        PlayerEvent::VideoThumbnail { request_id, path } => (
            "videoThumbnail",
            json!({
                "requestId": request_id,
                "path": path.as_ref().map(|p| p.to_string_lossy().into_owned()),
            }),
        ),
    };
    ChannelEvent::Invoke { method, arguments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghosten_player::testing::{FakeEngineFactory, GatedExtractor};
    use std::time::Duration;
    use ghosten_player::{EngineEvent, EngineState, PlaybackStatus, Track};

    fn channel() -> (PlayerChannel, FakeEngineFactory) {
        let factory = FakeEngineFactory::new();
        let channel = PlayerChannel::new(Arc::new(factory.clone()), PlayerConfig::default());
        (channel, factory)
    }

    fn call(channel: &mut PlayerChannel, method: &str, arguments: Value) -> MethodResult {
        channel.handle(&MethodCall::new(method, arguments))
    }

    fn playlist() -> Value {
        json!({
            "playlist": [
                {"url": "https://media.example/1.mkv", "type": "other", "start": 1000},
                {"url": "https://media.example/2.m3u8", "type": "hls", "subtitle": [
                    {"url": "https://media.example/2.srt", "mimeType": "srt", "language": "en"}
                ]}
            ],
            "index": 0
        })
    }

    #[test]
    fn test_calls_before_init_are_ignored() {
        let (mut channel, factory) = channel();
        assert_eq!(call(&mut channel, "play", Value::Null), Ok(Value::Null));
        assert_eq!(call(&mut channel, "setSources", playlist()), Ok(Value::Null));
        assert_eq!(call(&mut channel, "dispose", Value::Null), Ok(Value::Null));
        assert_eq!(factory.created(), 0);
        assert_eq!(
            call(&mut channel, "hide", Value::Null),
            Err(MethodError::NotImplemented)
        );
    }

    #[test]
    fn test_init_creates_player_once() {
        let (mut channel, factory) = channel();
        let events = channel.subscribe();
        call(&mut channel, "init", json!({"type": "mpv", "language": "en"})).unwrap();
        call(&mut channel, "init", json!({"type": "media3"})).unwrap();

        assert_eq!(factory.created(), 1);
        assert_eq!(
            factory.last().with(|state| state.options.language.clone()),
            Some("en".to_string())
        );
        assert_eq!(
            channel_event(&events.try_recv().unwrap()),
            ChannelEvent::Invoke {
                method: "isInitialized",
                arguments: Value::Null
            }
        );
    }

    #[test]
    fn test_init_rejects_unknown_engine() {
        let (mut channel, factory) = channel();
        let result = call(&mut channel, "init", json!({"type": "vlc"}));
        assert!(matches!(result, Err(MethodError::Failed { code, .. }) if code == "ARGUMENTS"));
        assert_eq!(factory.created(), 0);
        assert!(channel.player().is_none());
    }

    #[test]
    fn test_set_sources_decodes_playlist() {
        let (mut channel, factory) = channel();
        call(&mut channel, "init", Value::Null).unwrap();
        call(&mut channel, "setSources", playlist()).unwrap();

        let items = factory.last().items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].start_position, 1000);
        assert_eq!(items[1].subtitles[0].language.as_deref(), Some("en"));
        assert!(factory.last().calls().contains(&"set_media_items(0,1000)".to_string()));
    }

    #[test]
    fn test_player_errors_surface() {
        let (mut channel, _) = channel();
        call(&mut channel, "init", Value::Null).unwrap();
        let result = call(&mut channel, "setSources", json!({"playlist": [], "index": 0}));
        assert!(matches!(result, Err(MethodError::Failed { code, .. }) if code == "PLAYER"));

        let result = call(
            &mut channel,
            "setSources",
            json!({"playlist": [{"url": "u", "subtitle": [{"url": "s", "mimeType": "sup"}]}], "index": 0}),
        );
        assert!(matches!(
            result,
            Err(MethodError::Failed { message, .. }) if message.contains("sup")
        ));
    }

    #[test]
    fn test_commands_reach_engine() {
        let (mut channel, factory) = channel();
        call(&mut channel, "init", Value::Null).unwrap();
        call(&mut channel, "setSources", playlist()).unwrap();
        let engine = factory.last();
        engine.set_duration(Some(90_000));
        engine.clear_calls();

        call(&mut channel, "next", json!(2)).unwrap();
        call(&mut channel, "seekTo", json!(5000)).unwrap();
        call(&mut channel, "setPlaybackSpeed", json!(1.5)).unwrap();
        call(&mut channel, "setTrack", json!({"type": "sub", "id": null})).unwrap();
        call(&mut channel, "setAspectRatio", json!(2.0)).unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                "seek_to(90000)",
                "seek_to(5000)",
                "set_playback_speed(1.5)",
                "set_track_kind_disabled(Text,true)",
                "set_aspect_ratio(Some(2.0))",
            ]
        );
    }

    #[test]
    fn test_skip_positions_and_update_source() {
        let (mut channel, factory) = channel();
        call(&mut channel, "init", Value::Null).unwrap();
        call(&mut channel, "setSources", playlist()).unwrap();

        call(&mut channel, "setSkipPosition", json!({"type": "end", "list": [5000, 6000]})).unwrap();
        let player = channel.player().unwrap();
        assert_eq!(player.playlist()[1].end_position, 6000);

        factory.last().set_index(1);
        call(&mut channel, "updateSource", json!({"source": {"url": "https://media.example/3.mp4"}})).unwrap();
        assert_eq!(
            channel.player().unwrap().playlist()[1].url,
            "https://media.example/3.mp4"
        );
    }

    #[test]
    fn test_player_option_rebuilds_engine() {
        let (mut channel, factory) = channel();
        call(&mut channel, "init", Value::Null).unwrap();
        call(
            &mut channel,
            "setPlayerOption",
            json!({"name": "extensionRendererMode", "value": 2}),
        )
        .unwrap();
        assert_eq!(factory.created(), 2);
        assert_eq!(
            factory.last().with(|state| state.options.extension_renderer_mode),
            Some(2)
        );

        // Unknown options are ignored
        call(&mut channel, "setPlayerOption", json!({"name": "hwdec", "value": true})).unwrap();
        assert_eq!(factory.created(), 2);

        let result = call(
            &mut channel,
            "setPlayerOption",
            json!({"name": "extensionRendererMode", "value": 1_i64 << 40}),
        );
        assert!(matches!(result, Err(MethodError::Failed { code, .. }) if code == "PLAYER"));
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn test_unknown_track_and_skip_kinds_are_ignored() {
        let (mut channel, factory) = channel();
        call(&mut channel, "init", Value::Null).unwrap();
        call(&mut channel, "setSources", playlist()).unwrap();
        factory.last().clear_calls();

        assert_eq!(
            call(&mut channel, "setTrack", json!({"type": "image", "id": "1"})),
            Ok(Value::Null)
        );
        assert_eq!(
            call(&mut channel, "setSkipPosition", json!({"type": "middle", "list": [1000]})),
            Ok(Value::Null)
        );
        assert!(factory.last().calls().is_empty());
        let player = channel.player().unwrap();
        assert!(player.playlist().iter().all(|item| item.end_position == 0));
    }

    #[test]
    fn test_thumbnail_answers_through_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PlayerConfig::default();
        config.thumbnail.cache_dir = dir.path().to_path_buf();
        let factory = FakeEngineFactory::new();
        let (extractors, gate) = GatedExtractor::factory();
        let mut channel =
            PlayerChannel::new(Arc::new(factory), config).with_thumbnails(extractors);
        let events = channel.subscribe();
        call(&mut channel, "init", Value::Null).unwrap();
        call(&mut channel, "setSources", playlist()).unwrap();

        // Answers with an id while the frame is still being extracted
        let id = call(&mut channel, "getVideoThumbnail", json!({"position": 1000})).unwrap();
        gate.wait_started(Duration::from_secs(5));
        gate.release_all();

        loop {
            let event = channel_event(&events.recv_timeout(Duration::from_secs(5)).unwrap());
            if let ChannelEvent::Invoke {
                method: "videoThumbnail",
                arguments,
            } = event
            {
                assert_eq!(arguments["requestId"], id);
                assert!(arguments["path"].as_str().unwrap().ends_with(".jpg"));
                break;
            }
        }
    }

    #[test]
    fn test_thumbnail_without_source_fails() {
        let (mut channel, _) = channel();
        call(&mut channel, "init", Value::Null).unwrap();
        let result = call(&mut channel, "getVideoThumbnail", json!({"position": 1000}));
        assert!(matches!(result, Err(MethodError::Failed { message, .. }) if message == "No Source"));
    }

    #[test]
    fn test_picture_in_picture() {
        let (channel, factory) = channel();
        let mut channel = channel.with_picture_in_picture(true);
        assert_eq!(call(&mut channel, "canPip", Value::Null), Ok(json!(true)));
        assert_eq!(call(&mut channel, "requestPip", Value::Null), Ok(json!(false)));

        call(&mut channel, "init", Value::Null).unwrap();
        assert_eq!(call(&mut channel, "requestPip", Value::Null), Ok(json!(false)));
        factory.last().set_state(EngineState::Ready);
        assert_eq!(call(&mut channel, "requestPip", Value::Null), Ok(json!(true)));

        let mut unsupported = channel.with_picture_in_picture(false);
        assert_eq!(call(&mut unsupported, "canPip", Value::Null), Ok(json!(false)));
        assert_eq!(call(&mut unsupported, "requestPip", Value::Null), Ok(json!(false)));
    }

    #[test]
    fn test_dispose_releases_and_allows_new_init() {
        let (mut channel, factory) = channel();
        call(&mut channel, "init", Value::Null).unwrap();
        let first = factory.last();
        call(&mut channel, "dispose", Value::Null).unwrap();
        assert!(first.is_released());
        assert!(channel.player().is_none());

        call(&mut channel, "init", Value::Null).unwrap();
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn test_lifecycle_forwards_to_player() {
        let (mut channel, factory) = channel();
        channel.on_resume();
        call(&mut channel, "init", Value::Null).unwrap();
        let engine = factory.last();
        engine.set_state(EngineState::Ready);
        engine.clear_calls();

        channel.on_pause();
        channel.on_resume();
        channel.on_destroy();
        assert_eq!(engine.calls(), vec!["pause", "play", "release"]);
        assert!(channel.player().is_none());
    }

    #[test]
    fn test_event_mapping() {
        assert_eq!(
            channel_event(&PlayerEvent::UpdateStatus(PlaybackStatus::Buffering)),
            ChannelEvent::Invoke {
                method: "updateStatus",
                arguments: json!("buffering")
            }
        );
        assert_eq!(
            channel_event(&PlayerEvent::BeforeMediaChange {
                index: 1,
                position: 300
            }),
            ChannelEvent::Invoke {
                method: "beforeMediaChange",
                arguments: json!({"index": 1, "position": 300})
            }
        );
        let tracks = vec![Track {
            id: "2".into(),
            label: None,
            kind: TrackKind::Audio,
            selected: true,
            supported: true,
        }];
        assert_eq!(
            channel_event(&PlayerEvent::TracksChanged(tracks)),
            ChannelEvent::Invoke {
                method: "tracksChanged",
                arguments: json!([{"id": "2", "label": null, "type": "audio", "selected": true}])
            }
        );
        assert_eq!(
            channel_event(&PlayerEvent::Log {
                level: 3,
                message: "m".into()
            }),
            ChannelEvent::Invoke {
                method: "log",
                arguments: json!({"level": 3, "message": "m"})
            }
        );
    }

    #[test]
    fn test_engine_events_flow_to_subscribers() {
        let (mut channel, factory) = channel();
        let events = channel.subscribe();
        call(&mut channel, "init", Value::Null).unwrap();
        call(&mut channel, "setSources", playlist()).unwrap();
        events.try_iter().count();

        factory.last().set_state(EngineState::Ready);
        channel
            .player_mut()
            .unwrap()
            .handle_engine_event(EngineEvent::StateChanged(EngineState::Buffering));
        let methods: Vec<&str> = events
            .try_iter()
            .map(|event| match channel_event(&event) {
                ChannelEvent::Invoke { method, .. } => method,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(methods, vec!["updateStatus", "bufferingUpdate"]);
    }
}
