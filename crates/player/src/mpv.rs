// mpv engine support: startup options and observed-property aggregation
//
// mpv reports state as independent property changes; the aggregator folds them
// into the same `EngineEvent`s the other engine produces.

use crate::engine::EngineEvent;
use crate::state::PlaybackStatus;

/// Properties the engine must observe for the aggregator to work
pub const OBSERVED_PROPERTIES: [&str; 9] = [
    "time-pos/full",
    "duration/full",
    "playlist-playing-pos",
    "pause",
    "core-idle",
    "paused-for-cache",
    "seeking",
    "speed",
    "track-list",
];

const HWDEC_CODECS: &str = "h264,hevc,mpeg4,mpeg2video,vp8,vp9,av1";

/// Demuxer cache size in MiB
const CACHE_MEGS: u64 = 64;

/// What an mpv engine applies before `init` and observes right after it
#[derive(Debug, Clone, PartialEq)]
pub struct MpvSetup {
    pub options: Vec<(&'static str, String)>,
    pub observed: &'static [&'static str],
}

impl MpvSetup {
    pub fn new(language: Option<&str>, hwdec: bool) -> Self {
        Self {
            options: init_options(language, hwdec),
            observed: &OBSERVED_PROPERTIES,
        }
    }
}

/// Option strings applied before `init`. Paths are relative to the mpv config dir.
pub fn init_options(language: Option<&str>, hwdec: bool) -> Vec<(&'static str, String)> {
    let mut opts: Vec<(&'static str, String)> = vec![
        ("config", "yes".into()),
        ("profile", "fast".into()),
        ("ytdl", "no".into()),
        ("osd-on-seek", "no".into()),
        ("resume-playback", "no".into()),
        ("save-position-on-quit", "no".into()),
        ("idle", "yes".into()),
        ("vo", "gpu".into()),
        ("gpu-context", "android".into()),
        ("opengl-es", "yes".into()),
        ("ao", "audiotrack,opensles".into()),
        ("input-default-bindings", "no".into()),
        ("demuxer-max-bytes", (CACHE_MEGS * 1024 * 1024).to_string()),
        ("demuxer-max-back-bytes", (CACHE_MEGS * 1024 * 1024).to_string()),
        ("sub-back-color", "#000000".into()),
        ("vd-lavc-film-grain", "cpu".into()),
    ];
    if let Some(language) = language {
        opts.push(("alang", language.to_string()));
        opts.push(("slang", language.to_string()));
    }
    if hwdec {
        opts.push(("hwdec", "auto".into()));
        opts.push(("hwdec-codecs", HWDEC_CODECS.into()));
    } else {
        opts.push(("hwdec", "no".into()));
    }
    opts
}

/// Value of an observed property
#[derive(Debug, Clone, PartialEq)]
pub enum MpvValue {
    None,
    Flag(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

/// Folds property changes into engine events
#[derive(Debug, Default)]
pub struct MpvAggregator {
    core_idle: bool,
    pause: bool,
    paused_for_cache: bool,
    seeking: bool,
}

impl MpvAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PlaybackStatus {
        if self.paused_for_cache || self.seeking {
            PlaybackStatus::Buffering
        } else if self.pause {
            PlaybackStatus::Paused
        } else if self.core_idle {
            PlaybackStatus::Idle
        } else {
            PlaybackStatus::Playing
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause
    }

    pub fn property_changed(&mut self, name: &str, value: MpvValue) -> Vec<EngineEvent> {
        match (name, value) {
            ("paused-for-cache", MpvValue::Flag(flag)) => {
                self.paused_for_cache = flag;
                self.status_changed()
            }
            ("pause", MpvValue::Flag(flag)) => {
                self.pause = flag;
                self.status_changed()
            }
            ("core-idle", MpvValue::Flag(flag)) => {
                self.core_idle = flag;
                self.status_changed()
            }
            ("seeking", MpvValue::Flag(flag)) => {
                self.seeking = flag;
                self.status_changed()
            }
            ("time-pos/full", MpvValue::Int(seconds)) => {
                vec![EngineEvent::Position(seconds.max(0) as u64 * 1000)]
            }
            ("duration/full", MpvValue::Double(seconds)) => {
                vec![EngineEvent::Duration((seconds.max(0.0) * 1000.0) as u64)]
            }
            ("playlist-playing-pos", MpvValue::Int(index)) if index >= 0 => {
                vec![EngineEvent::ItemPlaying(index as usize)]
            }
            ("track-list", _) => vec![EngineEvent::TracksChanged],
            (name, value) => {
                log::debug!("mpv property {}: {:?}", name, value);
                Vec::new()
            }
        }
    }

    fn status_changed(&self) -> Vec<EngineEvent> {
        vec![EngineEvent::StatusReported(self.status())]
    }
}
