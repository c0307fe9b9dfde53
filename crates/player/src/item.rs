// Playlist entries as sent by the application shell

use crate::error::PlayerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Container hint used to pick the engine's media source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceType {
    Hls,
    Dash,
    SmoothStreaming,
    Local,
    #[default]
    Other,
}

impl SourceType {
    /// Unknown or missing hints fall back to `Other`
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint {
            Some("hls") => SourceType::Hls,
            Some("dash") => SourceType::Dash,
            Some("ss") => SourceType::SmoothStreaming,
            Some("local") => SourceType::Local,
            _ => SourceType::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Hls => "hls",
            SourceType::Dash => "dash",
            SourceType::SmoothStreaming => "ss",
            SourceType::Local => "local",
            SourceType::Other => "other",
        }
    }
}

impl<'de> Deserialize<'de> for SourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hint = Option::<String>::deserialize(deserializer)?;
        Ok(SourceType::from_hint(hint.as_deref()))
    }
}

impl Serialize for SourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Subtitle container, from the short hint the shell sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SubtitleFormat {
    Ttml,
    WebVtt,
    Ssa,
    SubRip,
}

impl SubtitleFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            SubtitleFormat::Ttml => "application/ttml+xml",
            SubtitleFormat::WebVtt => "text/vtt",
            SubtitleFormat::Ssa => "text/x-ssa",
            SubtitleFormat::SubRip => "application/x-subrip",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            SubtitleFormat::Ttml => "xml",
            SubtitleFormat::WebVtt => "vtt",
            SubtitleFormat::Ssa => "ass",
            SubtitleFormat::SubRip => "srt",
        }
    }
}

impl TryFrom<String> for SubtitleFormat {
    type Error = PlayerError;

    fn try_from(hint: String) -> Result<Self, PlayerError> {
        match hint.as_str() {
            "xml" => Ok(SubtitleFormat::Ttml),
            "vtt" => Ok(SubtitleFormat::WebVtt),
            "ass" => Ok(SubtitleFormat::Ssa),
            "srt" => Ok(SubtitleFormat::SubRip),
            _ => Err(PlayerError::UnknownSubtitleType(hint)),
        }
    }
}

impl From<SubtitleFormat> for &'static str {
    fn from(format: SubtitleFormat) -> Self {
        format.hint()
    }
}

/// External subtitle attached to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtitle {
    pub url: String,
    #[serde(rename = "mimeType")]
    pub format: SubtitleFormat,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub selected: bool,
    #[serde(default)]
    pub label: Option<String>,
}

/// One playlist entry.
///
/// `start` and `end` are trim offsets in milliseconds: playback of the item
/// begins at `start`, and an `end` greater than zero cuts the item `end`
/// milliseconds before its duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackItem {
    #[serde(rename = "type", default)]
    pub source_type: SourceType,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(rename = "subtitle", default, deserialize_with = "null_as_default")]
    pub subtitles: Vec<Subtitle>,
    #[serde(rename = "start", default, deserialize_with = "null_as_default")]
    pub start_position: u64,
    #[serde(rename = "end", default, deserialize_with = "null_as_default")]
    pub end_position: u64,
}

impl PlaybackItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Other,
            url: url.into(),
            mime_type: None,
            title: None,
            description: None,
            poster: None,
            subtitles: Vec::new(),
            start_position: 0,
            end_position: 0,
        }
    }

    pub fn with_trim(mut self, start_ms: u64, end_ms: u64) -> Self {
        self.start_position = start_ms;
        self.end_position = end_ms;
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_item() {
        let item: PlaybackItem = serde_json::from_value(json!({
            "type": "hls",
            "url": "https://cdn.example/master.m3u8",
            "title": "Episode 1",
            "poster": "https://cdn.example/poster.jpg",
            "subtitle": [
                {"url": "https://cdn.example/en.vtt", "mimeType": "vtt", "language": "en", "selected": true},
                {"url": "https://cdn.example/zh.ass", "mimeType": "ass", "label": "中文"}
            ],
            "start": 12000,
            "end": 90000
        }))
        .unwrap();

        assert_eq!(item.source_type, SourceType::Hls);
        assert_eq!(item.start_position, 12_000);
        assert_eq!(item.end_position, 90_000);
        assert_eq!(item.subtitles.len(), 2);
        assert_eq!(item.subtitles[0].format, SubtitleFormat::WebVtt);
        assert!(item.subtitles[0].selected);
        assert_eq!(item.subtitles[1].format.mime_type(), "text/x-ssa");
        assert!(!item.subtitles[1].selected);
    }

    #[test]
    fn test_minimal_item_uses_defaults() {
        let item: PlaybackItem = serde_json::from_value(json!({
            "url": "file:///sdcard/movie.mkv",
            "type": null,
            "subtitle": null,
            "start": null
        }))
        .unwrap();
        assert_eq!(item.source_type, SourceType::Other);
        assert!(item.subtitles.is_empty());
        assert_eq!(item.start_position, 0);
        assert_eq!(item.end_position, 0);
    }

    #[test]
    fn test_source_type_hints() {
        assert_eq!(SourceType::from_hint(Some("dash")), SourceType::Dash);
        assert_eq!(SourceType::from_hint(Some("ss")), SourceType::SmoothStreaming);
        assert_eq!(SourceType::from_hint(Some("local")), SourceType::Local);
        assert_eq!(SourceType::from_hint(Some("mp4")), SourceType::Other);
        assert_eq!(SourceType::from_hint(None), SourceType::Other);
    }

    #[test]
    fn test_unknown_subtitle_type_rejected() {
        let err = serde_json::from_value::<PlaybackItem>(json!({
            "url": "https://cdn.example/a.mp4",
            "subtitle": [{"url": "https://cdn.example/a.sub", "mimeType": "sub"}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("Unknown Subtitle Mime Type"));
    }

    #[test]
    fn test_subtitle_mime_types() {
        let cases = [
            ("xml", "application/ttml+xml"),
            ("vtt", "text/vtt"),
            ("ass", "text/x-ssa"),
            ("srt", "application/x-subrip"),
        ];
        for (hint, mime) in cases {
            let format = SubtitleFormat::try_from(hint.to_string()).unwrap();
            assert_eq!(format.mime_type(), mime);
            assert_eq!(format.hint(), hint);
        }
    }
}
