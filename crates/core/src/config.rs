// Plugin configuration

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Well-known RFCOMM service record used by both transfer peers
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x026badfe_70c3_4fbc_b6ba_06fea8d70a51);

/// Service name advertised by the transfer server
pub const DEFAULT_SERVICE_NAME: &str = "Ghosten Player Server";

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("ghosten")
}

/// Top-level configuration for every plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub bluetooth: BluetoothConfig,
    pub player: PlayerConfig,
}

impl PluginConfig {
    /// Parse a configuration from a JSON document. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PluginConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bluetooth.chunk_size == 0 {
            return Err(CoreError::Config("bluetooth.chunk_size must be > 0".into()));
        }
        if self.player.position_interval_ms == 0 {
            return Err(CoreError::Config(
                "player.position_interval_ms must be > 0".into(),
            ));
        }
        if self.player.thumbnail.max_pending == 0 {
            return Err(CoreError::Config(
                "player.thumbnail.max_pending must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Bluetooth transfer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Name of the service record the server listens under
    pub service_name: String,
    /// Service identifier shared by client and server
    pub service_uuid: Uuid,
    /// Directory received files are written to
    pub cache_dir: PathBuf,
    /// Buffer size used when streaming file payloads
    pub chunk_size: usize,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_uuid: DEFAULT_SERVICE_UUID,
            cache_dir: default_cache_dir(),
            chunk_size: 4 * 1024,
        }
    }
}

/// Playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Interval between position/buffering reports while playing
    pub position_interval_ms: u64,
    /// How long before an end-trim skip the warning is raised
    pub skip_warning_ms: u64,
    pub thumbnail: ThumbnailConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            position_interval_ms: 1000,
            skip_warning_ms: 15_000,
            thumbnail: ThumbnailConfig::default(),
        }
    }
}

/// Thumbnail extraction and cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Maximum number of requests waiting for the worker
    pub max_pending: usize,
    pub width: u32,
    pub height: u32,
    /// Directory thumbnail images are written to
    pub cache_dir: PathBuf,
    /// Lookup table location; defaults to `playerThumbnails.db` inside `cache_dir`
    pub database: Option<PathBuf>,
}

impl ThumbnailConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.cache_dir.join("playerThumbnails.db"))
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_pending: 4,
            width: 600,
            height: 400,
            cache_dir: default_cache_dir(),
            database: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PluginConfig::default();
        assert_eq!(config.bluetooth.service_name, "Ghosten Player Server");
        assert_eq!(
            config.bluetooth.service_uuid.to_string(),
            "026badfe-70c3-4fbc-b6ba-06fea8d70a51"
        );
        assert_eq!(config.player.skip_warning_ms, 15_000);
        assert_eq!(config.player.thumbnail.max_pending, 4);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            PluginConfig::from_json(r#"{"player": {"position_interval_ms": 250}}"#).unwrap();
        assert_eq!(config.player.position_interval_ms, 250);
        assert_eq!(config.player.skip_warning_ms, 15_000);
        assert_eq!(config.bluetooth.chunk_size, 4096);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = PluginConfig::from_json(r#"{"bluetooth": {"chunk_size": 0}}"#).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PluginConfig::load(dir.path().join("missing.json")).unwrap();
        assert_eq!(config.player.position_interval_ms, 1000);
    }

    #[test]
    fn test_database_path_defaults_into_cache_dir() {
        let thumbnail = ThumbnailConfig {
            cache_dir: PathBuf::from("/tmp/thumbs"),
            ..Default::default()
        };
        assert_eq!(
            thumbnail.database_path(),
            PathBuf::from("/tmp/thumbs/playerThumbnails.db")
        );
    }
}
