// Shared plumbing for the Ghosten platform plugins

pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod logging;

// Re-export commonly used types
pub use config::{BluetoothConfig, PlayerConfig, PluginConfig, ThumbnailConfig};
pub use error::{CoreError, Result};
pub use events::{EventBus, Throttle};
pub use lifecycle::HostLifecycle;
pub use logging::init_logging;
