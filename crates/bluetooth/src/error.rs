// Error handling for the Bluetooth transfer plugin

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Caller-visible Bluetooth failures.
///
/// Every variant is reported under the fixed tag [`BluetoothError::TAG`] with
/// the message produced by `Display`.
#[derive(Debug, Error)]
pub enum BluetoothError {
    /// No adapter is available on this device
    #[error("Init Failed")]
    InitFailed,

    /// A discovery is already running
    #[error("Bluetooth is Discovering")]
    Discovering,

    #[error("StartDiscovery Failed")]
    StartDiscoveryFailed,

    /// Write requested without an open connection
    #[error("No Connection")]
    NoConnection,

    #[error("File Not Existed")]
    FileNotFound(PathBuf),

    #[error("Bluetooth Server Listen Failed")]
    Listen(#[source] io::Error),

    #[error("Bluetooth Client Connect to a Server Failed")]
    Connect(#[source] io::Error),

    #[error("Bluetooth Connection Write Text Failed, Text: {text}")]
    WriteText {
        text: String,
        #[source]
        source: io::Error,
    },

    #[error("Bluetooth Connection Write File Failed, Filename: {filename}")]
    WriteFile {
        filename: String,
        #[source]
        source: io::Error,
    },

    /// The platform rejected an adapter request (enable, discoverable)
    #[error("Bluetooth Adapter Request Failed: {0}")]
    Adapter(String),
}

impl BluetoothError {
    pub const TAG: &'static str = "BLUETOOTH";

    pub fn tag(&self) -> &'static str {
        Self::TAG
    }
}

/// Result type alias for Bluetooth operations
pub type Result<T> = std::result::Result<T, BluetoothError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_messages() {
        assert_eq!(BluetoothError::Discovering.to_string(), "Bluetooth is Discovering");
        assert_eq!(BluetoothError::NoConnection.to_string(), "No Connection");
        let err = BluetoothError::WriteText {
            text: "hello".into(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "pipe"),
        };
        assert_eq!(
            err.to_string(),
            "Bluetooth Connection Write Text Failed, Text: hello"
        );
        assert_eq!(err.tag(), "BLUETOOTH");
    }
}
