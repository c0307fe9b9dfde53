// Errors crossing the method-call boundary

use ghosten_bluetooth::BluetoothError;
use ghosten_player::PlayerError;
use thiserror::Error;

/// Failures while dispatching a call
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid arguments for {method}: {source}")]
    Arguments {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Bluetooth(#[from] BluetoothError),

    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error("Invalid channel ID: {0}")]
    UnknownChannel(i64),
}

impl ChannelError {
    /// Error code reported to the shell
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::Arguments { .. } => "ARGUMENTS",
            ChannelError::Bluetooth(err) => err.tag(),
            ChannelError::Player(_) => "PLAYER",
            ChannelError::UnknownChannel(_) => "CHANNEL",
        }
    }
}

/// What the shell receives instead of a result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MethodError {
    #[error("method not implemented")]
    NotImplemented,

    #[error("{code}: {message}")]
    Failed { code: String, message: String },
}

impl From<ChannelError> for MethodError {
    fn from(err: ChannelError) -> Self {
        log::error!("{}", err);
        MethodError::Failed {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<BluetoothError> for MethodError {
    fn from(err: BluetoothError) -> Self {
        ChannelError::from(err).into()
    }
}

impl From<PlayerError> for MethodError {
    fn from(err: PlayerError) -> Self {
        ChannelError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bluetooth_errors_keep_tag_and_message() {
        let err = MethodError::from(BluetoothError::NoConnection);
        assert_eq!(
            err,
            MethodError::Failed {
                code: "BLUETOOTH".into(),
                message: "No Connection".into()
            }
        );
    }

    #[test]
    fn test_player_error_code() {
        let err = MethodError::from(PlayerError::NoSource);
        assert!(matches!(err, MethodError::Failed { ref code, .. } if code == "PLAYER"));
    }
}
