// Shell-facing command surface for the Ghosten plugins
//
// Each plugin is a `MethodHandler` taking named calls with JSON arguments.
// Controller and player events are mapped to `ChannelEvent`s the host bridge
// forwards to the application shell.

pub mod bluetooth;
pub mod call;
pub mod error;
pub mod player;
pub mod registry;

// Re-export commonly used types
pub use bluetooth::BluetoothChannel;
pub use call::{ChannelEvent, MethodCall, MethodHandler, MethodResult};
pub use error::{ChannelError, MethodError};
pub use player::PlayerChannel;
