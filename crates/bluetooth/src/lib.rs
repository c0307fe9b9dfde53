// Bluetooth peer-to-peer file and text transfer
//
// Discovery, a single-connection RFCOMM-style server, an outbound client and a
// tagged frame protocol over the resulting byte stream. Platform radios plug in
// through the traits in `adapter`; `loopback` provides a TCP stand-in.

pub mod adapter;
pub mod controller;
pub mod device;
pub mod error;
pub mod frame;
pub mod loopback;
pub mod mutf8;
pub mod session;

// Re-export commonly used types
pub use adapter::{BluetoothAdapter, DiscoveryEvent, ServerSocket, Socket};
pub use controller::{Bluetooth, BluetoothEvent};
pub use device::{BondState, DeviceType, PeerDevice};
pub use error::{BluetoothError, Result};
pub use frame::{Frame, FrameTag};
pub use loopback::LoopbackAdapter;
