// Platform capability traits for the Bluetooth radio

use crate::device::PeerDevice;
use crate::error::Result;
use crossbeam_channel::Sender;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Notifications produced while an inquiry scan runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Found(PeerDevice),
    /// The scan ended, naturally or because it was cancelled
    Finished,
}

/// The local radio.
///
/// Implementations wrap the platform SDK; all methods may be called from any
/// thread.
pub trait BluetoothAdapter: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Ask the user to turn the radio on; resolves to whether it is on afterwards
    fn request_enable(&self) -> Result<bool>;

    fn is_discovering(&self) -> bool;

    /// Start an inquiry scan, pushing results into `sink` and finishing with
    /// [`DiscoveryEvent::Finished`]. Returns false if the radio refused.
    fn start_discovery(&self, sink: Sender<DiscoveryEvent>) -> bool;

    fn cancel_discovery(&self);

    fn is_discoverable(&self) -> bool;

    /// Remaining discoverable window, when the platform exposes it
    fn discoverable_timeout(&self) -> Option<Duration>;

    /// Ask the user to make this device discoverable; resolves to the granted seconds (0 if refused)
    fn request_discoverable(&self, duration: Duration) -> Result<u32>;

    fn bonded_devices(&self) -> Result<Vec<PeerDevice>>;

    /// Open a listening socket registered under `name` / `service`
    fn listen(&self, name: &str, service: Uuid) -> io::Result<Arc<dyn ServerSocket>>;

    /// Create an unconnected client socket towards `address`
    fn create_socket(&self, address: &str, service: Uuid) -> io::Result<Arc<dyn Socket>>;
}

/// A listening socket. `close` from another thread unblocks a pending `accept`.
pub trait ServerSocket: Send + Sync {
    fn accept(&self) -> io::Result<Arc<dyn Socket>>;

    fn close(&self) -> io::Result<()>;
}

/// One stream socket. `close` from another thread unblocks pending
/// `connect`, reads and writes with an I/O error.
pub trait Socket: Send + Sync {
    fn connect(&self) -> io::Result<()>;

    fn remote_device(&self) -> PeerDevice;

    fn input_stream(&self) -> io::Result<Box<dyn Read + Send>>;

    fn output_stream(&self) -> io::Result<Box<dyn Write + Send>>;

    fn close(&self) -> io::Result<()>;
}
