// Bluetooth transfer controller
//
// Owns the adapter handle and every session (discovery pump, acceptor,
// connector, active connection). All commands are issued by one owner; worker
// threads only report back through the event bus.

use crate::adapter::{BluetoothAdapter, DiscoveryEvent};
use crate::device::PeerDevice;
use crate::error::{BluetoothError, Result};
use crate::session::{self, Acceptor, Connection, ConnectionSlot, Connector, SessionContext};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use ghosten_core::{BluetoothConfig, EventBus, HostLifecycle};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Everything the controller reports to its owner, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BluetoothEvent {
    /// A transfer-capable device was found by the running discovery
    DeviceFound(PeerDevice),
    /// The discovery stream ended
    DiscoveryFinished,
    /// The server accepted an inbound connection
    PeerConnected(PeerDevice),
    /// The server stopped listening (after an accept, a failure or `stop_server`)
    ServerClosed,
    /// An outbound `connect` succeeded
    Connected(PeerDevice),
    ConnectFailed(String),
    TextReceived(String),
    FileReceived(PathBuf),
    /// The active connection was torn down by either side
    ConnectionClosed,
}

struct DiscoveryPump {
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl DiscoveryPump {
    fn start(
        adapter: Arc<dyn BluetoothAdapter>,
        results: Receiver<DiscoveryEvent>,
        events: EventBus<BluetoothEvent>,
    ) -> std::io::Result<Self> {
        let (stop, stopped) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("bt-discovery".into())
            .spawn(move || {
                loop {
                    let finished = select! {
                        recv(results) -> event => match event {
                            Ok(DiscoveryEvent::Found(device)) => {
                                if device.device_type.supports_transfer() {
                                    events.publish(BluetoothEvent::DeviceFound(device));
                                }
                                false
                            }
                            Ok(DiscoveryEvent::Finished) | Err(_) => true,
                        },
                        recv(stopped) -> _ => true,
                    };
                    if finished {
                        adapter.cancel_discovery();
                        break;
                    }
                }
                events.publish(BluetoothEvent::DiscoveryFinished);
            })?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    fn finish(mut self) {
        let _ = self.stop.try_send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Bluetooth transfer endpoint: discovery, one server, one client, one active connection
pub struct Bluetooth {
    adapter: Option<Arc<dyn BluetoothAdapter>>,
    config: BluetoothConfig,
    events: EventBus<BluetoothEvent>,
    connection: ConnectionSlot,
    acceptor: Option<Acceptor>,
    connector: Option<Connector>,
    discovery: Option<DiscoveryPump>,
}

impl Bluetooth {
    /// `adapter` is `None` on devices without a radio; every command then fails with `InitFailed`
    pub fn new(adapter: Option<Arc<dyn BluetoothAdapter>>, config: BluetoothConfig) -> Self {
        Self {
            adapter,
            config,
            events: EventBus::new(),
            connection: Arc::new(Mutex::new(None)),
            acceptor: None,
            connector: None,
            discovery: None,
        }
    }

    pub fn subscribe(&self) -> Receiver<BluetoothEvent> {
        self.events.subscribe()
    }

    fn adapter(&self) -> Result<Arc<dyn BluetoothAdapter>> {
        self.adapter.clone().ok_or(BluetoothError::InitFailed)
    }

    fn session_context(&self) -> SessionContext {
        SessionContext {
            cache_dir: self.config.cache_dir.clone(),
            chunk_size: self.config.chunk_size,
            events: self.events.clone(),
        }
    }

    pub fn request_enable(&self) -> Result<bool> {
        let adapter = self.adapter()?;
        if adapter.is_enabled() {
            return Ok(true);
        }
        adapter.request_enable()
    }

    pub fn is_discoverable(&self) -> Result<bool> {
        Ok(self.adapter()?.is_discoverable())
    }

    /// Returns the discoverable window in seconds; 0 when the user refused
    pub fn request_discoverable(&self, duration_secs: u32) -> Result<u32> {
        let adapter = self.adapter()?;
        if adapter.is_discoverable() {
            return Ok(adapter
                .discoverable_timeout()
                .map(|timeout| timeout.as_secs() as u32)
                .unwrap_or(1));
        }
        adapter.request_discoverable(Duration::from_secs(duration_secs as u64))
    }

    /// Bonded devices that can carry a transfer
    pub fn bonded_devices(&self) -> Result<Vec<PeerDevice>> {
        Ok(self
            .adapter()?
            .bonded_devices()?
            .into_iter()
            .filter(|device| device.device_type.supports_transfer())
            .collect())
    }

    /// Start a scan. Results arrive as `DeviceFound` events ending with `DiscoveryFinished`.
    pub fn start_discovery(&mut self) -> Result<()> {
        let adapter = self.adapter()?;
        if adapter.is_discovering() {
            log::error!("Bluetooth is Discovering");
            return Err(BluetoothError::Discovering);
        }
        if let Some(previous) = self.discovery.take() {
            previous.finish();
        }

        let (sink, results) = unbounded();
        if !adapter.start_discovery(sink) {
            log::error!("StartDiscovery Failed");
            return Err(BluetoothError::StartDiscoveryFailed);
        }
        let pump = DiscoveryPump::start(adapter, results, self.events.clone())
            .map_err(|e| BluetoothError::Adapter(e.to_string()))?;
        self.discovery = Some(pump);
        Ok(())
    }

    /// Listen for one inbound connection. A running server is left untouched.
    pub fn start_server(&mut self) -> Result<()> {
        if self.acceptor.as_ref().is_some_and(Acceptor::is_running) {
            return Ok(());
        }
        if let Some(previous) = self.acceptor.take() {
            previous.stop();
        }
        let adapter = self.adapter()?;
        let server = adapter
            .listen(&self.config.service_name, self.config.service_uuid)
            .map_err(|e| {
                log::error!("Bluetooth Server Listen Failed: {}", e);
                BluetoothError::Listen(e)
            })?;
        let acceptor = Acceptor::start(server, self.connection.clone(), self.session_context())
            .map_err(BluetoothError::Listen)?;
        self.acceptor = Some(acceptor);
        Ok(())
    }

    pub fn stop_server(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.stop();
        }
    }

    /// Connect to `address`. Any attempt in progress and the active connection
    /// are torn down first; the outcome arrives as `Connected` or `ConnectFailed`.
    pub fn connect(&mut self, address: &str) -> Result<()> {
        let adapter = self.adapter()?;
        self.cancel_connect();

        let socket = adapter
            .create_socket(address, self.config.service_uuid)
            .map_err(|e| {
                log::error!("Bluetooth Client Connect to a Server Failed: {}", e);
                BluetoothError::Connect(e)
            })?;
        let connector = Connector::start(socket, self.connection.clone(), self.session_context())
            .map_err(BluetoothError::Connect)?;
        self.connector = Some(connector);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.cancel_connect();
    }

    fn cancel_connect(&mut self) {
        if let Some(connector) = self.connector.take() {
            connector.cancel();
        }
        session::clear(&self.connection);
    }

    fn active_connection(&self) -> Result<Arc<Connection>> {
        match self.connection.lock().as_ref() {
            Some(connection) if connection.is_alive() => Ok(connection.clone()),
            _ => {
                log::error!("No Connection");
                Err(BluetoothError::NoConnection)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.active_connection().is_ok()
    }

    pub fn write_text(&self, text: &str) -> Result<()> {
        let connection = self.active_connection()?;
        connection.write_text(text).map_err(|source| {
            log::error!("Bluetooth Connection Write Text Failed, Text: {}: {}", text, source);
            BluetoothError::WriteText {
                text: text.to_string(),
                source,
            }
        })
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let connection = self.active_connection()?;
        if !path.is_file() {
            log::error!("File Not Existed: {}", path.display());
            return Err(BluetoothError::FileNotFound(path.to_path_buf()));
        }
        connection.write_file(path).map_err(|source| {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            log::error!("Bluetooth Connection Write File Failed, Filename: {}: {}", filename, source);
            BluetoothError::WriteFile { filename, source }
        })
    }

    /// Tear everything down: server, discovery, outbound attempt and connection
    pub fn close(&mut self) {
        self.stop_server();
        if let Some(pump) = self.discovery.take() {
            pump.finish();
        }
        if let Some(adapter) = &self.adapter {
            adapter.cancel_discovery();
        }
        self.cancel_connect();
    }
}

impl HostLifecycle for Bluetooth {
    fn on_resume(&mut self) {}

    fn on_pause(&mut self) {}

    fn on_destroy(&mut self) {
        self.close();
    }
}

impl Drop for Bluetooth {
    fn drop(&mut self) {
        self.close();
    }
}
