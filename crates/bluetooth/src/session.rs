// Connection session objects
//
// Each role (accept, connect, read) runs on its own thread owned by exactly one
// session value. Cancelling a session closes its socket and joins its thread,
// so a replacement is only created once the previous one is fully gone.

use crate::adapter::{ServerSocket, Socket};
use crate::controller::BluetoothEvent;
use crate::device::PeerDevice;
use crate::error::BluetoothError;
use crate::frame::{self, Frame};
use ghosten_core::EventBus;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The single active connection, shared by the accept/connect threads that install it
pub(crate) type ConnectionSlot = Arc<Mutex<Option<Arc<Connection>>>>;

/// Replace the active connection, tearing the previous one down first
pub(crate) fn install(slot: &ConnectionSlot, connection: Arc<Connection>) {
    let previous = slot.lock().replace(connection);
    if let Some(previous) = previous {
        log::info!("Replacing connection to {}", previous.peer().address);
        previous.shutdown();
    }
}

/// Remove and tear down the active connection, if any
pub(crate) fn clear(slot: &ConnectionSlot) {
    let previous = slot.lock().take();
    if let Some(previous) = previous {
        previous.shutdown();
    }
}

/// Settings every connection needs to run its reader
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub cache_dir: PathBuf,
    pub chunk_size: usize,
    pub events: EventBus<BluetoothEvent>,
}

/// One open byte-stream session with a peer
pub struct Connection {
    peer: PeerDevice,
    socket: Arc<dyn Socket>,
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    alive: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    chunk_size: usize,
}

/// Input side of a connection whose reader has not been started yet
pub(crate) struct PendingReader {
    input: Box<dyn io::Read + Send>,
    ctx: SessionContext,
}

impl Connection {
    /// Take ownership of a connected socket. Frames are only read once
    /// [`Connection::start_reader`] is called.
    pub(crate) fn open(
        socket: Arc<dyn Socket>,
        ctx: &SessionContext,
    ) -> io::Result<(Arc<Self>, PendingReader)> {
        let peer = socket.remote_device();
        let input = socket.input_stream()?;
        let output = socket.output_stream()?;

        log::info!("Connection open with {}", peer.address);
        let connection = Arc::new(Self {
            peer,
            socket,
            writer: Mutex::new(BufWriter::new(output)),
            alive: Arc::new(AtomicBool::new(true)),
            reader: Mutex::new(None),
            chunk_size: ctx.chunk_size,
        });
        let pending = PendingReader {
            input,
            ctx: ctx.clone(),
        };
        Ok((connection, pending))
    }

    /// Spawn the frame reader; call after the connection has been installed and announced
    pub(crate) fn start_reader(&self, pending: PendingReader) -> io::Result<()> {
        let socket = self.socket.clone();
        let alive = self.alive.clone();
        let PendingReader { input, ctx } = pending;
        let handle = thread::Builder::new()
            .name("bt-connection".into())
            .spawn(move || read_loop(BufReader::new(input), socket, alive, ctx))?;
        *self.reader.lock() = Some(handle);
        Ok(())
    }

    pub fn peer(&self) -> &PeerDevice {
        &self.peer
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn write_text(&self, text: &str) -> io::Result<()> {
        self.ensure_alive()?;
        let mut writer = self.writer.lock();
        frame::write_text(&mut *writer, text)
    }

    pub fn write_file(&self, path: &Path) -> io::Result<()> {
        self.ensure_alive()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        let mut writer = self.writer.lock();
        frame::write_file(&mut *writer, &name, len, &mut file, self.chunk_size)
    }

    /// Close both directions and wait for the reader thread to exit
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Err(e) = self.socket.close() {
            log::error!("Bluetooth Connection Close Failed: {}", e);
        }
        let reader = self.reader.lock().take();
        if let Some(handle) = reader {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    fn ensure_alive(&self) -> io::Result<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"))
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_loop(
    mut input: BufReader<Box<dyn io::Read + Send>>,
    socket: Arc<dyn Socket>,
    alive: Arc<AtomicBool>,
    ctx: SessionContext,
) {
    loop {
        match frame::read_frame(&mut input, &ctx.cache_dir, ctx.chunk_size) {
            Ok(Frame::Text(text)) => ctx.events.publish(BluetoothEvent::TextReceived(text)),
            Ok(Frame::File { path, len }) => {
                log::info!("Received file {} ({} bytes)", path.display(), len);
                ctx.events.publish(BluetoothEvent::FileReceived(path));
            }
            Err(e) => {
                if alive.load(Ordering::SeqCst) {
                    log::error!("Bluetooth Connection Read Failed: {}", e);
                }
                break;
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
    if let Err(e) = socket.close() {
        log::error!("Bluetooth Connection Close Failed: {}", e);
    }
    ctx.events.publish(BluetoothEvent::ConnectionClosed);
}

/// Install `connection`, announce it, then start reading from it
fn activate(
    slot: &ConnectionSlot,
    connection: Arc<Connection>,
    pending: PendingReader,
    announcement: BluetoothEvent,
    events: &EventBus<BluetoothEvent>,
) {
    install(slot, connection.clone());
    events.publish(announcement);
    if let Err(e) = connection.start_reader(pending) {
        log::error!("Bluetooth Connection Read Failed: {}", e);
        connection.shutdown();
        events.publish(BluetoothEvent::ConnectionClosed);
    }
}

/// Report a failed outbound connect with its fixed message
fn connect_failed(events: &EventBus<BluetoothEvent>, source: io::Error) {
    log::error!("Bluetooth Client Connect to a Server Failed: {}", source);
    events.publish(BluetoothEvent::ConnectFailed(
        BluetoothError::Connect(source).to_string(),
    ));
}

/// Server role: waits for one inbound connection, then stops listening
pub(crate) struct Acceptor {
    server: Arc<dyn ServerSocket>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Acceptor {
    pub fn start(
        server: Arc<dyn ServerSocket>,
        slot: ConnectionSlot,
        ctx: SessionContext,
    ) -> io::Result<Self> {
        let finished = Arc::new(AtomicBool::new(false));
        let thread = {
            let server = server.clone();
            let finished = finished.clone();
            thread::Builder::new()
                .name("bt-accept".into())
                .spawn(move || {
                    match server.accept() {
                        Ok(socket) => {
                            if let Err(e) = server.close() {
                                log::error!("Bluetooth Server Closed Failed: {}", e);
                            }
                            let peer = socket.remote_device();
                            match Connection::open(socket, &ctx) {
                                Ok((connection, pending)) => activate(
                                    &slot,
                                    connection,
                                    pending,
                                    BluetoothEvent::PeerConnected(peer),
                                    &ctx.events,
                                ),
                                Err(e) => log::error!("Bluetooth Server open connection failed: {}", e),
                            }
                        }
                        Err(e) => log::error!("Bluetooth Server accept Failed: {}", e),
                    }
                    finished.store(true, Ordering::SeqCst);
                    ctx.events.publish(BluetoothEvent::ServerClosed);
                })?
        };
        Ok(Self {
            server,
            finished,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }

    pub fn stop(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.thread.take() {
            if let Err(e) = self.server.close() {
                log::error!("Bluetooth Server Closed Failed: {}", e);
            }
            let _ = handle.join();
        }
    }
}

impl Drop for Acceptor {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Client role: one outbound connection attempt
pub(crate) struct Connector {
    socket: Arc<dyn Socket>,
    thread: Option<JoinHandle<()>>,
}

impl Connector {
    pub fn start(socket: Arc<dyn Socket>, slot: ConnectionSlot, ctx: SessionContext) -> io::Result<Self> {
        let thread = {
            let socket = socket.clone();
            thread::Builder::new()
                .name("bt-connect".into())
                .spawn(move || match socket.connect() {
                    Ok(()) => {
                        let peer = socket.remote_device();
                        match Connection::open(socket, &ctx) {
                            Ok((connection, pending)) => activate(
                                &slot,
                                connection,
                                pending,
                                BluetoothEvent::Connected(peer),
                                &ctx.events,
                            ),
                            Err(e) => connect_failed(&ctx.events, e),
                        }
                    }
                    Err(e) => connect_failed(&ctx.events, e),
                })?
        };
        Ok(Self {
            socket,
            thread: Some(thread),
        })
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.thread.take() {
            if let Err(e) = self.socket.close() {
                log::error!("Bluetooth Client Cancel to Connect to a Server Failed: {}", e);
            }
            let _ = handle.join();
        }
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        self.stop();
    }
}
