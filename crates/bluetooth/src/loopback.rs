// TCP stand-in for the Bluetooth radio
// Addresses are socket addresses ("127.0.0.1:7001"); discovery replays a fixed peer list

use crate::adapter::{BluetoothAdapter, DiscoveryEvent, ServerSocket, Socket};
use crate::device::{DeviceType, PeerDevice};
use crate::error::Result;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

const ACCEPT_POLL: Duration = Duration::from_millis(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

struct Scan {
    cancelled: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

/// Adapter backed by TCP sockets on the local machine
pub struct LoopbackAdapter {
    bind_addr: SocketAddr,
    local_addr: Mutex<Option<SocketAddr>>,
    visible: Mutex<Vec<PeerDevice>>,
    bonded: Mutex<Vec<PeerDevice>>,
    scan: Mutex<Option<Scan>>,
    scan_interval: Duration,
    discoverable_until: Mutex<Option<Instant>>,
}

impl LoopbackAdapter {
    /// `bind_addr` is where `listen` binds; port 0 picks a free port (see [`Self::local_addr`])
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            local_addr: Mutex::new(None),
            visible: Mutex::new(Vec::new()),
            bonded: Mutex::new(Vec::new()),
            scan: Mutex::new(None),
            scan_interval: Duration::from_millis(10),
            discoverable_until: Mutex::new(None),
        }
    }

    /// Devices a scan will report, in order
    pub fn with_visible(self, devices: Vec<PeerDevice>) -> Self {
        *self.visible.lock() = devices;
        self
    }

    pub fn with_bonded(self, devices: Vec<PeerDevice>) -> Self {
        *self.bonded.lock() = devices;
        self
    }

    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Address of the most recent listening socket
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }
}

impl BluetoothAdapter for LoopbackAdapter {
    fn is_enabled(&self) -> bool {
        true
    }

    fn request_enable(&self) -> Result<bool> {
        Ok(true)
    }

    fn is_discovering(&self) -> bool {
        self.scan.lock().as_ref().is_some_and(|scan| {
            !scan.done.load(Ordering::SeqCst) && !scan.cancelled.load(Ordering::SeqCst)
        })
    }

    fn start_discovery(&self, sink: Sender<DiscoveryEvent>) -> bool {
        let mut scan = self.scan.lock();
        if let Some(current) = scan.as_ref() {
            if !current.done.load(Ordering::SeqCst) && !current.cancelled.load(Ordering::SeqCst) {
                return false;
            }
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let devices = self.visible.lock().clone();
        let interval = self.scan_interval;
        let scan_cancelled = cancelled.clone();
        let scan_done = done.clone();

        thread::spawn(move || {
            for device in devices {
                thread::sleep(interval);
                if scan_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let _ = sink.send(DiscoveryEvent::Found(device));
            }
            scan_done.store(true, Ordering::SeqCst);
            let _ = sink.send(DiscoveryEvent::Finished);
        });

        *scan = Some(Scan { cancelled, done });
        true
    }

    fn cancel_discovery(&self) {
        if let Some(scan) = self.scan.lock().as_ref() {
            scan.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn is_discoverable(&self) -> bool {
        self.discoverable_until
            .lock()
            .is_some_and(|until| Instant::now() < until)
    }

    fn discoverable_timeout(&self) -> Option<Duration> {
        self.discoverable_until
            .lock()
            .map(|until| until.saturating_duration_since(Instant::now()))
    }

    fn request_discoverable(&self, duration: Duration) -> Result<u32> {
        *self.discoverable_until.lock() = Some(Instant::now() + duration);
        Ok(duration.as_secs() as u32)
    }

    fn bonded_devices(&self) -> Result<Vec<PeerDevice>> {
        Ok(self.bonded.lock().clone())
    }

    fn listen(&self, name: &str, service: Uuid) -> io::Result<Arc<dyn ServerSocket>> {
        let listener = TcpListener::bind(self.bind_addr)?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(addr);
        log::info!("[loopback] {} ({}) listening on {}", name, service, addr);
        Ok(Arc::new(TcpServerSocket {
            listener: Mutex::new(Some(listener)),
        }))
    }

    fn create_socket(&self, address: &str, _service: Uuid) -> io::Result<Arc<dyn Socket>> {
        let addr: SocketAddr = address.parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a socket address: {}", address),
            )
        })?;
        Ok(Arc::new(TcpSocket::unconnected(addr)))
    }
}

struct TcpServerSocket {
    listener: Mutex<Option<TcpListener>>,
}

impl ServerSocket for TcpServerSocket {
    fn accept(&self) -> io::Result<Arc<dyn Socket>> {
        loop {
            let accepted = match self.listener.lock().as_ref() {
                Some(listener) => listener.accept(),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "server socket closed",
                    ))
                }
            };
            match accepted {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(false)?;
                    return Ok(Arc::new(TcpSocket::connected(stream, addr)));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => return Err(e),
            }
        }
    }

    /// Dropping the listener refuses any further connection attempts
    fn close(&self) -> io::Result<()> {
        self.listener.lock().take();
        Ok(())
    }
}

struct TcpSocket {
    addr: SocketAddr,
    stream: Mutex<Option<TcpStream>>,
    closed: AtomicBool,
}

impl TcpSocket {
    fn unconnected(addr: SocketAddr) -> Self {
        Self {
            addr,
            stream: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn connected(stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            addr,
            stream: Mutex::new(Some(stream)),
            closed: AtomicBool::new(false),
        }
    }

    fn clone_stream(&self) -> io::Result<TcpStream> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(aborted());
        }
        match self.stream.lock().as_ref() {
            Some(stream) => stream.try_clone(),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "socket not connected")),
        }
    }
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "socket closed")
}

impl Socket for TcpSocket {
    fn connect(&self) -> io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(aborted());
        }
        let stream = TcpStream::connect_timeout(&self.addr, CONNECT_TIMEOUT)?;
        if self.closed.load(Ordering::SeqCst) {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(aborted());
        }
        *self.stream.lock() = Some(stream);
        Ok(())
    }

    fn remote_device(&self) -> PeerDevice {
        PeerDevice::new(self.addr.to_string(), Some("loopback".into()), DeviceType::Classic)
            .connected(self.stream.lock().is_some() && !self.closed.load(Ordering::SeqCst))
    }

    fn input_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.clone_stream()?))
    }

    fn output_stream(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.clone_stream()?))
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(stream) = self.stream.lock().as_ref() {
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn adapter() -> LoopbackAdapter {
        LoopbackAdapter::new("127.0.0.1:0".parse().unwrap())
    }

    #[test]
    fn test_scan_reports_devices_then_finishes() {
        let adapter = adapter().with_visible(vec![
            PeerDevice::new("a", None, DeviceType::Classic),
            PeerDevice::new("b", None, DeviceType::LowEnergy),
        ]);
        let (tx, rx) = unbounded();
        assert!(adapter.start_discovery(tx));
        assert!(adapter.is_discovering());

        let events: Vec<DiscoveryEvent> = rx.iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], DiscoveryEvent::Finished);
        assert!(!adapter.is_discovering());
    }

    #[test]
    fn test_cancel_finishes_scan() {
        let adapter = adapter()
            .with_visible(vec![PeerDevice::new("a", None, DeviceType::Classic); 50])
            .with_scan_interval(Duration::from_millis(50));
        let (tx, rx) = unbounded();
        assert!(adapter.start_discovery(tx));
        adapter.cancel_discovery();
        assert!(!adapter.is_discovering());
        let last = rx.iter().last().unwrap();
        assert_eq!(last, DiscoveryEvent::Finished);
    }

    #[test]
    fn test_close_unblocks_accept() {
        let adapter = adapter();
        let server = adapter.listen("test", Uuid::nil()).unwrap();
        let accepting = server.clone();
        let handle = thread::spawn(move || accepting.accept().map(|_| ()));
        thread::sleep(Duration::from_millis(50));
        server.close().unwrap();
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[test]
    fn test_bad_address_rejected() {
        let err = adapter().create_socket("00:11:22", Uuid::nil()).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_discoverable_window() {
        let adapter = adapter();
        assert!(!adapter.is_discoverable());
        assert_eq!(adapter.request_discoverable(Duration::from_secs(120)).unwrap(), 120);
        assert!(adapter.is_discoverable());
        assert!(adapter.discoverable_timeout().unwrap() <= Duration::from_secs(120));
    }
}
