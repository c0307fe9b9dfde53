// Bluetooth plugin: method dispatch and event streams

use crate::call::{ChannelEvent, MethodCall, MethodHandler, MethodResult};
use crate::error::MethodError;
use crossbeam_channel::Receiver;
use ghosten_bluetooth::{Bluetooth, BluetoothError, BluetoothEvent};
use ghosten_core::HostLifecycle;
use serde_json::{json, Value};

pub const DISCOVERY_STREAM: &str = "discovery";
/// Inbound connections accepted by the server
pub const CONNECTED_STREAM: &str = "connected";
/// Frames received on the active connection
pub const CONNECTION_STREAM: &str = "connection";
/// Outcome of an outbound `connect`
pub const CONNECT_STREAM: &str = "connect";

const FLAG_TEXT: i32 = 0;
const FLAG_FILE: i32 = 1;

pub struct BluetoothChannel {
    bluetooth: Bluetooth,
}

impl BluetoothChannel {
    pub fn new(bluetooth: Bluetooth) -> Self {
        Self { bluetooth }
    }

    pub fn subscribe(&self) -> Receiver<BluetoothEvent> {
        self.bluetooth.subscribe()
    }

    pub fn bluetooth(&self) -> &Bluetooth {
        &self.bluetooth
    }

    fn dispatch(&mut self, call: &MethodCall) -> MethodResult {
        let bt = &mut self.bluetooth;
        let result = match call.method.as_str() {
            "requestEnable" => json!(bt.request_enable()?),
            "startServer" => {
                bt.start_server()?;
                Value::Null
            }
            "stopServer" => {
                bt.stop_server();
                Value::Null
            }
            "connect" => {
                let address: String = call.arguments()?;
                bt.connect(&address)?;
                Value::Null
            }
            "disconnect" => {
                bt.disconnect();
                Value::Null
            }
            "getBondedDevices" => serde_json::to_value(bt.bonded_devices()?)
                .map_err(|e| BluetoothError::Adapter(e.to_string()))?,
            "startDiscovery" => {
                bt.start_discovery()?;
                Value::Null
            }
            "isDiscoverable" => json!(bt.is_discoverable()?),
            "requestDiscoverable" => {
                let duration: u32 = call.arguments()?;
                json!(bt.request_discoverable(duration)?)
            }
            "writeText" => {
                let text: String = call.arguments()?;
                bt.write_text(&text)?;
                Value::Null
            }
            "writeFile" => {
                let path: String = call.arguments()?;
                bt.write_file(&path)?;
                Value::Null
            }
            "close" => {
                bt.close();
                Value::Null
            }
            _ => return Err(MethodError::NotImplemented),
        };
        Ok(result)
    }
}

impl MethodHandler for BluetoothChannel {
    fn handle(&mut self, call: &MethodCall) -> MethodResult {
        log::debug!("bluetooth call {}", call.method);
        self.dispatch(call)
    }
}

impl HostLifecycle for BluetoothChannel {
    fn on_resume(&mut self) {
        self.bluetooth.on_resume();
    }

    fn on_pause(&mut self) {
        self.bluetooth.on_pause();
    }

    fn on_destroy(&mut self) {
        self.bluetooth.on_destroy();
    }
}

/// Map a controller event onto the shell's event streams
pub fn channel_event(event: &BluetoothEvent) -> ChannelEvent {
    match event {
        BluetoothEvent::DeviceFound(device) => ChannelEvent::Data {
            stream: DISCOVERY_STREAM,
            payload: serde_json::to_value(device).unwrap_or(Value::Null),
        },
        BluetoothEvent::DiscoveryFinished => ChannelEvent::EndOfStream {
            stream: DISCOVERY_STREAM,
        },
        BluetoothEvent::PeerConnected(device) => ChannelEvent::Data {
            stream: CONNECTED_STREAM,
            payload: serde_json::to_value(device).unwrap_or(Value::Null),
        },
        BluetoothEvent::ServerClosed => ChannelEvent::EndOfStream {
            stream: CONNECTED_STREAM,
        },
        BluetoothEvent::Connected(_) => ChannelEvent::Data {
            stream: CONNECT_STREAM,
            payload: Value::Bool(true),
        },
        BluetoothEvent::ConnectFailed(message) => ChannelEvent::Error {
            stream: CONNECT_STREAM,
            code: BluetoothError::TAG,
            message: message.clone(),
        },
        BluetoothEvent::TextReceived(text) => ChannelEvent::Data {
            stream: CONNECTION_STREAM,
            payload: json!([FLAG_TEXT, text]),
        },
        BluetoothEvent::FileReceived(path) => ChannelEvent::Data {
            stream: CONNECTION_STREAM,
            payload: json!([FLAG_FILE, path.to_string_lossy()]),
        },
        BluetoothEvent::ConnectionClosed => ChannelEvent::EndOfStream {
            stream: CONNECTION_STREAM,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghosten_bluetooth::{DeviceType, LoopbackAdapter, PeerDevice};
    use ghosten_core::BluetoothConfig;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    fn channel(dir: &std::path::Path, adapter: Arc<LoopbackAdapter>) -> BluetoothChannel {
        let config = BluetoothConfig {
            cache_dir: dir.to_path_buf(),
            ..Default::default()
        };
        BluetoothChannel::new(Bluetooth::new(Some(adapter), config))
    }

    fn loopback() -> Arc<LoopbackAdapter> {
        Arc::new(LoopbackAdapter::new("127.0.0.1:0".parse().unwrap()))
    }

    fn call(channel: &mut BluetoothChannel, method: &str, arguments: Value) -> MethodResult {
        channel.handle(&MethodCall::new(method, arguments))
    }

    fn next_event(rx: &Receiver<BluetoothEvent>, stream: &str) -> ChannelEvent {
        let deadline = Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = channel_event(&rx.recv_timeout(remaining).unwrap());
            let matches = match &event {
                ChannelEvent::Data { stream: s, .. }
                | ChannelEvent::Error { stream: s, .. }
                | ChannelEvent::EndOfStream { stream: s } => *s == stream,
                ChannelEvent::Invoke { .. } => false,
            };
            if matches {
                return event;
            }
        }
    }

    #[test]
    fn test_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = channel(dir.path(), loopback());
        assert_eq!(
            call(&mut bt, "openSettings", Value::Null),
            Err(MethodError::NotImplemented)
        );
    }

    #[test]
    fn test_write_without_connection_reports_tag() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = channel(dir.path(), loopback());
        assert_eq!(
            call(&mut bt, "writeText", json!("hi")),
            Err(MethodError::Failed {
                code: "BLUETOOTH".into(),
                message: "No Connection".into()
            })
        );
    }

    #[test]
    fn test_bad_argument_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut bt = channel(dir.path(), loopback());
        let result = call(&mut bt, "connect", json!(42));
        assert!(matches!(result, Err(MethodError::Failed { code, .. }) if code == "ARGUMENTS"));
    }

    #[test]
    fn test_bonded_devices_as_maps() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(
            LoopbackAdapter::new("127.0.0.1:0".parse().unwrap()).with_bonded(vec![
                PeerDevice::new("aa", Some("TV".into()), DeviceType::Classic).bonded(),
            ]),
        );
        let mut bt = channel(dir.path(), adapter);
        let devices = call(&mut bt, "getBondedDevices", Value::Null).unwrap();
        assert_eq!(devices[0]["address"], "aa");
        assert_eq!(devices[0]["name"], "TV");
        assert_eq!(devices[0]["isConnected"], false);
    }

    #[test]
    fn test_discovery_stream_ends() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(
            LoopbackAdapter::new("127.0.0.1:0".parse().unwrap()).with_visible(vec![
                PeerDevice::new("aa", None, DeviceType::Dual),
            ]),
        );
        let mut bt = channel(dir.path(), adapter);
        let events = bt.subscribe();

        assert_eq!(call(&mut bt, "startDiscovery", Value::Null), Ok(Value::Null));
        let ChannelEvent::Data { payload, .. } = next_event(&events, DISCOVERY_STREAM) else {
            panic!("expected a device");
        };
        assert_eq!(payload["address"], "aa");
        assert_eq!(
            next_event(&events, DISCOVERY_STREAM),
            ChannelEvent::EndOfStream {
                stream: DISCOVERY_STREAM
            }
        );
    }

    #[test]
    fn test_text_round_trip_through_channels() {
        let server_dir = tempfile::tempdir().unwrap();
        let client_dir = tempfile::tempdir().unwrap();
        let server_adapter = loopback();
        let mut server = channel(server_dir.path(), server_adapter.clone());
        let server_events = server.subscribe();
        call(&mut server, "startServer", Value::Null).unwrap();
        let addr = server_adapter.local_addr().unwrap().to_string();

        let mut client = channel(client_dir.path(), loopback());
        let client_events = client.subscribe();
        call(&mut client, "connect", json!(addr)).unwrap();
        assert_eq!(
            next_event(&client_events, CONNECT_STREAM),
            ChannelEvent::Data {
                stream: CONNECT_STREAM,
                payload: Value::Bool(true)
            }
        );
        next_event(&server_events, CONNECTED_STREAM);

        call(&mut client, "writeText", json!("S01E02")).unwrap();
        assert_eq!(
            next_event(&server_events, CONNECTION_STREAM),
            ChannelEvent::Data {
                stream: CONNECTION_STREAM,
                payload: json!([0, "S01E02"])
            }
        );

        call(&mut client, "close", Value::Null).unwrap();
        assert_eq!(
            next_event(&server_events, CONNECTION_STREAM),
            ChannelEvent::EndOfStream {
                stream: CONNECTION_STREAM
            }
        );
    }

    #[test]
    fn test_connect_failure_on_connect_stream() {
        let dir = tempfile::tempdir().unwrap();
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = closed.local_addr().unwrap().to_string();
        drop(closed);

        let mut bt = channel(dir.path(), loopback());
        let events = bt.subscribe();
        call(&mut bt, "connect", json!(addr)).unwrap();
        assert_eq!(
            next_event(&events, CONNECT_STREAM),
            ChannelEvent::Error {
                stream: CONNECT_STREAM,
                code: "BLUETOOTH",
                message: "Bluetooth Client Connect to a Server Failed".into()
            }
        );
    }

    #[test]
    fn test_event_mapping() {
        assert_eq!(
            channel_event(&BluetoothEvent::FileReceived(PathBuf::from("/cache/a.srt"))),
            ChannelEvent::Data {
                stream: CONNECTION_STREAM,
                payload: json!([1, "/cache/a.srt"])
            }
        );
        assert_eq!(
            channel_event(&BluetoothEvent::ConnectFailed("refused".into())),
            ChannelEvent::Error {
                stream: CONNECT_STREAM,
                code: "BLUETOOTH",
                message: "refused".into()
            }
        );
        assert_eq!(
            channel_event(&BluetoothEvent::ServerClosed),
            ChannelEvent::EndOfStream {
                stream: CONNECTED_STREAM
            }
        );
    }
}
