//! Channel transports.
//!
//! A [`Connector`] starts one channel per [`ChannelId`] and reports its
//! lifecycle as [`ChannelEvent`]s on the driver's queue. The only contract
//! beyond that: once asked to close, a channel must report `Closed`, even if
//! it never finished opening.

use crate::client::connection::{ChannelEvent, ChannelId};
use futures_util::{Sink, SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Longest a single frame write may take before the channel is given up.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Requests from the driver to one channel task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCommand {
    /// Write a text frame
    Send(String),
    Close,
}

/// Driver-side handle of a running channel.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: ChannelId,
    commands: mpsc::UnboundedSender<ChannelCommand>,
}

impl ChannelHandle {
    pub fn new(id: ChannelId, commands: mpsc::UnboundedSender<ChannelCommand>) -> Self {
        Self { id, commands }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Queue a text frame. Returns false if the channel task is gone.
    pub fn send(&self, text: String) -> bool {
        self.commands.send(ChannelCommand::Send(text)).is_ok()
    }

    pub fn close(&self) -> bool {
        self.commands.send(ChannelCommand::Close).is_ok()
    }
}

/// Something that can open channels to the device.
pub trait Connector: Send + 'static {
    /// Start connecting channel `id`; events go to `events`.
    fn connect(&self, id: ChannelId, events: mpsc::UnboundedSender<ChannelEvent>) -> ChannelHandle;
}

/// WebSocket transport to a fixed endpoint URL.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, id: ChannelId, events: mpsc::UnboundedSender<ChannelEvent>) -> ChannelHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_websocket_channel(self.url.clone(), id, rx, events));
        ChannelHandle::new(id, tx)
    }
}

async fn run_websocket_channel(
    url: String,
    id: ChannelId,
    mut commands: mpsc::UnboundedReceiver<ChannelCommand>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    debug!("Channel {} connecting to {}", id, url);

    // A close request while still connecting abandons the handshake
    let connected = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => Some(result),
        _ = wait_for_close(&mut commands) => None,
    };

    let socket = match connected {
        Some(Ok((socket, _response))) => socket,
        Some(Err(e)) => {
            let _ = events.send(ChannelEvent::Error(id, e.to_string()));
            // The manager answers an error with a close request
            wait_for_close(&mut commands).await;
            let _ = events.send(ChannelEvent::Closed(id));
            return;
        }
        None => {
            let _ = events.send(ChannelEvent::Closed(id));
            return;
        }
    };

    info!("Channel {} open to {}", id, url);
    let _ = events.send(ChannelEvent::Opened(id));
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ChannelCommand::Send(text)) => {
                    if let Err(reason) = write_frame(&mut sink, Message::Text(text)).await {
                        let _ = events.send(ChannelEvent::Error(id, reason));
                        break;
                    }
                }
                Some(ChannelCommand::Close) | None => {
                    // A stalled peer must not keep the channel from reporting Closed
                    if let Err(reason) = write_frame(&mut sink, Message::Close(None)).await {
                        debug!("Channel {} close handshake skipped: {}", id, reason);
                    }
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(ChannelEvent::Message(id, text));
                }
                Some(Ok(Message::Binary(bytes))) => match binary_text(bytes) {
                    Ok(text) => {
                        let _ = events.send(ChannelEvent::Message(id, text));
                    }
                    Err(reason) => {
                        warn!("Channel {} received {}", id, reason);
                        let _ = events.send(ChannelEvent::Error(id, reason));
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(ChannelEvent::Error(id, e.to_string()));
                    break;
                }
            },
        }
    }

    debug!("Channel {} closed", id);
    let _ = events.send(ChannelEvent::Closed(id));
}

/// Write one frame within [`WRITE_TIMEOUT`].
async fn write_frame<S>(sink: &mut S, frame: Message) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    match tokio::time::timeout(WRITE_TIMEOUT, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("write timed out after {}ms", WRITE_TIMEOUT.as_millis())),
    }
}

/// Binary frames must hold UTF-8 text to reach the decoder.
fn binary_text(bytes: Vec<u8>) -> Result<String, String> {
    String::from_utf8(bytes).map_err(|e| format!("binary frame that is not UTF-8: {}", e))
}

/// Resolve once the driver asks for a close or drops the handle.
async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<ChannelCommand>) {
    while let Some(command) = commands.recv().await {
        if command == ChannelCommand::Close {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_connection_reports_error_then_closed() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        // Port 9 (discard) on loopback is not expected to accept WebSocket upgrades
        let connector = WebSocketConnector::new("ws://127.0.0.1:9/ws");
        let handle = connector.connect(ChannelId(1), events_tx);

        let first = events_rx.recv().await.unwrap();
        assert!(matches!(first, ChannelEvent::Error(ChannelId(1), _)));

        assert!(handle.close());
        assert_eq!(events_rx.recv().await, Some(ChannelEvent::Closed(ChannelId(1))));
    }

    #[tokio::test]
    async fn test_wait_for_close_skips_pending_sends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ChannelCommand::Send("queued".to_string())).unwrap();
        tx.send(ChannelCommand::Close).unwrap();

        wait_for_close(&mut rx).await;
        assert!(rx.try_recv().is_err());
    }

    /// Never accepts a frame, like a peer whose receive window stays at zero.
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = tokio_tungstenite::tungstenite::Error;

        fn poll_ready(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), Self::Error>> {
            std::task::Poll::Pending
        }

        fn start_send(self: std::pin::Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), Self::Error>> {
            std::task::Poll::Pending
        }

        fn poll_close(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), Self::Error>> {
            std::task::Poll::Pending
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_to_stalled_peer_gives_up() {
        let started = tokio::time::Instant::now();
        let result = write_frame(&mut StalledSink, Message::Close(None)).await;

        assert!(result.unwrap_err().contains("timed out"));
        assert!(started.elapsed() >= WRITE_TIMEOUT);
    }

    #[test]
    fn test_binary_frames_must_be_utf8() {
        assert_eq!(
            binary_text(br#"{"type":"snapshot","pins":[]}"#.to_vec()).unwrap(),
            r#"{"type":"snapshot","pins":[]}"#
        );

        let mut bytes = br#"{"type":"error","message":""#.to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(br#""}"#);
        assert!(binary_text(bytes).is_err());
    }

    #[tokio::test]
    async fn test_secure_url_attempts_tls_handshake() {
        use crate::board::catalog::PinCatalog;
        use crate::client::config::ClientConfig;
        use crate::device::{DeviceConfig, DeviceServer};

        // The simulated device speaks plain HTTP, so the TLS handshake itself must fail
        let server = DeviceServer::bind(DeviceConfig::new("127.0.0.1", 0), &PinCatalog::reference())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let server_task = tokio::spawn(server.run());

        let url = ClientConfig::new(addr.to_string()).with_secure(true).endpoint_url();
        assert!(url.starts_with("wss://"));

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = WebSocketConnector::new(url).connect(ChannelId(1), events_tx);

        let first = tokio::time::timeout(Duration::from_secs(10), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let ChannelEvent::Error(ChannelId(1), reason) = first else {
            panic!("expected a handshake error, got {:?}", first);
        };
        assert!(!reason.contains("TLS support not compiled in"), "{}", reason);

        assert!(handle.close());
        assert_eq!(events_rx.recv().await, Some(ChannelEvent::Closed(ChannelId(1))));
        server_task.abort();
    }
}
