//! axum server for the simulated device.

use crate::board::catalog::PinCatalog;
use crate::device::config::DeviceConfig;
use crate::device::{CommandOutcome, SimulatedBoard};
use crate::error::{DeckError, Result};
use crate::protocol::DeviceMessage;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Client {
    connected_at: SystemTime,
}

/// Shared state of a running simulated device.
#[derive(Clone)]
pub struct DeviceState {
    board: Arc<Mutex<SimulatedBoard>>,
    broadcast_tx: broadcast::Sender<String>,
    clients: Arc<RwLock<HashMap<String, Client>>>,
}

impl DeviceState {
    pub fn new(board: SimulatedBoard) -> Self {
        let (broadcast_tx, _rx) = broadcast::channel(100);
        Self {
            board: Arc::new(Mutex::new(board)),
            broadcast_tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Encoded snapshot of the current board state.
    pub async fn snapshot_text(&self) -> Result<String> {
        self.board.lock().await.snapshot().encode()
    }

    /// Send a snapshot to every connected client.
    pub async fn broadcast_snapshot(&self) -> Result<()> {
        if self.client_count().await == 0 {
            return Ok(());
        }

        let text = self.snapshot_text().await?;
        match self.broadcast_tx.send(text) {
            Ok(receivers) => {
                debug!("Broadcast snapshot to {} receivers", receivers);
                Ok(())
            }
            Err(e) => Err(DeckError::web_server_error(format!(
                "Failed to broadcast snapshot: {}",
                e
            ))),
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn handle_text(&self, text: &str) -> CommandOutcome {
        self.board.lock().await.handle_text(text)
    }
}

/// Create the axum application with all routes and middleware.
pub fn create_app(state: DeviceState, config: &DeviceConfig) -> Router {
    let mut app = Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/health", get(health_check))
        .route(crate::DEFAULT_WS_PATH, get(websocket_handler))
        .with_state(state);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// A bound, not yet running, simulated device.
pub struct DeviceServer {
    listener: TcpListener,
    state: DeviceState,
    config: DeviceConfig,
}

impl DeviceServer {
    /// Bind the configured address with a board built from `catalog`.
    pub async fn bind(config: DeviceConfig, catalog: &PinCatalog) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_address())
            .await
            .map_err(|e| DeckError::web_server_error(format!("Failed to bind to address: {}", e)))?;

        Ok(Self {
            listener,
            state: DeviceState::new(SimulatedBoard::new(catalog, &config)),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> DeviceState {
        self.state.clone()
    }

    /// Serve until the listener fails.
    pub async fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        info!("Simulated device listening on http://{}", addr);
        info!("WebSocket endpoint: ws://{}{}", addr, crate::DEFAULT_WS_PATH);

        let app = create_app(self.state.clone(), &self.config);

        let state = self.state.clone();
        let mut ticker = tokio::time::interval(self.config.broadcast_interval());
        let broadcast_task = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                if let Err(e) = state.broadcast_snapshot().await {
                    warn!("{}", e);
                }
            }
        });

        let result = axum::serve(self.listener, app)
            .await
            .map_err(|e| DeckError::web_server_error(format!("Server error: {}", e)));

        broadcast_task.abort();
        result
    }
}

/// Bind and run the simulated device with the reference catalog.
pub async fn start_device_server(config: DeviceConfig) -> Result<()> {
    DeviceServer::bind(config, &PinCatalog::reference())
        .await?
        .run()
        .await
}

async fn get_snapshot(State(state): State<DeviceState>) -> Json<DeviceMessage> {
    Json(state.board.lock().await.snapshot())
}

async fn health_check(State(state): State<DeviceState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "pin-deck-device",
        "version": env!("CARGO_PKG_VERSION"),
        "clients": state.client_count().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<DeviceState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: DeviceState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    info!("WebSocket client connected: {}", client_id);

    state.clients.write().await.insert(
        client_id.clone(),
        Client {
            connected_at: SystemTime::now(),
        },
    );

    let (mut sender, mut receiver) = socket.split();
    let mut broadcasts = state.broadcast_tx.subscribe();
    // Replies addressed to this client only
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();

    match state.snapshot_text().await {
        Ok(text) => {
            let _ = reply_tx.send(text);
        }
        Err(e) => warn!("Failed to encode initial snapshot: {}", e),
    }

    let client_id_send = client_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                reply = reply_rx.recv() => match reply {
                    Some(text) => text,
                    None => break,
                },
                broadcast = broadcasts.recv() => match broadcast {
                    Ok(text) => text,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Client {} lagged by {} snapshots", client_id_send, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            if let Err(e) = sender.send(Message::Text(text)).await {
                warn!("Failed to send message to client {}: {}", client_id_send, e);
                break;
            }
        }
    });

    let client_id_recv = client_id.clone();
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        info!("Rejected non UTF-8 frame from {}", client_id_recv);
                        match DeviceMessage::error("Unsupported message type").encode() {
                            Ok(text) => {
                                if reply_tx.send(text).is_ok() {
                                    continue;
                                }
                                break;
                            }
                            Err(e) => {
                                warn!("Failed to encode reply: {}", e);
                                continue;
                            }
                        }
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    warn!("WebSocket error for client {}: {}", client_id_recv, e);
                    break;
                }
            };

            debug!("Received message from {}: {}", client_id_recv, text);
            let reply = match recv_state.handle_text(&text).await {
                CommandOutcome::ReplySnapshot => recv_state.snapshot_text().await,
                CommandOutcome::BroadcastSnapshot => {
                    if let Err(e) = recv_state.broadcast_snapshot().await {
                        warn!("{}", e);
                    }
                    continue;
                }
                CommandOutcome::Reject(message) => {
                    info!("Rejected command from {}: {}", client_id_recv, message);
                    DeviceMessage::error(message).encode()
                }
            };

            match reply {
                Ok(text) => {
                    if reply_tx.send(text).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to encode reply: {}", e),
            }
        }
    });

    tokio::select! {
        _ = &mut recv_task => {
            debug!("Receive task completed for client {}", client_id);
            send_task.abort();
        }
        _ = &mut send_task => {
            debug!("Send task completed for client {}", client_id);
            recv_task.abort();
        }
    }

    if let Some(client) = state.clients.write().await.remove(&client_id) {
        let seconds = client.connected_at.elapsed().unwrap_or_default().as_secs();
        info!("WebSocket client disconnected: {} after {}s", client_id, seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DeviceState {
        DeviceState::new(SimulatedBoard::new(
            &PinCatalog::reference(),
            &DeviceConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_create_app() {
        let _app = create_app(state(), &DeviceConfig::default());
    }

    #[tokio::test]
    async fn test_broadcast_no_clients() {
        let state = state();
        assert_eq!(state.client_count().await, 0);
        tokio_test::assert_ok!(state.broadcast_snapshot().await);
    }

    #[tokio::test]
    async fn test_snapshot_text_is_decodable() {
        let text = state().snapshot_text().await.unwrap();
        let decoded = crate::protocol::decode_inbound(&text).unwrap();
        assert!(matches!(decoded, crate::protocol::InboundMessage::Snapshot(_)));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = DeviceServer::bind(
            DeviceConfig::new("127.0.0.1", 0),
            &PinCatalog::reference(),
        )
        .await
        .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }
}
