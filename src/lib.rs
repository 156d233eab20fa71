//! # Pin Deck - GPIO pin dashboard client
//!
//! Connects to a microcontroller's pin controller over WebSocket, keeps a
//! local copy of the reported pin state and renders it as a filterable
//! dashboard. Mode changes and output writes are sent as commands; the
//! dashboard only changes when the device reports back.
//!
//! ## Features
//!
//! - **Self-healing connection**: connect timeout, fixed reconnect delay,
//!   malformed messages force a reconnect
//! - **Stale-but-retained state**: the last reported pin state stays visible
//!   while disconnected, with every control disabled
//! - **Structured view model**: pure rendering to plain data, with a text
//!   adapter for terminals and serde for JSON
//! - **Simulated device**: an axum server speaking the same protocol
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pin_deck::{client, ClientConfig, PinCatalog, Session, WebSocketConnector};
//! use futures_util::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("192.168.1.40");
//!     let session = Session::new(PinCatalog::reference(), &config)?;
//!     let dashboard = client::spawn(session, WebSocketConnector::new(config.endpoint_url()));
//!
//!     let mut views = dashboard.views();
//!     while let Some(view) = views.next().await {
//!         println!("{}", pin_deck::render_text(&view));
//!     }
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod client;
pub mod device;
pub mod error;
pub mod protocol;
pub mod view;

// Re-export public API
pub use board::{PinCatalog, PinCategory, PinDescriptor, PinMode, RuntimeState, RuntimeStateStore};
pub use client::{
    ClientConfig, CommandDispatcher, ConnectionManager, ConnectionStatus, DashboardHandle, Session,
    UiEvent, WebSocketConnector,
};
pub use device::{start_device_server, DeviceConfig};
pub use error::{DeckError, Result};
pub use protocol::{decode_inbound, InboundMessage, OutboundMessage};
pub use view::{render, render_text, CategoryFilter, DashboardView, PinGrid};

/// The default port of the device's HTTP/WebSocket server
pub const DEFAULT_DEVICE_PORT: u16 = 8080;

/// The WebSocket endpoint path on the device
pub const DEFAULT_WS_PATH: &str = "/ws";

/// How long a new channel may take to become ready, in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

/// Delay between a disconnect and the next attempt, in milliseconds
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

/// The simulated device's snapshot broadcast period, in milliseconds
pub const DEFAULT_BROADCAST_INTERVAL_MS: u64 = 700;
