//! Dashboard client: connection lifecycle, command routing and the session
//! that ties them to the board state.
//!
//! The state machine and session are free of I/O; [`driver`] runs them on
//! tokio against a [`transport::Connector`].

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod driver;
pub mod session;
pub mod transport;

// Re-export commonly used items
pub use config::ClientConfig;
pub use connection::{Action, ChannelEvent, ChannelId, ConnectionManager, ConnectionStatus, TimerEvent};
pub use dispatcher::{CommandDispatcher, Dispatch, DropReason};
pub use driver::{spawn, DashboardHandle, DriverCommand};
pub use session::{DeviceInfo, Session, UiEvent};
pub use transport::{ChannelCommand, ChannelHandle, Connector, WebSocketConnector};
