//! Turns operator actions on rendered controls into device commands.

use crate::board::runtime::PinMode;
use crate::client::connection::{Action, ChannelId, ConnectionManager};
use crate::protocol::OutboundMessage;
use tracing::debug;

/// Why a command never left the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The control did not carry an integral GPIO index
    InvalidGpio,
    /// The selector value is not a known mode
    InvalidMode,
    /// No channel is connected
    NotConnected,
}

/// Result of a dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Sent {
        channel: ChannelId,
        message: OutboundMessage,
    },
    Dropped(DropReason),
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Dispatch::Sent { .. })
    }
}

/// Validates operator input and routes commands through the connection.
///
/// Drops are silent towards the operator: controls that could produce them
/// are already rendered disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Mode selector changed. `gpio` and `mode` are the raw control values.
    pub fn request_mode_change(
        &self,
        connection: &ConnectionManager,
        gpio: &str,
        mode: &str,
    ) -> Dispatch {
        let Some(gpio) = parse_gpio(gpio) else {
            return self.reject(DropReason::InvalidGpio);
        };
        let Some(mode) = PinMode::from_wire(mode.trim()) else {
            return self.reject(DropReason::InvalidMode);
        };
        self.set_mode(connection, gpio, mode)
    }

    /// Toggle control pressed. `next` is the control's encoded next level ("1" is high).
    pub fn request_write(&self, connection: &ConnectionManager, gpio: &str, next: &str) -> Dispatch {
        let Some(gpio) = parse_gpio(gpio) else {
            return self.reject(DropReason::InvalidGpio);
        };
        self.write(connection, gpio, next == "1")
    }

    /// Send a typed mode change.
    pub fn set_mode(&self, connection: &ConnectionManager, gpio: u32, mode: PinMode) -> Dispatch {
        self.route(connection, OutboundMessage::Set { gpio, mode })
    }

    /// Send a typed output write.
    pub fn write(&self, connection: &ConnectionManager, gpio: u32, value: bool) -> Dispatch {
        self.route(connection, OutboundMessage::Write { gpio, value })
    }

    fn route(&self, connection: &ConnectionManager, message: OutboundMessage) -> Dispatch {
        match connection.send(message) {
            Some(Action::Send(channel, message)) => Dispatch::Sent { channel, message },
            _ => self.reject(DropReason::NotConnected),
        }
    }

    fn reject(&self, reason: DropReason) -> Dispatch {
        debug!("Command dropped: {:?}", reason);
        Dispatch::Dropped(reason)
    }
}

/// Resolve a control's GPIO attribute to an integral index.
pub fn parse_gpio(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(gpio) = raw.parse::<u32>() {
        return Some(gpio);
    }
    let float = raw.parse::<f64>().ok()?;
    if float >= 0.0 && float.fract() == 0.0 && float <= f64::from(u32::MAX) {
        Some(float as u32)
    } else {
        None
    }
}
