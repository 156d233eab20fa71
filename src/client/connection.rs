//! Connection lifecycle state machine.
//!
//! [`ConnectionManager`] performs no I/O. It consumes channel and timer
//! events stamped with an [`Instant`] and answers with [`Action`]s for the
//! driver to carry out, so every transition can be exercised with a
//! simulated clock.

use crate::protocol::{decode_inbound, InboundMessage, OutboundMessage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Status of the channel to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    /// Text shown in the status indicator.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting…",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Identity of one channel instance. A new id is minted for every `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Events reported by a transport about one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel is ready for traffic
    Opened(ChannelId),
    /// A text frame arrived
    Message(ChannelId, String),
    /// The channel is gone, gracefully or not
    Closed(ChannelId),
    /// Transport-level failure; a `Closed` follows once the channel is torn down
    Error(ChannelId, String),
}

impl ChannelEvent {
    pub fn channel(&self) -> ChannelId {
        match self {
            ChannelEvent::Opened(id)
            | ChannelEvent::Message(id, _)
            | ChannelEvent::Closed(id)
            | ChannelEvent::Error(id, _) => *id,
        }
    }
}

/// Timer expirations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    ConnectTimeout(ChannelId),
    ReconnectDue,
}

/// Work requested from the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start connecting a new channel
    Open(ChannelId),
    /// Tear the channel down; the transport must answer with `Closed`
    Close(ChannelId),
    /// Write a frame on the channel
    Send(ChannelId, OutboundMessage),
    /// A decoded device message for the session to apply
    Deliver(InboundMessage),
    /// Presentation must be refreshed
    Render,
}

/// Owns the lifecycle of the single current channel to the device.
#[derive(Debug)]
pub struct ConnectionManager {
    status: ConnectionStatus,
    current: Option<ChannelId>,
    next_channel: u64,
    connect_deadline: Option<(ChannelId, Instant)>,
    reconnect_at: Option<Instant>,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    disposed: bool,
}

impl ConnectionManager {
    pub fn new(connect_timeout: Duration, reconnect_delay: Duration) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            current: None,
            next_channel: 0,
            connect_deadline: None,
            reconnect_at: None,
            connect_timeout,
            reconnect_delay,
            disposed: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// The channel currently considered live, if any.
    pub fn current_channel(&self) -> Option<ChannelId> {
        self.current
    }

    /// When the pending reconnect attempt is due.
    pub fn reconnect_at(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        let connect = self.connect_deadline.map(|(_, at)| at);
        match (connect, self.reconnect_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Start a fresh channel, superseding any previous one.
    pub fn open(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.disposed {
            return actions;
        }

        if let Some(previous) = self.current.take() {
            actions.push(Action::Close(previous));
        }

        self.next_channel += 1;
        let id = ChannelId(self.next_channel);
        self.current = Some(id);
        self.reconnect_at = None;
        self.connect_deadline = Some((id, now + self.connect_timeout));

        info!("Opening channel {}", id);
        actions.push(Action::Open(id));
        self.transition(ConnectionStatus::Connecting, &mut actions);
        actions
    }

    /// Apply one transport event.
    pub fn handle_channel(&mut self, event: ChannelEvent, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        let id = event.channel();

        if self.current != Some(id) {
            debug!("Ignoring event from superseded channel {}: {:?}", id, event);
            if matches!(event, ChannelEvent::Opened(_)) {
                actions.push(Action::Close(id));
            }
            return actions;
        }

        match event {
            ChannelEvent::Opened(_) => {
                if self.status != ConnectionStatus::Connecting {
                    debug!("Channel {} opened after being abandoned", id);
                    return actions;
                }
                self.connect_deadline = None;
                info!("Channel {} connected", id);
                self.transition(ConnectionStatus::Connected, &mut actions);
                actions.push(Action::Send(id, OutboundMessage::Snapshot));
            }
            ChannelEvent::Message(_, text) => {
                if self.status != ConnectionStatus::Connected {
                    debug!("Dropping message on channel {} while {}", id, self.status);
                    return actions;
                }
                match decode_inbound(&text) {
                    Ok(message) => {
                        actions.push(Action::Deliver(message));
                        actions.push(Action::Render);
                    }
                    Err(e) => {
                        warn!("Malformed message on channel {}: {}", id, e);
                        self.transition(ConnectionStatus::Disconnected, &mut actions);
                        actions.push(Action::Close(id));
                    }
                }
            }
            ChannelEvent::Closed(_) => {
                self.connect_deadline = None;
                self.current = None;
                self.status = ConnectionStatus::Disconnected;
                actions.push(Action::Render);

                if !self.disposed {
                    self.reconnect_at = Some(now + self.reconnect_delay);
                    info!(
                        "Channel {} closed, reconnecting in {}ms",
                        id,
                        self.reconnect_delay.as_millis()
                    );
                }
            }
            ChannelEvent::Error(_, reason) => {
                warn!("Channel {} failed: {}", id, reason);
                self.connect_deadline = None;
                self.transition(ConnectionStatus::Disconnected, &mut actions);
                actions.push(Action::Close(id));
            }
        }

        actions
    }

    /// Apply one timer expiration.
    pub fn handle_timer(&mut self, event: TimerEvent, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();

        match event {
            TimerEvent::ConnectTimeout(id) => {
                let armed = matches!(self.connect_deadline, Some((armed, _)) if armed == id);
                if !armed {
                    return actions;
                }
                self.connect_deadline = None;
                if self.current == Some(id) && self.status == ConnectionStatus::Connecting {
                    warn!(
                        "Channel {} not ready after {}ms, giving up",
                        id,
                        self.connect_timeout.as_millis()
                    );
                    self.transition(ConnectionStatus::Disconnected, &mut actions);
                    actions.push(Action::Close(id));
                }
            }
            TimerEvent::ReconnectDue => {
                if self.reconnect_at.take().is_some() {
                    actions = self.open(now);
                }
            }
        }

        actions
    }

    /// Fire every timer that is due at `now`.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();

        if let Some((id, at)) = self.connect_deadline {
            if now >= at {
                actions.extend(self.handle_timer(TimerEvent::ConnectTimeout(id), now));
            }
        }
        if let Some(at) = self.reconnect_at {
            if now >= at {
                actions.extend(self.handle_timer(TimerEvent::ReconnectDue, now));
            }
        }

        actions
    }

    /// Route an outbound message to the current channel, or drop it when not connected.
    pub fn send(&self, message: OutboundMessage) -> Option<Action> {
        match self.current {
            Some(id) if self.is_connected() => Some(Action::Send(id, message)),
            _ => {
                debug!("Dropping {:?} while {}", message, self.status);
                None
            }
        }
    }

    /// Cancel all timers and close the current channel. Nothing reopens afterwards.
    pub fn dispose(&mut self) -> Vec<Action> {
        self.disposed = true;
        self.connect_deadline = None;
        self.reconnect_at = None;
        self.status = ConnectionStatus::Disconnected;
        self.current.take().map(Action::Close).into_iter().collect()
    }

    fn transition(&mut self, status: ConnectionStatus, actions: &mut Vec<Action>) {
        if self.status != status {
            debug!("Connection status {} -> {}", self.status, status);
        }
        self.status = status;
        actions.push(Action::Render);
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(crate::DEFAULT_CONNECT_TIMEOUT_MS),
            Duration::from_millis(crate::DEFAULT_RECONNECT_DELAY_MS),
        )
    }
}
