//! Simulated pin controller.
//!
//! Speaks the same websocket protocol as the real firmware so the dashboard
//! can be exercised without hardware. [`SimulatedBoard`] holds the pin state
//! and validates commands; [`server`] serves it over axum.

pub mod config;
pub mod server;

// Re-export commonly used items
pub use config::DeviceConfig;
pub use server::{create_app, start_device_server, DeviceServer, DeviceState};

use crate::board::catalog::PinCatalog;
use crate::board::runtime::PinMode;
use crate::protocol::{DeviceMessage, PinReport};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

/// What the server should do after a client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Send a snapshot to the requesting client only
    ReplySnapshot,
    /// State changed; send a snapshot to every client
    BroadcastSnapshot,
    /// Send an error message to the requesting client
    Reject(String),
}

impl CommandOutcome {
    fn reject(message: &str) -> Self {
        Self::Reject(message.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
struct SimulatedPin {
    mode: PinMode,
    driven: bool,
    can_control: bool,
}

impl SimulatedPin {
    /// Level read back from the pin. Floating inputs read low, pulled-up inputs high.
    fn level(&self) -> bool {
        match self.mode {
            PinMode::Input => false,
            PinMode::InputPullup => true,
            PinMode::Output => self.driven,
        }
    }
}

/// In-memory pin controller.
#[derive(Debug)]
pub struct SimulatedBoard {
    target: String,
    started: Instant,
    pins: BTreeMap<u32, SimulatedPin>,
}

impl SimulatedBoard {
    /// Every addressable catalog pin starts as a low input.
    pub fn new(catalog: &PinCatalog, config: &DeviceConfig) -> Self {
        let pins = catalog
            .gpios()
            .map(|gpio| {
                let pin = SimulatedPin {
                    mode: PinMode::Input,
                    driven: false,
                    can_control: !config.reserved_gpios.contains(&gpio),
                };
                (gpio, pin)
            })
            .collect();

        Self {
            target: config.target.clone(),
            started: Instant::now(),
            pins,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Current state of every pin.
    pub fn snapshot(&self) -> DeviceMessage {
        DeviceMessage::Snapshot {
            target: self.target.clone(),
            uptime_ms: self.started.elapsed().as_millis() as u64,
            pins: self
                .pins
                .iter()
                .map(|(&gpio, pin)| PinReport {
                    gpio,
                    mode: pin.mode,
                    value: pin.level(),
                    can_control: pin.can_control,
                })
                .collect(),
        }
    }

    /// Apply one text frame from a client.
    pub fn handle_text(&mut self, text: &str) -> CommandOutcome {
        let message: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => return CommandOutcome::reject("Unsupported message type"),
        };

        match message.get("type").and_then(Value::as_str) {
            Some("snapshot") => CommandOutcome::ReplySnapshot,
            Some("set") => self.handle_set(&message),
            Some("write") => self.handle_write(&message),
            _ => CommandOutcome::reject("Unsupported message type"),
        }
    }

    fn handle_set(&mut self, message: &Value) -> CommandOutcome {
        let (Some(gpio), Some(mode)) = (
            gpio_field(message),
            message.get("mode").and_then(Value::as_str),
        ) else {
            return CommandOutcome::reject("Invalid set payload");
        };

        let pin = match self.controllable_pin(gpio) {
            Ok(pin) => pin,
            Err(outcome) => return outcome,
        };

        let Some(mode) = PinMode::from_wire(mode) else {
            return CommandOutcome::reject("Unsupported mode");
        };

        pin.mode = mode;
        if mode == PinMode::Output {
            if let Some(level) = level_field(message) {
                pin.driven = level;
            }
        }
        CommandOutcome::BroadcastSnapshot
    }

    fn handle_write(&mut self, message: &Value) -> CommandOutcome {
        let (Some(gpio), Some(level)) = (gpio_field(message), level_field(message)) else {
            return CommandOutcome::reject("Invalid write payload");
        };

        let pin = match self.controllable_pin(gpio) {
            Ok(pin) => pin,
            Err(outcome) => return outcome,
        };

        if pin.mode != PinMode::Output {
            return CommandOutcome::reject("GPIO not in output mode");
        }

        pin.driven = level;
        CommandOutcome::BroadcastSnapshot
    }

    fn controllable_pin(&mut self, gpio: u32) -> Result<&mut SimulatedPin, CommandOutcome> {
        match self.pins.get_mut(&gpio) {
            None => Err(CommandOutcome::reject("Unsupported GPIO")),
            Some(pin) if !pin.can_control => {
                Err(CommandOutcome::reject("GPIO is reserved or unavailable"))
            }
            Some(pin) => Ok(pin),
        }
    }
}

/// GPIO numbers on the wire fit in a byte.
fn gpio_field(message: &Value) -> Option<u32> {
    message
        .get("gpio")
        .and_then(Value::as_u64)
        .filter(|gpio| *gpio <= u8::MAX as u64)
        .map(|gpio| gpio as u32)
}

/// Levels may be sent as booleans or as 0/1.
fn level_field(message: &Value) -> Option<bool> {
    match message.get("value")? {
        Value::Bool(level) => Some(*level),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}
