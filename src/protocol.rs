//! JSON wire protocol spoken between the dashboard and the device controller.
//!
//! Every message is a JSON object with a `type` discriminator. Client to
//! device: `snapshot`, `set`, `write`. Device to client: `snapshot`, `error`.

use crate::board::runtime::PinMode;
use crate::error::{DeckError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands sent from the dashboard to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Ask for a full state dump
    Snapshot,
    /// Change the mode of a GPIO
    Set { gpio: u32, mode: PinMode },
    /// Drive an output GPIO high or low
    Write { gpio: u32, value: bool },
}

impl OutboundMessage {
    /// Serialize to the JSON text frame sent on the channel.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| DeckError::protocol_error(e.to_string()))
    }
}

/// Why an inbound payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    NotJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no string `type` field")]
    MissingType,

    #[error("unsupported message type `{0}`")]
    UnknownType(String),

    #[error("snapshot has no `pins` array")]
    MissingPins,

    #[error("error message has no `message` string")]
    MalformedError,
}

/// One loosely typed entry of a device snapshot.
///
/// Fields are kept as raw JSON so that coercion rules live in one place
/// (the runtime store merge) instead of failing the whole message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotPin {
    pub gpio: Value,
    pub mode: Value,
    pub value: Value,
    pub can_control: Value,
}

impl SnapshotPin {
    /// Capture the fields of one `pins` element; non-objects yield an empty entry.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let field = |key: &str| object.get(key).cloned().unwrap_or(Value::Null);

        Self {
            gpio: field("gpio"),
            mode: field("mode"),
            value: field("value"),
            can_control: field("canControl"),
        }
    }

    /// The GPIO index, if it is a non-negative integral number.
    pub fn gpio_index(&self) -> Option<u32> {
        let Value::Number(number) = &self.gpio else {
            return None;
        };
        if let Some(index) = number.as_u64() {
            return u32::try_from(index).ok();
        }
        let float = number.as_f64()?;
        if float >= 0.0 && float.fract() == 0.0 && float <= f64::from(u32::MAX) {
            Some(float as u32)
        } else {
            None
        }
    }

    /// Reported mode, `input` unless it is a recognized mode string.
    pub fn mode_or_default(&self) -> PinMode {
        self.mode
            .as_str()
            .and_then(PinMode::from_wire)
            .unwrap_or_default()
    }

    /// Reported level, using JSON truthiness.
    pub fn level(&self) -> bool {
        truthy(&self.value)
    }

    /// Controllable unless the device explicitly says `false`.
    pub fn controllable(&self) -> bool {
        self.can_control != Value::Bool(false)
    }
}

/// Snapshot report as received by the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotMessage {
    pub pins: Vec<SnapshotPin>,
    /// Board target name, when the device reports one
    pub target: Option<String>,
    /// Device uptime in milliseconds, when reported
    pub uptime_ms: Option<u64>,
}

/// Messages the dashboard understands from the device.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Snapshot(SnapshotMessage),
    /// The device rejected a command
    DeviceError { message: String },
}

/// Decode one text frame from the device.
pub fn decode_inbound(text: &str) -> std::result::Result<InboundMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::NotJson(e.to_string()))?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;

    match kind {
        "snapshot" => {
            let pins = object
                .get("pins")
                .and_then(Value::as_array)
                .ok_or(DecodeError::MissingPins)?;
            Ok(InboundMessage::Snapshot(SnapshotMessage {
                pins: pins.iter().map(SnapshotPin::from_value).collect(),
                target: object.get("target").and_then(Value::as_str).map(str::to_string),
                uptime_ms: object.get("uptimeMs").and_then(Value::as_u64),
            }))
        }
        "error" => {
            let message = object
                .get("message")
                .and_then(Value::as_str)
                .ok_or(DecodeError::MalformedError)?;
            Ok(InboundMessage::DeviceError {
                message: message.to_string(),
            })
        }
        other => Err(DecodeError::UnknownType(other.to_string())),
    }
}

/// Typed pin entry produced by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinReport {
    pub gpio: u32,
    pub mode: PinMode,
    pub value: bool,
    #[serde(rename = "canControl")]
    pub can_control: bool,
}

/// Messages produced by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceMessage {
    Snapshot {
        target: String,
        #[serde(rename = "uptimeMs")]
        uptime_ms: u64,
        pins: Vec<PinReport>,
    },
    Error {
        message: String,
    },
}

impl DeviceMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| DeckError::protocol_error(e.to_string()))
    }
}

/// JavaScript-style truthiness of a JSON value.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_wire_format() {
        assert_eq!(OutboundMessage::Snapshot.encode().unwrap(), r#"{"type":"snapshot"}"#);

        let set = OutboundMessage::Set { gpio: 14, mode: PinMode::InputPullup };
        let value: Value = serde_json::from_str(&set.encode().unwrap()).unwrap();
        assert_eq!(value, json!({ "type": "set", "gpio": 14, "mode": "input_pullup" }));

        let write = OutboundMessage::Write { gpio: 2, value: false };
        let value: Value = serde_json::from_str(&write.encode().unwrap()).unwrap();
        assert_eq!(value, json!({ "type": "write", "gpio": 2, "value": false }));
    }

    #[test]
    fn test_decode_snapshot() {
        let text = r#"{"type":"snapshot","target":"esp32s3","uptimeMs":1234,
            "pins":[{"gpio":4,"mode":"output","value":true,"canControl":false}]}"#;

        let InboundMessage::Snapshot(snapshot) = decode_inbound(text).unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.target.as_deref(), Some("esp32s3"));
        assert_eq!(snapshot.uptime_ms, Some(1234));
        assert_eq!(snapshot.pins.len(), 1);
        assert_eq!(snapshot.pins[0].gpio_index(), Some(4));
        assert_eq!(snapshot.pins[0].mode_or_default(), PinMode::Output);
        assert!(snapshot.pins[0].level());
        assert!(!snapshot.pins[0].controllable());
    }

    #[test]
    fn test_decode_rejections() {
        assert!(matches!(decode_inbound("not json"), Err(DecodeError::NotJson(_))));
        assert_eq!(decode_inbound("[1,2]"), Err(DecodeError::NotAnObject));
        assert_eq!(decode_inbound(r#"{"pins":[]}"#), Err(DecodeError::MissingType));
        assert_eq!(
            decode_inbound(r#"{"type":"hello"}"#),
            Err(DecodeError::UnknownType("hello".to_string()))
        );
        assert_eq!(
            decode_inbound(r#"{"type":"snapshot","pins":{}}"#),
            Err(DecodeError::MissingPins)
        );
        assert_eq!(decode_inbound(r#"{"type":"error"}"#), Err(DecodeError::MalformedError));
    }

    #[test]
    fn test_decode_device_error() {
        let message = decode_inbound(r#"{"type":"error","message":"Unsupported GPIO"}"#).unwrap();
        assert_eq!(
            message,
            InboundMessage::DeviceError { message: "Unsupported GPIO".to_string() }
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("0")));
        assert!(truthy(&json!([])));
    }

    #[test]
    fn test_gpio_index_accepts_integral_floats() {
        let pin = SnapshotPin::from_value(&json!({ "gpio": 14.0 }));
        assert_eq!(pin.gpio_index(), Some(14));
        let pin = SnapshotPin::from_value(&json!({ "gpio": 14.5 }));
        assert_eq!(pin.gpio_index(), None);
    }

    #[test]
    fn test_device_message_encoding() {
        let message = DeviceMessage::Snapshot {
            target: "sim".to_string(),
            uptime_ms: 10,
            pins: vec![PinReport { gpio: 1, mode: PinMode::Output, value: true, can_control: true }],
        };
        let value: Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "snapshot",
                "target": "sim",
                "uptimeMs": 10,
                "pins": [{ "gpio": 1, "mode": "output", "value": true, "canControl": true }]
            })
        );
    }
}
