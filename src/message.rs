//! Decoded radio message and its JSON wire form.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of a [`RadioMessage`], as published in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Temperature,
    Humidity,
    Error,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Temperature => "Temperature",
            MessageKind::Humidity => "Humidity",
            MessageKind::Error => "Error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of a message. Each kind carries exactly one of a value or a cause.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Degrees Celsius
    Temperature(f64),
    /// Relative humidity in percent
    Humidity(f64),
    /// Device-reported fault or rejected measurement
    Error(String),
}

impl Reading {
    pub fn kind(&self) -> MessageKind {
        match self {
            Reading::Temperature(_) => MessageKind::Temperature,
            Reading::Humidity(_) => MessageKind::Humidity,
            Reading::Error(_) => MessageKind::Error,
        }
    }
}

/// A validated message from a sensor node.
///
/// The timestamp is assigned by the receiver: sensor nodes have no clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireMessage", try_from = "WireMessage")]
pub struct RadioMessage {
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub device_id: u8,
    pub reading: Reading,
}

impl RadioMessage {
    pub fn new(timestamp: u64, device_id: u8, reading: Reading) -> Self {
        Self {
            timestamp,
            device_id,
            reading,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.reading.kind()
    }

    pub fn value(&self) -> Option<f64> {
        match self.reading {
            Reading::Temperature(value) | Reading::Humidity(value) => Some(value),
            Reading::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.reading {
            Reading::Error(cause) => Some(cause),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.reading, Reading::Error(_))
    }

    /// Serialize to the compact JSON object published on the bus.
    pub fn to_json(&self) -> String {
        // A struct of integers, a unit enum, and an f64 or string cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl fmt::Display for RadioMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timestamp: {}, Device id: {}, {}: ",
            self.timestamp,
            self.device_id,
            self.kind()
        )?;
        match &self.reading {
            Reading::Temperature(value) | Reading::Humidity(value) => write!(f, "{value}"),
            Reading::Error(cause) => f.write_str(cause),
        }
    }
}

/// Errors returned when a JSON object does not describe a valid message.
#[derive(Error, Debug, PartialEq)]
pub enum MessageFormatError {
    #[error("{0} message has no value")]
    MissingValue(MessageKind),
    #[error("Error message has no error text")]
    MissingError,
}

/// Field layout of the published JSON object.
#[derive(Serialize, Deserialize)]
struct WireMessage {
    timestamp: u64,
    device_id: u8,
    #[serde(rename = "type")]
    kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<RadioMessage> for WireMessage {
    fn from(message: RadioMessage) -> Self {
        let kind = message.kind();
        let (value, error) = match message.reading {
            Reading::Temperature(value) | Reading::Humidity(value) => (Some(value), None),
            Reading::Error(cause) => (None, Some(cause)),
        };

        WireMessage {
            timestamp: message.timestamp,
            device_id: message.device_id,
            kind,
            value,
            error,
        }
    }
}

impl TryFrom<WireMessage> for RadioMessage {
    type Error = MessageFormatError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let reading = match wire.kind {
            MessageKind::Temperature => Reading::Temperature(
                wire.value
                    .ok_or(MessageFormatError::MissingValue(wire.kind))?,
            ),
            MessageKind::Humidity => Reading::Humidity(
                wire.value
                    .ok_or(MessageFormatError::MissingValue(wire.kind))?,
            ),
            MessageKind::Error => Reading::Error(wire.error.ok_or(MessageFormatError::MissingError)?),
        };

        Ok(RadioMessage::new(wire.timestamp, wire.device_id, reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_temperature_json() {
        let message = RadioMessage::new(1_700_000_000, 7, Reading::Temperature(21.5));
        assert_eq!(
            message.to_json(),
            r#"{"timestamp":1700000000,"device_id":7,"type":"Temperature","value":21.5}"#
        );
    }

    #[test]
    fn test_error_json_has_no_value() {
        let message = RadioMessage::new(5, 3, Reading::Error("Low power".to_string()));
        assert_eq!(
            message.to_json(),
            r#"{"timestamp":5,"device_id":3,"type":"Error","error":"Low power"}"#
        );
    }

    #[test]
    fn test_measurements_never_carry_error_field() {
        for reading in [Reading::Temperature(-4.5), Reading::Humidity(45.01)] {
            let json: Value = serde_json::from_str(&RadioMessage::new(1, 1, reading).to_json())
                .unwrap();
            assert!(json.get("error").is_none());
            assert!(json["value"].is_f64());
        }
    }

    #[test]
    fn test_json_round_trip_keeps_classification() {
        let messages = [
            RadioMessage::new(10, 1, Reading::Temperature(-4.5)),
            RadioMessage::new(11, 2, Reading::Humidity(55.25)),
            RadioMessage::new(12, 3, Reading::Error("Humidity value (0, 45) is invalid".into())),
        ];

        for message in messages {
            let decoded: RadioMessage = serde_json::from_str(&message.to_json()).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_deserialize_rejects_unknown_type() {
        let json = r#"{"timestamp":1,"device_id":1,"type":"Unknown type","error":"x"}"#;
        assert!(serde_json::from_str::<RadioMessage>(json).is_err());
    }

    #[test]
    fn test_deserialize_rejects_missing_payload() {
        let json = r#"{"timestamp":1,"device_id":1,"type":"Humidity"}"#;
        let err = serde_json::from_str::<RadioMessage>(json).unwrap_err();
        assert!(err.to_string().contains("Humidity message has no value"));

        let json = r#"{"timestamp":1,"device_id":1,"type":"Error","value":1.0}"#;
        assert!(serde_json::from_str::<RadioMessage>(json).is_err());
    }

    #[test]
    fn test_display() {
        let message = RadioMessage::new(42, 9, Reading::Humidity(40.5));
        assert_eq!(
            message.to_string(),
            "Timestamp: 42, Device id: 9, Humidity: 40.5"
        );

        let message = RadioMessage::new(42, 9, Reading::Error("Other error".into()));
        assert_eq!(
            message.to_string(),
            "Timestamp: 42, Device id: 9, Error: Other error"
        );
    }

    #[test]
    fn test_accessors() {
        let message = RadioMessage::new(1, 1, Reading::Temperature(20.0));
        assert_eq!(message.kind(), MessageKind::Temperature);
        assert_eq!(message.value(), Some(20.0));
        assert_eq!(message.error(), None);
        assert!(!message.is_error());
    }
}
