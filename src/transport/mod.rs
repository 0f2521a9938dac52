//! Publish side of the bridge.
//!
//! A [`Transport`] hands serialized messages to the message bus. The
//! [`Publisher`] turns each [`RadioMessage`] into JSON and makes exactly one
//! hand-off attempt: there is no retry and no queue of its own.

pub mod mqtt;
pub mod writer;

use crate::message::RadioMessage;
use std::fmt;
use std::io;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub use mqtt::{Credentials, MqttTransport};
pub use writer::WriterTransport;

/// Default MQTT broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Error type for transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid endpoint '{0}': expected mqtt://HOST[:PORT] or '-'")]
    InvalidEndpoint(String),
    #[error("invalid MQTT client id '{0}'")]
    InvalidClientId(String),
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("transport is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A message bus the bridge can hand payloads to.
pub trait Transport {
    /// Hand one payload over. Must not wait for delivery.
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Human-readable description of where payloads go.
    fn endpoint(&self) -> String;
}

/// Where to publish, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// MQTT broker
    Mqtt { host: String, port: u16 },
    /// Newline-delimited JSON on stdout
    Stdout,
}

impl FromStr for Endpoint {
    type Err = TransportError;

    /// Accepts `mqtt://HOST[:PORT]` or `-` for stdout.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-" {
            return Ok(Endpoint::Stdout);
        }

        let invalid = || TransportError::InvalidEndpoint(s.to_string());
        let authority = s.strip_prefix("mqtt://").ok_or_else(invalid)?;

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (authority, DEFAULT_MQTT_PORT),
        };

        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Endpoint::Mqtt {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Mqtt { host, port } => write!(f, "mqtt://{host}:{port}"),
            Endpoint::Stdout => f.write_str("stdout"),
        }
    }
}

/// Best-effort publisher of radio messages.
#[derive(Debug)]
pub struct Publisher<T: Transport> {
    transport: T,
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Serialize `message` and attempt a single hand-off.
    ///
    /// Returns `false` if the transport refused it. The message is then lost;
    /// reporting it is up to the caller.
    pub fn publish(&mut self, message: &RadioMessage) -> bool {
        match self.transport.send(message.to_json().as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Transport refused message");
                false
            }
        }
    }
}
