//! Wire layout of sensor node packets and the decoder.
//!
//! ```text
//! byte 0    device id
//! byte 1    type: 0x00 temperature, 0x01 humidity, 0xFF error
//! byte 2..  payload (8 bytes)
//!           temperature: i8 integer part, u8 hundredths
//!           humidity:    u8 integer part, u8 hundredths
//!           error:       u8 error code
//! ```

use crate::classify::{classify_humidity, classify_temperature, describe_error_code};
use crate::message::{RadioMessage, Reading};

/// Size of the payload union following the two header bytes.
pub const PAYLOAD_SIZE: usize = 8;

/// Total size of a packet on the wire.
pub const PACKET_SIZE: usize = 2 + PAYLOAD_SIZE;

const TYPE_TEMPERATURE: u8 = 0x00;
const TYPE_HUMIDITY: u8 = 0x01;
const TYPE_ERROR: u8 = 0xFF;

/// Message discriminator from byte 1 of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Temperature,
    Humidity,
    Error,
    Unknown(u8),
}

impl From<u8> for PacketType {
    fn from(byte: u8) -> Self {
        match byte {
            TYPE_TEMPERATURE => PacketType::Temperature,
            TYPE_HUMIDITY => PacketType::Humidity,
            TYPE_ERROR => PacketType::Error,
            other => PacketType::Unknown(other),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        match packet_type {
            PacketType::Temperature => TYPE_TEMPERATURE,
            PacketType::Humidity => TYPE_HUMIDITY,
            PacketType::Error => TYPE_ERROR,
            PacketType::Unknown(byte) => byte,
        }
    }
}

/// A packet as transmitted by a sensor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawPacket {
    pub device_id: u8,
    pub packet_type: u8,
    pub payload: [u8; PAYLOAD_SIZE],
}

impl RawPacket {
    /// Read a packet from the start of `bytes`.
    ///
    /// Radio payloads are usually longer than a packet; trailing bytes are
    /// ignored. Missing bytes read as zero.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut raw = [0u8; PACKET_SIZE];
        let len = bytes.len().min(PACKET_SIZE);
        raw[..len].copy_from_slice(&bytes[..len]);

        let mut payload = [0u8; PAYLOAD_SIZE];
        payload.copy_from_slice(&raw[2..]);

        RawPacket {
            device_id: raw[0],
            packet_type: raw[1],
            payload,
        }
    }

    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let mut bytes = [0u8; PACKET_SIZE];
        bytes[0] = self.device_id;
        bytes[1] = self.packet_type;
        bytes[2..].copy_from_slice(&self.payload);
        bytes
    }

    pub fn temperature(device_id: u8, integer: i8, fraction: u8) -> Self {
        Self::with_payload(device_id, PacketType::Temperature, &[integer as u8, fraction])
    }

    pub fn humidity(device_id: u8, integer: u8, fraction: u8) -> Self {
        Self::with_payload(device_id, PacketType::Humidity, &[integer, fraction])
    }

    pub fn error(device_id: u8, code: u8) -> Self {
        Self::with_payload(device_id, PacketType::Error, &[code])
    }

    fn with_payload(device_id: u8, packet_type: PacketType, head: &[u8]) -> Self {
        let mut payload = [0u8; PAYLOAD_SIZE];
        payload[..head.len()].copy_from_slice(head);
        RawPacket {
            device_id,
            packet_type: packet_type.into(),
            payload,
        }
    }

    pub fn kind(&self) -> PacketType {
        PacketType::from(self.packet_type)
    }
}

/// Decode a packet into a validated message stamped with `timestamp`.
///
/// Every input produces a message. Out-of-range measurements, device fault
/// codes and unknown type bytes all become error messages.
pub fn decode_packet(packet: &RawPacket, timestamp: u64) -> RadioMessage {
    let [first, second, ..] = packet.payload;

    let reading = match packet.kind() {
        PacketType::Temperature => classify_temperature(first as i8, second),
        PacketType::Humidity => classify_humidity(first, second),
        PacketType::Error => Reading::Error(describe_error_code(first).to_string()),
        PacketType::Unknown(byte) => {
            Reading::Error(format!("Invalid type ({byte}) in radio message"))
        }
    };

    RadioMessage::new(timestamp, packet.device_id, reading)
}

/// Decode the first [`PACKET_SIZE`] bytes of a radio payload.
pub fn decode_bytes(bytes: &[u8], timestamp: u64) -> RadioMessage {
    decode_packet(&RawPacket::from_bytes(bytes), timestamp)
}
