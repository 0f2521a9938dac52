//! nRF24L01 reading pipe address.
//!
//! Addresses are given on the command line as short ASCII strings such as
//! `0Node` and are sent to the radio byte for byte, first byte first.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address width configured on the radio.
pub const ADDRESS_WIDTH: usize = 5;

/// A 5-byte pipe address. Shorter inputs are padded with zero bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PipeAddress(pub [u8; ADDRESS_WIDTH]);

impl PipeAddress {
    pub fn as_bytes(&self) -> &[u8; ADDRESS_WIDTH] {
        &self.0
    }
}

impl fmt::Display for PipeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        let bytes = &self.0[..end];

        if !bytes.is_empty() && bytes.iter().all(|b| b.is_ascii_graphic()) {
            // checked above: printable ASCII is valid UTF-8
            f.write_str(std::str::from_utf8(bytes).unwrap_or_default())
        } else {
            for b in &self.0 {
                write!(f, "{b:02X}")?;
            }
            Ok(())
        }
    }
}

/// Errors returned when parsing a pipe address string.
#[derive(Error, Debug, PartialEq)]
pub enum ParseAddressError {
    #[error("invalid pipe address: empty")]
    Empty,
    #[error("invalid pipe address: '{0}' is longer than 5 bytes")]
    TooLong(String),
}

impl FromStr for PipeAddress {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.is_empty() {
            return Err(ParseAddressError::Empty);
        }
        if bytes.len() > ADDRESS_WIDTH {
            return Err(ParseAddressError::TooLong(s.to_string()));
        }

        let mut address = [0u8; ADDRESS_WIDTH];
        address[..bytes.len()].copy_from_slice(bytes);
        Ok(PipeAddress(address))
    }
}

impl From<[u8; ADDRESS_WIDTH]> for PipeAddress {
    fn from(bytes: [u8; ADDRESS_WIDTH]) -> Self {
        Self(bytes)
    }
}
