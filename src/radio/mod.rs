//! Radio transceiver abstraction.
//!
//! The [`Radio`] trait is the small slice of an nRF24L01 driver the receiver
//! needs. [`nrf24::Nrf24`] implements it on top of any SPI [`nrf24::Bus`];
//! the `spidev` feature provides a Linux bus using `/dev/spidevB.C` and a
//! sysfs GPIO line for chip enable.

pub mod nrf24;

#[cfg(feature = "spidev")]
pub mod spidev;

use crate::pipe_address::PipeAddress;
use std::io;
use thiserror::Error;

/// Maximum number of reading pipes a receiver listens on.
///
/// Pipe 0 is shared with transmit on the nRF24L01, so pipes 1 to 5 are used.
pub const MAX_READING_PIPES: usize = 5;

/// Error type for radio operations.
#[derive(Error, Debug)]
pub enum RadioError {
    /// SPI device could not be opened or configured
    #[error("SPI device {path}: {source}")]
    SpiDevice {
        path: String,
        #[source]
        source: io::Error,
    },
    /// SPI transfer failed
    #[error("SPI transfer failed: {0}")]
    Transfer(#[source] io::Error),
    /// GPIO line could not be driven
    #[error("GPIO {pin}: {source}")]
    Gpio {
        pin: u32,
        #[source]
        source: io::Error,
    },
    /// Pipe number outside 0..=5
    #[error("invalid reading pipe {0}")]
    InvalidPipe(u8),
    /// Backend not available (not compiled in)
    #[allow(dead_code)]
    #[error("radio backend '{0}' not available (not compiled in)")]
    BackendNotAvailable(String),
}

/// Power amplifier level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaLevel {
    /// -18 dBm
    Min,
    /// -12 dBm
    #[default]
    Low,
    /// -6 dBm
    High,
    /// 0 dBm
    Max,
}

impl PaLevel {
    pub(crate) fn bits(self) -> u8 {
        match self {
            PaLevel::Min => 0,
            PaLevel::Low => 1,
            PaLevel::High => 2,
            PaLevel::Max => 3,
        }
    }
}

/// Operations the receiver needs from the transceiver.
pub trait Radio {
    /// Reset the chip to a known configuration and power it up.
    fn begin(&mut self) -> Result<(), RadioError>;

    /// Check that the chip answers on the bus.
    fn is_chip_connected(&mut self) -> Result<bool, RadioError>;

    /// Number of bytes one received payload occupies.
    fn payload_size(&self) -> usize;

    fn set_pa_level(&mut self, level: PaLevel) -> Result<(), RadioError>;

    fn open_reading_pipe(&mut self, pipe: u8, address: &PipeAddress) -> Result<(), RadioError>;

    fn start_listening(&mut self) -> Result<(), RadioError>;

    /// Non-blocking check for a payload in the receive FIFO.
    fn available(&mut self) -> Result<bool, RadioError>;

    /// Pop one payload into `buf`, returning the number of bytes copied.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError>;

    fn power_down(&mut self) -> Result<(), RadioError>;
}

impl<R: Radio + ?Sized> Radio for Box<R> {
    fn begin(&mut self) -> Result<(), RadioError> {
        (**self).begin()
    }

    fn is_chip_connected(&mut self) -> Result<bool, RadioError> {
        (**self).is_chip_connected()
    }

    fn payload_size(&self) -> usize {
        (**self).payload_size()
    }

    fn set_pa_level(&mut self, level: PaLevel) -> Result<(), RadioError> {
        (**self).set_pa_level(level)
    }

    fn open_reading_pipe(&mut self, pipe: u8, address: &PipeAddress) -> Result<(), RadioError> {
        (**self).open_reading_pipe(pipe, address)
    }

    fn start_listening(&mut self) -> Result<(), RadioError> {
        (**self).start_listening()
    }

    fn available(&mut self) -> Result<bool, RadioError> {
        (**self).available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
        (**self).read(buf)
    }

    fn power_down(&mut self) -> Result<(), RadioError> {
        (**self).power_down()
    }
}
