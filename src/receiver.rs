//! Radio receiver lifecycle.
//!
//! A [`Receiver`] owns the radio from construction until drop. It is created
//! with the list of addresses to listen on, brought up with
//! [`Receiver::init`], and then polled with [`Receiver::message_available`]
//! and [`Receiver::receive_message`]. Dropping it powers the radio down.

use crate::message::RadioMessage;
use crate::packet::decode_bytes;
use crate::pipe_address::PipeAddress;
use crate::radio::{MAX_READING_PIPES, PaLevel, Radio, RadioError};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error};

/// Size of the buffer radio payloads are read into.
pub const RECEIVE_BUFFER_SIZE: usize = 64;

/// Errors raised while configuring or polling the receiver.
#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("cannot listen on {0} addresses (expected 1 to 5)")]
    AddressCount(usize),
    #[error("radio chip is not responding")]
    ChipNotResponding,
    #[error("radio payload size {payload_size} is greater than the 64-byte buffer")]
    PayloadTooLarge { payload_size: usize },
    #[error("receiver is not listening")]
    NotListening,
    #[error(transparent)]
    Radio(#[from] RadioError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Uninitialized,
    Listening,
}

/// Check that a receiver can listen on `addresses`, one pipe each.
///
/// # Errors
/// Returns [`ReceiverError::AddressCount`] unless there are 1 to 5 addresses.
pub fn check_addresses(addresses: &[PipeAddress]) -> Result<(), ReceiverError> {
    if addresses.is_empty() || addresses.len() > MAX_READING_PIPES {
        return Err(ReceiverError::AddressCount(addresses.len()));
    }
    Ok(())
}

/// Receives and decodes sensor packets from a [`Radio`].
#[derive(Debug)]
pub struct Receiver<R: Radio> {
    radio: R,
    addresses: Vec<PipeAddress>,
    state: ReceiverState,
    buffer: [u8; RECEIVE_BUFFER_SIZE],
}

impl<R: Radio> Receiver<R> {
    /// Take ownership of `radio` to listen on `addresses`.
    ///
    /// # Errors
    /// Returns [`ReceiverError::AddressCount`] unless there are 1 to 5 addresses.
    pub fn new(addresses: Vec<PipeAddress>, radio: R) -> Result<Self, ReceiverError> {
        check_addresses(&addresses)?;

        Ok(Self {
            radio,
            addresses,
            state: ReceiverState::Uninitialized,
            buffer: [0; RECEIVE_BUFFER_SIZE],
        })
    }

    pub fn addresses(&self) -> &[PipeAddress] {
        &self.addresses
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Bring the radio up and start listening on pipes 1 to n.
    ///
    /// # Errors
    /// Fails if the chip does not answer, if its payload does not fit the
    /// receive buffer, or on any bus error. None of these are recoverable.
    pub fn init(&mut self) -> Result<(), ReceiverError> {
        if self.state == ReceiverState::Listening {
            return Ok(());
        }

        self.radio.begin()?;

        if !self.radio.is_chip_connected()? {
            return Err(ReceiverError::ChipNotResponding);
        }

        let payload_size = self.radio.payload_size();
        if payload_size > RECEIVE_BUFFER_SIZE {
            return Err(ReceiverError::PayloadTooLarge { payload_size });
        }

        self.radio.set_pa_level(PaLevel::Low)?;

        for (pipe, address) in (1u8..).zip(&self.addresses) {
            self.radio.open_reading_pipe(pipe, address)?;
        }

        self.radio.start_listening()?;
        self.state = ReceiverState::Listening;
        debug!(addresses = self.addresses.len(), "Radio listening");
        Ok(())
    }

    fn ensure_listening(&self) -> Result<(), ReceiverError> {
        match self.state {
            ReceiverState::Listening => Ok(()),
            ReceiverState::Uninitialized => Err(ReceiverError::NotListening),
        }
    }

    /// Non-blocking check for a pending packet.
    pub fn message_available(&mut self) -> Result<bool, ReceiverError> {
        self.ensure_listening()?;
        Ok(self.radio.available()?)
    }

    /// Read and decode the next packet.
    ///
    /// Call only after [`Self::message_available`] returned `true`. Without a
    /// pending packet the radio returns whatever its FIFO yields, which decodes
    /// to a meaningless message.
    pub fn receive_message(&mut self) -> Result<RadioMessage, ReceiverError> {
        self.ensure_listening()?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());

        self.buffer.fill(0);
        let n = self.radio.read(&mut self.buffer)?;

        Ok(decode_bytes(&self.buffer[..n], timestamp))
    }
}

impl<R: Radio> Drop for Receiver<R> {
    fn drop(&mut self) {
        if let Err(e) = self.radio.power_down() {
            error!(error = %e, "Unable to power down the radio");
        }
    }
}
