use crate::packet::RawPacket;
use crate::pipe_address::PipeAddress;
use crate::radio::{PaLevel, Radio, RadioError};
use crate::transport::{Transport, TransportError};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// `count` distinct pipe addresses: `0Node`, `1Node`, ...
pub fn addresses(count: usize) -> Vec<PipeAddress> {
    (0..count)
        .map(|i| format!("{i}Node").parse().unwrap())
        .collect()
}

/// In-memory radio that replays queued payloads.
#[derive(Debug)]
pub struct FakeRadio {
    pub packets: VecDeque<Vec<u8>>,
    pub chip_connected: bool,
    pub payload_size: usize,
    pub pa_level: Option<PaLevel>,
    pub pipes: Vec<(u8, PipeAddress)>,
    pub listening: bool,
    pub fail_power_down: bool,
    pub power_downs: Arc<AtomicUsize>,
}

impl Default for FakeRadio {
    fn default() -> Self {
        Self {
            packets: VecDeque::new(),
            chip_connected: true,
            payload_size: 32,
            pa_level: None,
            pipes: Vec::new(),
            listening: false,
            fail_power_down: false,
            power_downs: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FakeRadio {
    pub fn with_packets(packets: impl IntoIterator<Item = RawPacket>) -> Self {
        let mut radio = Self::default();
        for packet in packets {
            radio.push_packet(packet);
        }
        radio
    }

    pub fn push_packet(&mut self, packet: RawPacket) {
        self.push_bytes(packet.to_bytes().to_vec());
    }

    pub fn push_bytes(&mut self, bytes: Vec<u8>) {
        self.packets.push_back(bytes);
    }
}

impl Radio for FakeRadio {
    fn begin(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    fn is_chip_connected(&mut self) -> Result<bool, RadioError> {
        Ok(self.chip_connected)
    }

    fn payload_size(&self) -> usize {
        self.payload_size
    }

    fn set_pa_level(&mut self, level: PaLevel) -> Result<(), RadioError> {
        self.pa_level = Some(level);
        Ok(())
    }

    fn open_reading_pipe(&mut self, pipe: u8, address: &PipeAddress) -> Result<(), RadioError> {
        self.pipes.push((pipe, *address));
        Ok(())
    }

    fn start_listening(&mut self) -> Result<(), RadioError> {
        self.listening = true;
        Ok(())
    }

    fn available(&mut self) -> Result<bool, RadioError> {
        Ok(!self.packets.is_empty())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
        let n = buf.len().min(self.payload_size);
        let payload = self.packets.pop_front().unwrap_or_default();
        let copied = payload.len().min(n);
        buf[..copied].copy_from_slice(&payload[..copied]);
        Ok(n)
    }

    fn power_down(&mut self) -> Result<(), RadioError> {
        self.power_downs.fetch_add(1, Ordering::SeqCst);
        self.listening = false;
        if self.fail_power_down {
            return Err(RadioError::Transfer(io::Error::other("bus gone")));
        }
        Ok(())
    }
}

/// Transport that records every payload, optionally refusing all of them.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    pub sent: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl FakeTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Closed);
        }
        self.sent
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    }

    fn endpoint(&self) -> String {
        "fake".to_string()
    }
}
