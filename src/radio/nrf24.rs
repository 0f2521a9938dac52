//! Register-level nRF24L01(+) driver for receive-only operation.
//!
//! The chip is configured the way sensor nodes expect it: channel 76,
//! 1 Mbps, 16-bit CRC, auto-acknowledge on every pipe, 5-byte addresses and
//! static 32-byte payloads.

use super::{PaLevel, Radio, RadioError};
use crate::pipe_address::{ADDRESS_WIDTH, PipeAddress};
use std::thread;
use std::time::Duration;

// Commands
const R_REGISTER: u8 = 0x00;
const W_REGISTER: u8 = 0x20;
const REGISTER_MASK: u8 = 0x1F;
const R_RX_PAYLOAD: u8 = 0x61;
const FLUSH_TX: u8 = 0xE1;
const FLUSH_RX: u8 = 0xE2;
const NOP: u8 = 0xFF;

// Registers
const CONFIG: u8 = 0x00;
const EN_AA: u8 = 0x01;
const EN_RXADDR: u8 = 0x02;
const SETUP_AW: u8 = 0x03;
const SETUP_RETR: u8 = 0x04;
const RF_CH: u8 = 0x05;
const RF_SETUP: u8 = 0x06;
const STATUS: u8 = 0x07;
const RX_ADDR_P0: u8 = 0x0A;
const RX_PW_P0: u8 = 0x11;
const FIFO_STATUS: u8 = 0x17;
const DYNPD: u8 = 0x1C;
const FEATURE: u8 = 0x1D;

// CONFIG bits
const PRIM_RX: u8 = 1 << 0;
const PWR_UP: u8 = 1 << 1;
const CRCO: u8 = 1 << 2;
const EN_CRC: u8 = 1 << 3;

// STATUS bits
const MAX_RT: u8 = 1 << 4;
const TX_DS: u8 = 1 << 5;
const RX_DR: u8 = 1 << 6;

// FIFO_STATUS bits
const RX_EMPTY: u8 = 1 << 0;

// RF_SETUP bits
const RF_DR_HIGH: u8 = 1 << 3;
const RF_DR_LOW: u8 = 1 << 5;
const LNA_HCURR: u8 = 1 << 0;

/// SETUP_AW encoding of a 5-byte address width.
const SETUP_AW_5_BYTES: u8 = (ADDRESS_WIDTH - 2) as u8;

/// Largest static payload the chip supports.
pub const MAX_PAYLOAD_SIZE: usize = 32;

/// Default RF channel (2476 MHz).
pub const DEFAULT_CHANNEL: u8 = 76;

/// Power-on settling time required by the datasheet (Tpd2stby ~ 1.5 ms, plus margin).
const POWER_UP_DELAY: Duration = Duration::from_millis(5);

/// SPI bus with a chip-enable line.
pub trait Bus {
    /// Full-duplex transfer. `buf` is sent and overwritten with the bytes
    /// clocked in, with chip select held for the whole buffer.
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), RadioError>;

    /// Drive the CE line.
    fn set_ce(&mut self, high: bool) -> Result<(), RadioError>;
}

/// nRF24L01 driver over an arbitrary [`Bus`].
#[derive(Debug)]
pub struct Nrf24<B: Bus> {
    bus: B,
    channel: u8,
    payload_size: u8,
}

impl<B: Bus> Nrf24<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            channel: DEFAULT_CHANNEL,
            payload_size: MAX_PAYLOAD_SIZE as u8,
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel & 0x7F;
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, RadioError> {
        let mut buf = [R_REGISTER | (reg & REGISTER_MASK), NOP];
        self.bus.transfer(&mut buf)?;
        Ok(buf[1])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), RadioError> {
        self.write_register_bytes(reg, &[value])
    }

    fn write_register_bytes(&mut self, reg: u8, bytes: &[u8]) -> Result<(), RadioError> {
        let mut buf = Vec::with_capacity(1 + bytes.len());
        buf.push(W_REGISTER | (reg & REGISTER_MASK));
        buf.extend_from_slice(bytes);
        self.bus.transfer(&mut buf)
    }

    fn update_register(&mut self, reg: u8, f: impl FnOnce(u8) -> u8) -> Result<(), RadioError> {
        let value = self.read_register(reg)?;
        self.write_register(reg, f(value))
    }

    fn command(&mut self, cmd: u8) -> Result<u8, RadioError> {
        let mut buf = [cmd];
        self.bus.transfer(&mut buf)?;
        Ok(buf[0])
    }
}

impl<B: Bus> Radio for Nrf24<B> {
    fn begin(&mut self) -> Result<(), RadioError> {
        self.bus.set_ce(false)?;
        thread::sleep(POWER_UP_DELAY);

        // 1500 us retransmit delay, 15 retries
        self.write_register(SETUP_RETR, (5 << 4) | 15)?;
        self.update_register(RF_SETUP, |v| v & !(RF_DR_LOW | RF_DR_HIGH))?;
        self.write_register(FEATURE, 0)?;
        self.write_register(DYNPD, 0)?;
        self.write_register(EN_AA, 0x3F)?;
        self.write_register(EN_RXADDR, 0)?;
        self.write_register(SETUP_AW, SETUP_AW_5_BYTES)?;
        self.write_register(RF_CH, self.channel)?;
        self.write_register(STATUS, RX_DR | TX_DS | MAX_RT)?;
        self.command(FLUSH_RX)?;
        self.command(FLUSH_TX)?;

        self.write_register(CONFIG, EN_CRC | CRCO | PWR_UP)?;
        thread::sleep(POWER_UP_DELAY);
        Ok(())
    }

    fn is_chip_connected(&mut self) -> Result<bool, RadioError> {
        // A missing chip reads back as all zeros or all ones.
        Ok(self.read_register(SETUP_AW)? == SETUP_AW_5_BYTES)
    }

    fn payload_size(&self) -> usize {
        usize::from(self.payload_size)
    }

    fn set_pa_level(&mut self, level: PaLevel) -> Result<(), RadioError> {
        self.update_register(RF_SETUP, |v| (v & 0xF8) | (level.bits() << 1) | LNA_HCURR)
    }

    fn open_reading_pipe(&mut self, pipe: u8, address: &PipeAddress) -> Result<(), RadioError> {
        if pipe > 5 {
            return Err(RadioError::InvalidPipe(pipe));
        }

        // Pipes 2-5 only hold the least significant byte and share the rest with pipe 1.
        let bytes = address.as_bytes();
        if pipe < 2 {
            self.write_register_bytes(RX_ADDR_P0 + pipe, bytes)?;
        } else {
            self.write_register(RX_ADDR_P0 + pipe, bytes[0])?;
        }
        self.write_register(RX_PW_P0 + pipe, self.payload_size)?;
        self.update_register(EN_RXADDR, |v| v | (1 << pipe))
    }

    fn start_listening(&mut self) -> Result<(), RadioError> {
        self.update_register(CONFIG, |v| v | PWR_UP | PRIM_RX)?;
        self.write_register(STATUS, RX_DR | TX_DS | MAX_RT)?;
        self.bus.set_ce(true)
    }

    fn available(&mut self) -> Result<bool, RadioError> {
        Ok(self.read_register(FIFO_STATUS)? & RX_EMPTY == 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
        let size = self.payload_size();
        let mut frame = vec![NOP; 1 + size];
        frame[0] = R_RX_PAYLOAD;
        self.bus.transfer(&mut frame)?;

        let n = buf.len().min(size);
        buf[..n].copy_from_slice(&frame[1..=n]);

        self.write_register(STATUS, RX_DR)?;
        Ok(n)
    }

    fn power_down(&mut self) -> Result<(), RadioError> {
        self.bus.set_ce(false)?;
        self.update_register(CONFIG, |v| v & !PWR_UP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    /// Register file that answers SPI frames like a real chip.
    #[derive(Debug, Default)]
    struct FakeBus {
        registers: [u8; 0x20],
        addresses: HashMap<u8, Vec<u8>>,
        rx_fifo: VecDeque<Vec<u8>>,
        ce: bool,
        absent: bool,
        flushes: Vec<u8>,
    }

    impl FakeBus {
        fn register(&self, reg: u8) -> u8 {
            self.registers[usize::from(reg)]
        }
    }

    impl Bus for FakeBus {
        fn transfer(&mut self, buf: &mut [u8]) -> Result<(), RadioError> {
            if self.absent {
                buf.fill(0);
                return Ok(());
            }

            let cmd = buf[0];
            buf[0] = self.registers[usize::from(STATUS)];
            match cmd {
                c if c < W_REGISTER => {
                    let reg = c & REGISTER_MASK;
                    if reg == FIFO_STATUS {
                        buf[1] = if self.rx_fifo.is_empty() { RX_EMPTY } else { 0 };
                    } else if let Some(addr) = self.addresses.get(&reg) {
                        let n = (buf.len() - 1).min(addr.len());
                        buf[1..=n].copy_from_slice(&addr[..n]);
                    } else {
                        buf[1] = self.registers[usize::from(reg)];
                    }
                }
                c if c < R_RX_PAYLOAD => {
                    let reg = c & REGISTER_MASK;
                    if buf.len() > 2 {
                        self.addresses.insert(reg, buf[1..].to_vec());
                    } else if reg == STATUS {
                        self.registers[usize::from(STATUS)] &= !buf[1];
                    } else {
                        self.registers[usize::from(reg)] = buf[1];
                    }
                }
                R_RX_PAYLOAD => {
                    let payload = self.rx_fifo.pop_front().unwrap_or_default();
                    for (i, byte) in buf[1..].iter_mut().enumerate() {
                        *byte = payload.get(i).copied().unwrap_or(0);
                    }
                }
                FLUSH_RX | FLUSH_TX => self.flushes.push(cmd),
                _ => {}
            }
            Ok(())
        }

        fn set_ce(&mut self, high: bool) -> Result<(), RadioError> {
            self.ce = high;
            Ok(())
        }
    }

    fn started_radio() -> Nrf24<FakeBus> {
        let mut radio = Nrf24::new(FakeBus::default());
        radio.begin().unwrap();
        radio
    }

    #[test]
    fn test_begin_configures_chip() {
        let radio = started_radio();
        let bus = radio.bus();
        assert_eq!(bus.register(CONFIG), EN_CRC | CRCO | PWR_UP);
        assert_eq!(bus.register(RF_CH), DEFAULT_CHANNEL);
        assert_eq!(bus.register(SETUP_AW), 0b11);
        assert_eq!(bus.register(EN_AA), 0x3F);
        assert_eq!(bus.register(EN_RXADDR), 0);
        assert_eq!(bus.flushes, vec![FLUSH_RX, FLUSH_TX]);
        assert!(!bus.ce);
    }

    #[test]
    fn test_chip_connected() {
        let mut radio = started_radio();
        assert!(radio.is_chip_connected().unwrap());

        let mut missing = Nrf24::new(FakeBus {
            absent: true,
            ..Default::default()
        });
        missing.begin().unwrap();
        assert!(!missing.is_chip_connected().unwrap());
    }

    #[test]
    fn test_set_pa_level_low() {
        let mut radio = started_radio();
        radio.set_pa_level(PaLevel::Low).unwrap();
        assert_eq!(radio.bus().register(RF_SETUP) & 0x07, 0b011);

        radio.set_pa_level(PaLevel::Max).unwrap();
        assert_eq!(radio.bus().register(RF_SETUP) & 0x07, 0b111);
    }

    #[test]
    fn test_open_reading_pipes() {
        let mut radio = started_radio();
        radio
            .open_reading_pipe(1, &"1Node".parse().unwrap())
            .unwrap();
        radio
            .open_reading_pipe(2, &"2Node".parse().unwrap())
            .unwrap();

        let bus = radio.bus();
        assert_eq!(bus.addresses[&(RX_ADDR_P0 + 1)], b"1Node".to_vec());
        assert_eq!(bus.register(RX_ADDR_P0 + 2), b'2');
        assert_eq!(bus.register(RX_PW_P0 + 1), 32);
        assert_eq!(bus.register(RX_PW_P0 + 2), 32);
        assert_eq!(bus.register(EN_RXADDR), 0b110);
    }

    #[test]
    fn test_open_reading_pipe_out_of_range() {
        let mut radio = started_radio();
        let err = radio
            .open_reading_pipe(6, &"6Node".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, RadioError::InvalidPipe(6)));
    }

    #[test]
    fn test_listen_and_read() {
        let mut radio = started_radio();
        radio.start_listening().unwrap();
        assert!(radio.bus().ce);
        assert_eq!(radio.bus().register(CONFIG) & PRIM_RX, PRIM_RX);
        assert!(!radio.available().unwrap());

        radio.bus.rx_fifo.push_back(vec![3, 0x00, 21, 50]);
        assert!(radio.available().unwrap());

        let mut buf = [0u8; 64];
        let n = radio.read(&mut buf).unwrap();
        assert_eq!(n, 32);
        assert_eq!(&buf[..4], &[3, 0x00, 21, 50]);
        assert!(buf[4..].iter().all(|&b| b == 0));
        assert!(!radio.available().unwrap());
    }

    #[test]
    fn test_read_into_short_buffer() {
        let mut radio = started_radio();
        radio.bus.rx_fifo.push_back(vec![1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        assert_eq!(radio.read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert!(radio.bus().rx_fifo.is_empty());
    }

    #[test]
    fn test_power_down() {
        let mut radio = started_radio();
        radio.start_listening().unwrap();
        radio.power_down().unwrap();
        assert!(!radio.bus().ce);
        assert_eq!(radio.bus().register(CONFIG) & PWR_UP, 0);
    }
}
