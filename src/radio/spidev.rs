//! Linux SPI bus for the nRF24L01.
//!
//! Talks to the chip through the `spidev` character device using the
//! `SPI_IOC_MESSAGE` ioctl, and drives CE through the sysfs GPIO interface.
//! Needs read/write access to `/dev/spidevB.C` and `/sys/class/gpio`
//! (membership of the `spi` and `gpio` groups on Raspberry Pi OS, or root).

use super::RadioError;
use super::nrf24::{Bus, Nrf24};
use libc::c_void;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

// spidev ioctl requests: _IOW('k', nr, size)
const SPI_IOC_WR_MODE: u32 = 0x4001_6B01;
const SPI_IOC_WR_BITS_PER_WORD: u32 = 0x4001_6B03;
const SPI_IOC_WR_MAX_SPEED_HZ: u32 = 0x4004_6B04;
const SPI_IOC_MESSAGE_1: u32 = 0x4020_6B00;

const SPI_MODE_0: u8 = 0;
const BITS_PER_WORD: u8 = 8;

/// SPI clock. The nRF24L01 accepts up to 10 MHz.
pub const DEFAULT_SPI_SPEED_HZ: u32 = 10_000_000;

/// SPI bus number the radio hangs off on a Raspberry Pi header.
const SPI_BUS: u8 = 0;

const GPIO_ROOT: &str = "/sys/class/gpio";

/// udev may need a moment to fix permissions on a freshly exported line.
const GPIO_EXPORT_RETRIES: u32 = 20;
const GPIO_EXPORT_DELAY: Duration = Duration::from_millis(10);

/// `struct spi_ioc_transfer` from `linux/spi/spidev.h`
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)] // read by the kernel
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

/// Path of the spidev node for a chip select line on bus 0.
pub fn spidev_path(chip_select: u8) -> PathBuf {
    PathBuf::from(format!("/dev/spidev{SPI_BUS}.{chip_select}"))
}

/// An output line exported through sysfs, unexported again on drop.
#[derive(Debug)]
struct SysfsPin {
    pin: u32,
    value: File,
    exported_here: bool,
}

impl SysfsPin {
    fn output(pin: u32) -> Result<Self, RadioError> {
        let gpio_err = |source: io::Error| RadioError::Gpio { pin, source };
        let dir = Path::new(GPIO_ROOT).join(format!("gpio{pin}"));

        let exported_here = !dir.exists();
        if exported_here {
            write_sysfs(&Path::new(GPIO_ROOT).join("export"), &pin.to_string())
                .map_err(gpio_err)?;
        }

        let mut attempts = 0;
        loop {
            match write_sysfs(&dir.join("direction"), "out") {
                Ok(()) => break,
                Err(e) if attempts < GPIO_EXPORT_RETRIES => {
                    debug!(pin, error = %e, "GPIO not ready yet");
                    attempts += 1;
                    thread::sleep(GPIO_EXPORT_DELAY);
                }
                Err(e) => return Err(gpio_err(e)),
            }
        }

        let value = OpenOptions::new()
            .write(true)
            .open(dir.join("value"))
            .map_err(gpio_err)?;

        Ok(Self {
            pin,
            value,
            exported_here,
        })
    }

    fn set(&mut self, high: bool) -> Result<(), RadioError> {
        let level: &[u8] = if high { b"1" } else { b"0" };
        self.value
            .write_all_at(level, 0)
            .map_err(|source| RadioError::Gpio {
                pin: self.pin,
                source,
            })
    }
}

impl Drop for SysfsPin {
    fn drop(&mut self) {
        if self.exported_here
            && let Err(e) = write_sysfs(&Path::new(GPIO_ROOT).join("unexport"), &self.pin.to_string())
        {
            debug!(pin = self.pin, error = %e, "Failed to unexport GPIO");
        }
    }
}

fn write_sysfs(path: &Path, contents: &str) -> io::Result<()> {
    OpenOptions::new()
        .write(true)
        .open(path)?
        .write_all(contents.as_bytes())
}

fn ioctl_write<T>(spi: &File, request: u32, value: &T) -> io::Result<()> {
    let ret = unsafe {
        libc::ioctl(
            spi.as_raw_fd(),
            request as _,
            value as *const T as *const c_void,
        )
    };

    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// spidev device plus CE line.
#[derive(Debug)]
pub struct SpidevBus {
    spi: File,
    ce: SysfsPin,
    speed_hz: u32,
}

impl SpidevBus {
    /// Open `/dev/spidev0.<chip_select>` and export `ce_pin` as an output.
    pub fn open(chip_select: u8, ce_pin: u32) -> Result<Self, RadioError> {
        let path = spidev_path(chip_select);
        let device_err = |source: io::Error| RadioError::SpiDevice {
            path: path.display().to_string(),
            source,
        };

        let spi = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(device_err)?;

        ioctl_write(&spi, SPI_IOC_WR_MODE, &SPI_MODE_0).map_err(device_err)?;
        ioctl_write(&spi, SPI_IOC_WR_BITS_PER_WORD, &BITS_PER_WORD).map_err(device_err)?;
        ioctl_write(&spi, SPI_IOC_WR_MAX_SPEED_HZ, &DEFAULT_SPI_SPEED_HZ).map_err(device_err)?;

        let ce = SysfsPin::output(ce_pin)?;

        Ok(Self {
            spi,
            ce,
            speed_hz: DEFAULT_SPI_SPEED_HZ,
        })
    }
}

impl Bus for SpidevBus {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), RadioError> {
        let tx = buf.to_vec();
        let xfer = SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            rx_buf: buf.as_mut_ptr() as u64,
            len: buf.len() as u32,
            speed_hz: self.speed_hz,
            bits_per_word: BITS_PER_WORD,
            ..Default::default()
        };

        ioctl_write(&self.spi, SPI_IOC_MESSAGE_1, &xfer).map_err(RadioError::Transfer)
    }

    fn set_ce(&mut self, high: bool) -> Result<(), RadioError> {
        self.ce.set(high)
    }
}

/// Open an nRF24L01 on SPI bus 0 with the given chip select and CE GPIO.
pub fn open(chip_select: u8, ce_pin: u32) -> Result<Nrf24<SpidevBus>, RadioError> {
    Ok(Nrf24::new(SpidevBus::open(chip_select, ce_pin)?))
}
