//! Byte transport underneath the protocol driver.

use log::info;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use crate::constants::{BREAK_DURATION, READ_TIMEOUT};
use crate::error::{DvlError, Result};
use crate::types::SerialUri;

/// Blocking, timeout-bounded byte link to the device
pub trait Transport {
    /// Write all of `bytes`, failing with [`DvlError::Timeout`] if the link
    /// does not accept them within `timeout`
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize>;

    /// Read whatever is available into `buffer`, waiting at most `timeout`
    /// for the first byte. Returns [`DvlError::Timeout`] if nothing arrived.
    fn read_available(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Hold the line in break condition long enough for the device to notice
    fn send_break(&mut self) -> Result<()>;

    /// Discard anything received but not yet read
    fn clear_input(&mut self) -> Result<()>;

    /// Current local line speed in bits per second
    fn baud_rate(&self) -> Result<u32>;

    /// Change the local line speed, e.g. after the device accepted a `CB` command
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;
}

fn map_timeout(error: std::io::Error) -> DvlError {
    match error.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => DvlError::Timeout,
        _ => DvlError::Io(error),
    }
}

/// [`Transport`] over a local serial port
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;
        info!("Opened {} at {} baud", path, baud_rate);
        Ok(SerialTransport { port })
    }

    pub fn open_uri(uri: &str) -> Result<Self> {
        let uri = SerialUri::parse(uri)?;
        Self::open(&uri.path, uri.baud_rate)
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize> {
        self.port.set_timeout(timeout)?;
        self.port.write_all(bytes).map_err(map_timeout)?;
        self.port.flush().map_err(map_timeout)?;
        Ok(bytes.len())
    }

    fn read_available(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize> {
        self.port.set_timeout(timeout)?;
        match self.port.read(buffer) {
            Ok(0) => Err(DvlError::Timeout),
            Ok(n) => Ok(n),
            Err(e) => Err(map_timeout(e)),
        }
    }

    fn send_break(&mut self) -> Result<()> {
        self.port.set_break()?;
        thread::sleep(BREAK_DURATION);
        self.port.clear_break()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }

    fn baud_rate(&self) -> Result<u32> {
        Ok(self.port.baud_rate()?)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.port.set_baud_rate(baud_rate)?;
        info!("Serial link now at {} baud", baud_rate);
        Ok(())
    }
}
