use std::io::{self, Read, Write};
use std::time::Duration;

use bytes::BytesMut;
use serialport::SerialPort;

use crate::core::{Error, Result, MAX_MESSAGE_LEN};
use super::Channel;

/// Blocking serial-port channel
///
/// WALT-style measurement devices enumerate as CDC-ACM serial; this wraps one
/// behind the [`Channel`] contract. Each receive adjusts the port timeout, so
/// a shared default timeout on the port itself is not required.
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Opens a serial device at the given baud rate
    pub fn open(device_path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(device_path, baud_rate)
            .timeout(Duration::from_millis(20))
            .open()
            .map_err(|e| Error::transport(format!("Failed to open {}: {}", device_path, e)))?;
        Ok(SerialChannel { port })
    }

    /// Wraps an already configured port
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        SerialChannel { port }
    }
}

impl Channel for SerialChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        Ok(())
    }

    fn send_nowait(&mut self, byte: u8) -> Result<()> {
        // Single-byte writes complete within the kernel buffer; no drain wait.
        self.port.write_all(&[byte])?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut BytesMut, timeout: Duration) -> Result<bool> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| Error::transport(format!("Failed to set timeout: {}", e)))?;

        let mut chunk = [0u8; MAX_MESSAGE_LEN];
        buf.clear();
        match self.port.read(&mut chunk) {
            Ok(0) => Ok(false),
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
