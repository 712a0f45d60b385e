//! Serial transport implementation

use super::Transport;
use crate::error::Result;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Rewrite a Windows COM port name to its long form where required.
///
/// `COMn` with n >= 8, and any COM name longer than 4 characters, is only
/// openable as `\\.\COMn`. Other names (including Unix device paths) pass
/// through unchanged.
pub fn canonical_port_name(name: &str) -> String {
    let bytes = name.as_bytes();
    if name.starts_with("COM") && name.len() >= 4 && (bytes[3] >= b'8' || name.len() > 4) {
        format!(r"\\.\{}", name)
    } else {
        name.to_string()
    }
}

/// Serial transport for UART communication
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port.
    ///
    /// Line configuration is fixed at 8-N-1 with no flow control, RTS and
    /// DTR asserted. Both FIFO directions are purged after configuration so
    /// stale bytes from a previous session never reach the framer.
    ///
    /// # Arguments
    /// * `name` - Serial port name (e.g. "COM3", "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate (e.g. 921600)
    pub fn open(name: &str, baud_rate: u32) -> Result<Self> {
        let path = canonical_port_name(name);

        let mut port = serialport::new(&path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(20))
            .open()?;

        port.write_request_to_send(true)?;
        port.write_data_terminal_ready(true)?;
        port.clear(ClearBuffer::All)?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_com_names_unchanged() {
        assert_eq!(canonical_port_name("COM3"), "COM3");
        assert_eq!(canonical_port_name("COM7"), "COM7");
    }

    #[test]
    fn test_high_com_numbers_rewritten() {
        assert_eq!(canonical_port_name("COM8"), r"\\.\COM8");
        assert_eq!(canonical_port_name("COM9"), r"\\.\COM9");
        assert_eq!(canonical_port_name("COM10"), r"\\.\COM10");
        assert_eq!(canonical_port_name("COM115"), r"\\.\COM115");
    }

    #[test]
    fn test_non_com_names_unchanged() {
        assert_eq!(canonical_port_name("/dev/ttyUSB0"), "/dev/ttyUSB0");
        assert_eq!(canonical_port_name("COM"), "COM");
    }
}
