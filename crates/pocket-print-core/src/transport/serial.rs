//! Printer link over a serial port.
//!
//! USB CDC adapters show up as `/dev/ttyACM*` or `/dev/ttyUSB*`, Bluetooth
//! SPP links as `/dev/rfcomm*`; both are plain serial ports here.

use tokio::io::AsyncReadExt;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialPortType, SerialStream, StopBits};
use tracing::{debug, info};

use crate::session::TransportHandle;
use crate::{Error, Result};

/// Link baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Bytes requested per read.
const READ_BUFFER_SIZE: usize = 4096;

/// Serial link feeding a session controller.
pub struct SerialTransport {
    port_path: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// Creates a transport for the given port.
    pub fn new(port_path: &str, baud_rate: u32) -> Self {
        Self {
            port_path: port_path.to_string(),
            baud_rate,
        }
    }

    /// Opens the serial port (8N1).
    pub fn open(&self) -> Result<SerialStream> {
        let port = tokio_serial::new(&self.port_path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|e| {
                // Check if the error is due to device not existing
                if let tokio_serial::ErrorKind::Io(kind) = &e.kind {
                    if *kind == std::io::ErrorKind::NotFound
                        || *kind == std::io::ErrorKind::PermissionDenied
                    {
                        if !std::path::Path::new(&self.port_path).exists() {
                            return Error::PortNotFound(self.port_path.clone());
                        }
                    }
                }
                Error::Serial(e)
            })?;

        info!("Serial port opened: {} @ {} baud", self.port_path, self.baud_rate);
        Ok(port)
    }

    /// Opens the port and forwards every chunk read to `handle` until the
    /// link closes, then reports the disconnect.
    pub async fn pump(&self, handle: &TransportHandle) -> Result<()> {
        let mut port = self.open()?;
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        let result = loop {
            match port.read(&mut buffer).await {
                Ok(0) => {
                    debug!("Serial port {} closed", self.port_path);
                    break Ok(());
                }
                Ok(n) => {
                    debug!("Read {} bytes from {}", n, self.port_path);
                    if !handle.deliver(buffer[..n].to_vec()) {
                        break Ok(());
                    }
                }
                Err(e) => break Err(Error::Io(e)),
            }
        };

        handle.disconnect();
        result
    }

    /// Returns the port path.
    pub fn port_path(&self) -> &str {
        &self.port_path
    }

    /// Returns the baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

/// An available serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// Lists serial ports present on the system.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| PortInfo {
            description: describe(&port.port_type),
            name: port.port_name,
        })
        .collect())
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            format!("{} ({:04X}:{:04X})", product, usb.vid, usb.pid)
        }
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe(&SerialPortType::BluetoothPort), "Bluetooth");
        assert_eq!(describe(&SerialPortType::Unknown), "unknown");
    }

    #[test]
    fn test_missing_port() {
        let transport = SerialTransport::new("/dev/pocket-print-missing", DEFAULT_BAUD_RATE);
        assert_eq!(transport.baud_rate(), 115_200);
        assert!(transport.open().is_err());
    }
}
