use crate::{GripperError, PortInfo, Result, SerialEndpoint, SerialLink};
use serialport::{SerialPort, SerialPortType};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Serial device opened through the `serialport` crate.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink for SerialPortLink {
    fn open(endpoint: &SerialEndpoint, read_timeout: Duration) -> Result<Self> {
        let port = serialport::new(endpoint.path.as_str(), endpoint.baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => {
                    GripperError::PortNotFound(endpoint.path.clone())
                }
                _ => GripperError::Connect {
                    path: endpoint.path.clone(),
                    reason: e.to_string(),
                },
            })?;
        Ok(Self { port })
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| GripperError::Io(e.to_string()))? {
            let driver = match p.port_type {
                SerialPortType::UsbPort(_) => "usb-serial",
                SerialPortType::PciPort => "pci",
                SerialPortType::BluetoothPort => "bluetooth",
                SerialPortType::Unknown => "serial",
            };
            out.push(PortInfo {
                name: p.port_name,
                driver: driver.to_string(),
            });
        }
        Ok(out)
    }

    fn try_clone_link(&self) -> Result<Self> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| GripperError::Io(e.to_string()))?;
        Ok(Self { port })
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let n = self.port.bytes_to_read().map_err(io::Error::from)?;
        Ok(n as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.port.write(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}
