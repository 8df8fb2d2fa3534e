//! gripper-serial: serial control and telemetry for the bench gripper
//!
//! Two devices sit on USB-serial adapters: the actuator, driven with fixed
//! 7-byte binary commands, and the jaw angle sensor, which streams JSON-like
//! records. A [`DeviceSession`] owns one connection to either. The default
//! build enables both the `serialport` backend and an in-process `mock`
//! backend so tools and tests run without hardware.

mod types;
pub use types::{
    angle_in_band, now_seconds, Freshness, Opcode, PortInfo, SerialEndpoint, TelemetryReading,
    ANGLE_BAND, DEFAULT_BAUD_RATE, STALE_AFTER,
};

mod error;
pub use error::{DecodeError, GripperError, Result};

mod traits;
pub use traits::{is_closed_error, SerialLink};

mod config;
pub use config::SessionConfig;

pub mod encode;
pub use encode::{clamp_position, encode_command, CommandFrame};

pub mod frame;
pub use frame::{find_next_object, InboundBuffer};

pub mod decode;
pub use decode::{decode_record, Sample};

mod reader;
pub use reader::SampleCallback;

mod session;
pub use session::DeviceSession;

mod ports;
pub use ports::{list_ports_with, USB_SERIAL_FILTER};

#[cfg(feature = "serial")]
pub use ports::list_ports;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockDevice, MockLink};

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialPortLink;

/// Session over a real serial port.
#[cfg(feature = "serial")]
pub type SerialSession = DeviceSession<SerialPortLink>;

/// Session over the in-process mock backend.
#[cfg(feature = "mock")]
pub type MockSession = DeviceSession<MockLink>;
