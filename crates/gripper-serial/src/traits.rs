use crate::{PortInfo, Result, SerialEndpoint};
use std::io;
use std::time::Duration;

/// A minimal byte-level serial channel.
///
/// One handle is used for writes on the caller's thread and a clone of it is
/// handed to the reader thread, so both directions run independently.
pub trait SerialLink: Send + 'static {
    /// Open the device named by `endpoint`; reads block for at most `read_timeout`.
    fn open(endpoint: &SerialEndpoint, read_timeout: Duration) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list devices visible to this backend.
    fn list() -> Result<Vec<PortInfo>>
    where
        Self: Sized;

    /// Second handle onto the same open device.
    fn try_clone_link(&self) -> Result<Self>
    where
        Self: Sized;

    /// Bytes waiting in the receive buffer.
    fn bytes_available(&mut self) -> io::Result<usize>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Single write attempt; returns how many bytes the device accepted.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Errors after which polling the channel again cannot succeed.
pub fn is_closed_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof
    )
}
