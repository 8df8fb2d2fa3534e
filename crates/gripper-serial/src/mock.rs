use crate::encode::FRAME_LEN;
use crate::{CommandFrame, GripperError, PortInfo, Result, SerialEndpoint, SerialLink};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    closed: bool,
    fail_writes: bool,
    next_write_limit: Option<usize>,
    pending_read_error: Option<io::ErrorKind>,
    opens: usize,
}

/// Test-side handle onto an in-process serial device.
///
/// Devices live in a process-wide registry keyed by path; [`MockLink::open`]
/// fails for paths that were never registered, like a missing tty would.
#[derive(Clone, Debug, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

fn registry() -> MutexGuard<'static, HashMap<String, MockDevice>> {
    static DEVICES: OnceLock<Mutex<HashMap<String, MockDevice>>> = OnceLock::new();
    DEVICES
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

impl MockDevice {
    /// Register a fresh device under `path`, replacing any previous one.
    pub fn register(path: &str) -> MockDevice {
        let dev = MockDevice::default();
        registry().insert(path.to_string(), dev.clone());
        dev
    }

    pub fn unregister(path: &str) {
        registry().remove(path);
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes for the host to read.
    pub fn feed(&self, bytes: &[u8]) {
        self.state().inbound.extend(bytes.iter().copied());
    }

    pub fn pending_inbound(&self) -> usize {
        self.state().inbound.len()
    }

    /// Everything the host has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state().written.clone()
    }

    /// Written bytes split into command frames.
    pub fn frames(&self) -> Vec<CommandFrame> {
        self.state()
            .written
            .chunks_exact(FRAME_LEN)
            .filter_map(|c| {
                let op = crate::Opcode::from_code(c[0])?;
                let value = f32::from_le_bytes([c[1], c[2], c[3], c[4]]);
                Some(CommandFrame::new(op, value))
            })
            .collect()
    }

    /// Simulate the device going away. Further polls report a broken pipe.
    pub fn close(&self) {
        self.state().closed = true;
    }

    pub fn reopen(&self) {
        self.state().closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// Accept at most `n` bytes on the next write.
    pub fn limit_next_write(&self, n: usize) {
        self.state().next_write_limit = Some(n);
    }

    /// Make the next poll fail once with `kind`.
    pub fn inject_read_error(&self, kind: io::ErrorKind) {
        self.state().pending_read_error = Some(kind);
    }

    /// Number of times the device has been opened.
    pub fn opens(&self) -> usize {
        self.state().opens
    }
}

/// Host side of a [`MockDevice`].
pub struct MockLink {
    device: MockDevice,
}

impl SerialLink for MockLink {
    fn open(endpoint: &SerialEndpoint, _read_timeout: Duration) -> Result<Self> {
        let device = registry()
            .get(&endpoint.path)
            .cloned()
            .ok_or_else(|| GripperError::PortNotFound(endpoint.path.clone()))?;
        {
            let mut st = device.state();
            if st.closed {
                return Err(GripperError::Connect {
                    path: endpoint.path.clone(),
                    reason: "device closed".to_string(),
                });
            }
            st.opens += 1;
        }
        Ok(Self { device })
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut names: Vec<String> = registry().keys().cloned().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| PortInfo {
                name,
                driver: "mock".to_string(),
            })
            .collect())
    }

    fn try_clone_link(&self) -> Result<Self> {
        Ok(Self {
            device: self.device.clone(),
        })
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let mut st = self.device.state();
        if st.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        if let Some(kind) = st.pending_read_error.take() {
            return Err(kind.into());
        }
        Ok(st.inbound.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut st = self.device.state();
        if st.inbound.is_empty() {
            if st.closed {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = buf.len().min(st.inbound.len());
        for (slot, b) in buf.iter_mut().zip(st.inbound.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut st = self.device.state();
        if st.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        if st.fail_writes {
            return Err(io::Error::other("mock write failure"));
        }
        let n = st
            .next_write_limit
            .take()
            .map_or(bytes.len(), |limit| limit.min(bytes.len()));
        st.written.extend_from_slice(&bytes[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_requires_registration() {
        let ep = SerialEndpoint::new("/mock/unregistered");
        assert!(matches!(
            MockLink::open(&ep, Duration::from_millis(10)),
            Err(GripperError::PortNotFound(_))
        ));
    }

    #[test]
    fn read_drains_fed_bytes() {
        let dev = MockDevice::register("/mock/mod-read");
        let mut link =
            MockLink::open(&SerialEndpoint::new("/mock/mod-read"), Duration::ZERO).unwrap();
        dev.feed(b"abc");
        assert_eq!(link.bytes_available().unwrap(), 3);
        let mut buf = [0u8; 2];
        assert_eq!(link.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(dev.pending_inbound(), 1);
        dev.close();
        assert!(crate::is_closed_error(&link.bytes_available().unwrap_err()));
        MockDevice::unregister("/mock/mod-read");
    }
}
