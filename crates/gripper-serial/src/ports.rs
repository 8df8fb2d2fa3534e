use crate::SerialLink;
use tracing::warn;

/// Name fragment identifying USB-serial adapters on Linux.
pub const USB_SERIAL_FILTER: &str = "ttyUSB";

/// Device names visible to backend `L` that contain `filter`.
///
/// Enumeration failures are logged and reported as an empty list: callers
/// treat "nothing found" and "could not look" the same way.
pub fn list_ports_with<L: SerialLink>(filter: &str) -> Vec<String> {
    match L::list() {
        Ok(ports) => ports
            .into_iter()
            .filter(|p| p.name.contains(filter))
            .map(|p| p.name)
            .collect(),
        Err(e) => {
            warn!(error = %e, "port enumeration failed");
            Vec::new()
        }
    }
}

/// USB-serial devices currently attached.
#[cfg(feature = "serial")]
pub fn list_ports() -> Vec<String> {
    list_ports_with::<crate::SerialPortLink>(USB_SERIAL_FILTER)
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::{MockDevice, MockLink};

    #[test]
    fn filters_by_substring() {
        MockDevice::register("/dev/ttyUSB-ports-test");
        MockDevice::register("/dev/ttyS-ports-test");
        let found = list_ports_with::<MockLink>("ttyUSB-ports");
        assert_eq!(found, vec!["/dev/ttyUSB-ports-test".to_string()]);
        assert!(list_ports_with::<MockLink>("no-such-adapter").is_empty());
        MockDevice::unregister("/dev/ttyUSB-ports-test");
        MockDevice::unregister("/dev/ttyS-ports-test");
    }
}
