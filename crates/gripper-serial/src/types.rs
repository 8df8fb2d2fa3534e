use core::fmt;
use std::time::Duration;
use time::OffsetDateTime;

/// Baud rate the gripper firmware ships with.
pub const DEFAULT_BAUD_RATE: u32 = 460_800;

/// Readings older than this are treated as "no current data" by observers.
pub const STALE_AFTER: Duration = Duration::from_secs(1);

/// Path and baud rate of one serial device.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SerialEndpoint {
    pub path: String,
    pub baud_rate: u32,
}

impl SerialEndpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }

    pub fn with_baud(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

impl fmt::Display for SerialEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.baud_rate)
    }
}

/// Command tags understood by the actuator firmware.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Disable = 10,
    Enable = 11,
    SetZero = 12,
    EffortCtrl = 20,
    VelocityCtrl = 21,
    PositionCtrl = 22,
}

impl Opcode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            10 => Some(Opcode::Disable),
            11 => Some(Opcode::Enable),
            12 => Some(Opcode::SetZero),
            20 => Some(Opcode::EffortCtrl),
            21 => Some(Opcode::VelocityCtrl),
            22 => Some(Opcode::PositionCtrl),
            _ => None,
        }
    }
}

/// Seconds since the Unix epoch, as stamped on telemetry readings.
pub fn now_seconds() -> f64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}

/// Most recent sample reported by the angle sensor.
///
/// A `timestamp` of zero means nothing has been received yet.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TelemetryReading {
    /// Jaw angle in radians.
    pub angle: f64,
    pub distance: f64,
    /// Wall clock seconds at decode time.
    pub timestamp: f64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Freshness {
    NeverReceived,
    Stale,
    Live,
}

impl TelemetryReading {
    pub fn has_data(&self) -> bool {
        self.timestamp > 0.0
    }

    /// Age relative to `now` (seconds). Never-received readings report `now` itself.
    pub fn age(&self, now: f64) -> f64 {
        now - self.timestamp
    }

    pub fn freshness(&self, now: f64, stale_after: Duration) -> Freshness {
        if !self.has_data() {
            Freshness::NeverReceived
        } else if self.age(now) > stale_after.as_secs_f64() {
            Freshness::Stale
        } else {
            Freshness::Live
        }
    }

    /// True for both stale and never-received readings.
    pub fn is_stale(&self, now: f64, stale_after: Duration) -> bool {
        self.freshness(now, stale_after) != Freshness::Live
    }
}

/// Lower and upper bound (radians) of the jaw angle the bench treats as nominal.
pub const ANGLE_BAND: (f64, f64) = (1.68, 1.75);

pub fn angle_in_band(angle: f64) -> bool {
    (ANGLE_BAND.0..=ANGLE_BAND.1).contains(&angle)
}

/// One enumerated serial device.
#[derive(Clone, Debug)]
pub struct PortInfo {
    pub name: String,
    pub driver: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_values_match_firmware() {
        assert_eq!(Opcode::Disable.code(), 10);
        assert_eq!(Opcode::Enable.code(), 11);
        assert_eq!(Opcode::SetZero.code(), 12);
        assert_eq!(Opcode::EffortCtrl.code(), 20);
        assert_eq!(Opcode::VelocityCtrl.code(), 21);
        assert_eq!(Opcode::PositionCtrl.code(), 22);
        assert_eq!(Opcode::from_code(22), Some(Opcode::PositionCtrl));
        assert_eq!(Opcode::from_code(13), None);
    }

    #[test]
    fn default_reading_is_never_received() {
        let r = TelemetryReading::default();
        assert_eq!(r.timestamp, 0.0);
        assert_eq!(r.angle, 0.0);
        assert_eq!(r.distance, 0.0);
        let now = now_seconds();
        assert!(r.age(now) > 1.0);
        assert_eq!(r.freshness(now, STALE_AFTER), Freshness::NeverReceived);
        assert!(r.is_stale(now, STALE_AFTER));
    }

    #[test]
    fn freshness_tracks_age() {
        let r = TelemetryReading {
            angle: 1.0,
            distance: 0.0,
            timestamp: 100.0,
        };
        assert_eq!(r.freshness(100.5, STALE_AFTER), Freshness::Live);
        assert_eq!(r.freshness(101.5, STALE_AFTER), Freshness::Stale);
        assert!(!r.is_stale(100.2, STALE_AFTER));
    }

    #[test]
    fn band_is_inclusive() {
        assert!(angle_in_band(1.68));
        assert!(angle_in_band(1.75));
        assert!(!angle_in_band(1.6));
        assert!(!angle_in_band(1.8));
    }

    #[test]
    fn endpoint_defaults_to_firmware_baud() {
        let ep = SerialEndpoint::new("/dev/ttyUSB0");
        assert_eq!(ep.baud_rate, 460_800);
        assert_eq!(ep.to_string(), "/dev/ttyUSB0@460800");
    }
}
