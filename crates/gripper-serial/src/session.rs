use crate::encode::{clamp_position, FRAME_LEN};
use crate::reader::{CallbackSlot, ReaderHandle, ReadingSlot, SampleCallback};
use crate::{
    CommandFrame, GripperError, Opcode, Result, SerialEndpoint, SerialLink, SessionConfig,
    TelemetryReading,
};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use tracing::{debug, info, warn};

/// One serial connection to the gripper or its angle sensor.
///
/// Control operations run synchronously on the caller's thread. Reception
/// runs on a single background thread started by
/// [`start_reception`](Self::start_reception); its output is exposed through
/// [`latest_reading`](Self::latest_reading), which any thread may poll.
pub struct DeviceSession<L: SerialLink> {
    config: SessionConfig,
    endpoint: Option<SerialEndpoint>,
    link: Option<L>,
    enabled: bool,
    reader: Option<ReaderHandle>,
    latest: ReadingSlot,
    callback: CallbackSlot,
}

impl<L: SerialLink> Default for DeviceSession<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: SerialLink> DeviceSession<L> {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            endpoint: None,
            link: None,
            enabled: false,
            reader: None,
            latest: Arc::new(Mutex::new(TelemetryReading::default())),
            callback: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open `endpoint`, closing any current connection first.
    ///
    /// On failure the session is left disconnected. No retries are made.
    /// A previous reader that fails to stop is logged and left detached; the
    /// old port is closed regardless and the new one is still opened.
    pub fn connect(&mut self, endpoint: SerialEndpoint) -> Result<()> {
        if let Err(e) = self.disconnect() {
            warn!(error = %e, "previous reader leaked; opening new port anyway");
        }
        let link = L::open(&endpoint, self.config.read_timeout()).map_err(|e| {
            warn!(port = %endpoint, error = %e, "connect failed");
            e
        })?;
        info!(port = %endpoint, "connected");
        self.link = Some(link);
        self.endpoint = Some(endpoint);
        Ok(())
    }

    /// Stop reception and close the port. A no-op when already disconnected.
    ///
    /// The port is closed even when the reader fails to stop in time; that
    /// case is still reported as [`GripperError::ReaderStuck`].
    pub fn disconnect(&mut self) -> Result<()> {
        let stopped = self.stop_reception();
        if let Some(endpoint) = self.endpoint.take() {
            info!(port = %endpoint, "disconnected");
        }
        self.link = None;
        self.enabled = false;
        stopped
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn endpoint(&self) -> Option<&SerialEndpoint> {
        self.endpoint.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Encode and write one 7-byte command.
    ///
    /// A write the device does not fully accept is an error, not retried.
    pub fn send_command(&mut self, opcode: Opcode, value: f32) -> Result<()> {
        let link = self.link.as_mut().ok_or(GripperError::NotConnected)?;
        let frame = CommandFrame::new(opcode, value);
        let written = link.write(frame.as_bytes())?;
        if written != FRAME_LEN {
            return Err(GripperError::ShortWrite {
                written,
                expected: FRAME_LEN,
            });
        }
        link.flush()?;
        debug!(?opcode, value, "command sent");
        Ok(())
    }

    pub fn enable(&mut self) -> Result<()> {
        self.send_command(Opcode::Enable, 0.0)?;
        self.enabled = true;
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        self.send_command(Opcode::Disable, 0.0)?;
        self.enabled = false;
        Ok(())
    }

    pub fn set_zero(&mut self) -> Result<()> {
        self.send_command(Opcode::SetZero, 0.0)
    }

    /// Command a jaw angle in radians. Out-of-range values are clamped to
    /// the actuator's travel; the angle actually sent is returned.
    pub fn set_position(&mut self, angle: f32) -> Result<f32> {
        let angle = clamp_position(angle);
        self.send_command(Opcode::PositionCtrl, angle)?;
        Ok(angle)
    }

    pub fn set_velocity(&mut self, velocity: f32) -> Result<()> {
        self.send_command(Opcode::VelocityCtrl, velocity)
    }

    pub fn set_effort(&mut self, effort: f32) -> Result<()> {
        self.send_command(Opcode::EffortCtrl, effort)
    }

    /// Start the background reader if it is not already running and install
    /// `on_sample` as the notification hook (replacing any previous one).
    pub fn start_reception(&mut self, on_sample: Option<SampleCallback>) -> Result<()> {
        let link = self.link.as_ref().ok_or(GripperError::NotConnected)?;
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = on_sample;

        if self.reader.as_ref().is_some_and(ReaderHandle::is_running) {
            return Ok(());
        }
        // Reader exited on its own (channel closed); reap it before restarting.
        if let Some(finished) = self.reader.take() {
            finished.wait(self.config.join_timeout())?;
        }

        let rx_link = link.try_clone_link()?;
        let name = self
            .endpoint
            .as_ref()
            .map(|e| e.path.clone())
            .unwrap_or_default();
        self.reader = Some(ReaderHandle::spawn(
            rx_link,
            &name,
            self.config.clone(),
            self.latest.clone(),
            self.callback.clone(),
        )?);
        Ok(())
    }

    /// Stop the reader and wait for it to exit. No callbacks run after this
    /// returns `Ok`.
    pub fn stop_reception(&mut self) -> Result<()> {
        let Some(reader) = self.reader.take() else {
            return Ok(());
        };
        reader.request_stop();
        let stopped = reader.wait(self.config.join_timeout());
        // A stuck reader may still be inside the callback; it checks the stop
        // flag before every record, so leaving the slot set is harmless.
        match self.callback.try_lock() {
            Ok(mut slot) => *slot = None,
            Err(TryLockError::Poisoned(p)) => *p.into_inner() = None,
            Err(TryLockError::WouldBlock) => {}
        }
        stopped
    }

    pub fn is_receiving(&self) -> bool {
        self.reader.as_ref().is_some_and(ReaderHandle::is_running)
    }

    /// Snapshot of the most recent sample. Never blocks on I/O.
    pub fn latest_reading(&self) -> TelemetryReading {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: SerialLink> Drop for DeviceSession<L> {
    fn drop(&mut self) {
        if let Err(e) = self.stop_reception() {
            warn!(error = %e, "reader still running at session drop");
        }
    }
}
