use crate::decode::decode_record;
use crate::frame::InboundBuffer;
use crate::{
    is_closed_error, now_seconds, GripperError, Result, SerialLink, SessionConfig,
    TelemetryReading,
};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const READ_CHUNK: usize = 1024;

/// Notification hook run on the reader thread for every decoded sample.
///
/// It must not block or touch UI state; observers that render readings
/// should poll [`crate::DeviceSession::latest_reading`] on their own schedule.
pub type SampleCallback = Box<dyn FnMut(TelemetryReading) + Send>;

pub(crate) type CallbackSlot = Arc<Mutex<Option<SampleCallback>>>;
pub(crate) type ReadingSlot = Arc<Mutex<TelemetryReading>>;

/// Background thread draining one serial link.
pub(crate) struct ReaderHandle {
    stop: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

impl ReaderHandle {
    pub(crate) fn spawn<L: SerialLink>(
        link: L,
        name: &str,
        config: SessionConfig,
        latest: ReadingSlot,
        callback: CallbackSlot,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = mpsc::channel();
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name(format!("gripper-rx {name}"))
            .spawn(move || {
                run(link, &thread_stop, &config, &latest, &callback);
                // Receiver may already be gone if the session was dropped.
                let _ = done_tx.send(());
            })
            .map_err(|e| GripperError::Spawn(e.to_string()))?;
        info!(port = name, "reader started");
        Ok(Self { stop, done, handle })
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Wait for the thread to exit after [`request_stop`](Self::request_stop).
    pub(crate) fn wait(self, timeout: Duration) -> Result<()> {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    warn!("reader thread panicked");
                }
                info!("reader stopped");
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(?timeout, "reader thread did not stop; detaching it");
                Err(GripperError::ReaderStuck(timeout))
            }
        }
    }
}

fn run<L: SerialLink>(
    mut link: L,
    stop: &AtomicBool,
    config: &SessionConfig,
    latest: &Mutex<TelemetryReading>,
    callback: &Mutex<Option<SampleCallback>>,
) {
    let mut buffer = InboundBuffer::with_capacity(config.buffer_capacity);
    let mut chunk = [0u8; READ_CHUNK];
    while !stop.load(Ordering::Acquire) {
        match poll_once(&mut link, &mut chunk) {
            Ok(0) => {}
            Ok(n) => {
                buffer.push_bytes(&chunk[..n]);
                drain_records(&mut buffer, stop, latest, callback);
            }
            Err(e) if is_closed_error(&e) => {
                info!(error = %e, "serial channel closed");
                break;
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => {
                warn!(error = %e, "serial poll failed");
                thread::sleep(config.error_backoff());
                continue;
            }
        }
        thread::sleep(config.idle_sleep());
    }
}

fn poll_once<L: SerialLink>(link: &mut L, chunk: &mut [u8]) -> io::Result<usize> {
    let available = link.bytes_available()?;
    if available == 0 {
        return Ok(0);
    }
    let want = available.min(chunk.len());
    link.read(&mut chunk[..want])
}

/// Decode and publish every complete record in `buffer`.
///
/// Stops as soon as `stop` is set so that no sample is published or
/// called back once shutdown has been requested.
fn drain_records(
    buffer: &mut InboundBuffer,
    stop: &AtomicBool,
    latest: &Mutex<TelemetryReading>,
    callback: &Mutex<Option<SampleCallback>>,
) {
    while !stop.load(Ordering::Acquire) {
        let Some(record) = buffer.next_object() else {
            break;
        };
        let sample = match decode_record(&record) {
            Ok(Some(sample)) => sample,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, record = %record, "dropping telemetry record");
                continue;
            }
        };
        let reading = TelemetryReading {
            angle: sample.angle,
            distance: sample.distance,
            timestamp: now_seconds(),
        };
        *latest.lock().unwrap_or_else(PoisonError::into_inner) = reading;
        debug!(angle = reading.angle, distance = reading.distance, "telemetry");
        if let Some(cb) = callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            cb(reading);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> (Mutex<TelemetryReading>, Mutex<Option<SampleCallback>>) {
        (Mutex::new(TelemetryReading::default()), Mutex::new(None))
    }

    #[test]
    fn drain_updates_latest_from_last_record() {
        let (latest, cb) = slots();
        let mut buf = InboundBuffer::default();
        buf.push_bytes(
            br#"t=1 {"AS5047": {"rad": 0.5, "distance": 0.01}} t=2 {"AS5047": {"rad": 0.7}}"#,
        );
        drain_records(&mut buf, &AtomicBool::new(false), &latest, &cb);
        let r = *latest.lock().unwrap();
        assert_eq!(r.angle, 0.7);
        assert_eq!(r.distance, 0.0);
        assert!(r.timestamp > 0.0);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_skips_faults_and_garbage() {
        let (latest, cb) = slots();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        *cb.lock().unwrap() = Some(Box::new(move |r: TelemetryReading| {
            sink.lock().unwrap().push(r.angle);
        }));
        let mut buf = InboundBuffer::default();
        buf.push_bytes(
            br#"{"AS5047": {"error": "fault"}}{not json}{"AS5047": {"angle": 10}}"#,
        );
        drain_records(&mut buf, &AtomicBool::new(false), &latest, &cb);
        let angles = seen.lock().unwrap().clone();
        assert_eq!(angles.len(), 1);
        assert!((angles[0] - 0.1745).abs() < 1e-12);
    }

    #[test]
    fn stop_flag_halts_publishing() {
        let (latest, cb) = slots();
        let calls = Arc::new(Mutex::new(0u32));
        let sink = calls.clone();
        *cb.lock().unwrap() = Some(Box::new(move |_: TelemetryReading| {
            *sink.lock().unwrap() += 1;
        }));
        let mut buf = InboundBuffer::default();
        buf.push_bytes(br#"{"AS5047": {"rad": 0.5}}"#);
        drain_records(&mut buf, &AtomicBool::new(true), &latest, &cb);
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(*latest.lock().unwrap(), TelemetryReading::default());
    }

    #[test]
    fn fault_leaves_prior_reading() {
        let (latest, cb) = slots();
        let prior = TelemetryReading {
            angle: 1.0,
            distance: 2.0,
            timestamp: 3.0,
        };
        *latest.lock().unwrap() = prior;
        let mut buf = InboundBuffer::default();
        buf.push_bytes(br#"{"AS5047": {"error": "fault"}}"#);
        drain_records(&mut buf, &AtomicBool::new(false), &latest, &cb);
        assert_eq!(*latest.lock().unwrap(), prior);
    }
}
