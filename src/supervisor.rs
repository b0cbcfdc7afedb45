//! # Connection Supervisor
//!
//! Drives one device slot through its lifecycle, forever:
//!
//! ```text
//! Idle -> Connecting -> ConfigPending -> DeviceReady -> Forwarding
//!   ^                                                       |
//!   +----------------------- Releasing <--------------------+
//! ```
//!
//! - A missing socket or a failed dial is retried after `connect_retry`
//! - A short read, a malformed config record or a failed device creation
//!   ends the epoch
//! - A bad event is logged and dropped; the stream keeps flowing
//! - Releasing closes the socket, destroys the device (dynamic slots) and
//!   waits `reconnect_delay` before dialing again
//!
//! Stable slots build the default gamepad once, before the first connection,
//! and keep it across epochs. The config record the producer still sends is
//! read and discarded.
//!
//! The only way out of the loop is a fatal device error.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{Config, SlotMode};
use crate::device::{DeviceSlot, VirtualDeviceController};
use crate::error::{BridgeError, Result};
use crate::input::codes::default_device_config;
use crate::input::mapper::CodeMapper;
use crate::status::{SlotState, StatusReporter};
use crate::wire::decoder::{decode_config, decode_event};
use crate::wire::protocol::{DeviceConfig, CONFIG_RECORD_SIZE, EVENT_RECORD_SIZE};

/// Backoff intervals used by a supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between dial attempts while the producer is absent
    pub connect_retry: Duration,
    /// Wait after an epoch ends before dialing again
    pub reconnect_delay: Duration,
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            connect_retry: config.connect_retry(),
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// How a connection epoch ended
#[derive(Debug)]
enum EpochEnd {
    /// Producer closed the socket
    Disconnected,
    /// The device handle can no longer take events
    DeviceLost(BridgeError),
    /// Anything else that aborts the epoch
    Failed(BridgeError),
}

/// Classifies a failed socket read; a closed or reset peer is a disconnect.
fn read_failure(error: std::io::Error) -> EpochEnd {
    match error.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
            EpochEnd::Disconnected
        }
        _ => EpochEnd::Failed(error.into()),
    }
}

impl From<BridgeError> for EpochEnd {
    fn from(error: BridgeError) -> Self {
        match &error {
            BridgeError::Device(e) if e.is_device_lost() => EpochEnd::DeviceLost(error),
            _ => EpochEnd::Failed(error),
        }
    }
}

/// Supervisor of one device slot
pub struct Supervisor<C: VirtualDeviceController> {
    socket_path: PathBuf,
    mode: SlotMode,
    device: DeviceSlot<C>,
    retry: RetryPolicy,
    status: StatusReporter,
}

impl<C: VirtualDeviceController> Supervisor<C> {
    /// Creates a supervisor for one socket path.
    ///
    /// # Arguments
    ///
    /// * `socket_path` - Producer socket to dial
    /// * `mode` - Dynamic (device per config record) or stable (default device)
    /// * `device` - Device handle of this slot, shared with the bridge for release
    /// * `retry` - Backoff intervals
    /// * `status` - Reporter bound to this slot
    pub fn new(
        socket_path: impl Into<PathBuf>,
        mode: SlotMode,
        device: DeviceSlot<C>,
        retry: RetryPolicy,
        status: StatusReporter,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            mode,
            device,
            retry,
            status,
        }
    }

    /// Runs the slot lifecycle until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns only fatal errors (see [`BridgeError::is_fatal`]). All other
    /// failures are logged and retried.
    pub async fn run(self) -> Result<()> {
        let span = info_span!(
            "supervisor",
            slot = self.status.slot(),
            socket = %self.socket_path.display()
        );
        self.run_loop().instrument(span).await
    }

    async fn run_loop(&self) -> Result<()> {
        if self.mode == SlotMode::Stable {
            match self.ensure_stable_device().await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // Retried at the start of the next epoch
                    error!("Failed to create stable device: {}", e);
                }
            }
        }

        loop {
            self.status.state(SlotState::Idle);

            let end = {
                let mut stream = self.connect().await;
                self.run_epoch(&mut stream).await
            };

            let device_lost = match end {
                EpochEnd::Disconnected => {
                    info!("Producer disconnected");
                    false
                }
                EpochEnd::DeviceLost(e) => {
                    warn!("Virtual device lost: {}", e);
                    self.status.epoch_failed();
                    true
                }
                EpochEnd::Failed(e) if e.is_fatal() => {
                    error!("Fatal error: {}", e);
                    self.status.epoch_failed();
                    return Err(e);
                }
                EpochEnd::Failed(e) => {
                    warn!("Connection epoch failed: {}", e);
                    self.status.epoch_failed();
                    false
                }
            };

            self.release(device_lost).await;
            sleep(self.retry.reconnect_delay).await;
        }
    }

    /// Dials the producer socket until it answers.
    async fn connect(&self) -> UnixStream {
        self.status.state(SlotState::Connecting);
        let mut reported = false;

        loop {
            if self.socket_path.exists() {
                match UnixStream::connect(&self.socket_path).await {
                    Ok(stream) => {
                        info!("Connected to producer");
                        return stream;
                    }
                    Err(e) => debug!("Dial failed: {}", e),
                }
            } else if !reported {
                info!("Waiting for producer socket");
                reported = true;
            } else {
                debug!("Producer socket still absent");
            }

            sleep(self.retry.connect_retry).await;
        }
    }

    /// One connection epoch: config record, device, then events until EOF.
    async fn run_epoch(&self, stream: &mut UnixStream) -> EpochEnd {
        self.status.state(SlotState::ConfigPending);

        let mut record = vec![0u8; CONFIG_RECORD_SIZE];
        if let Err(e) = stream.read_exact(&mut record).await {
            return read_failure(e);
        }

        let mapper = match self.prepare_device(&record).await {
            Ok(mapper) => mapper,
            Err(e) => return e.into(),
        };

        self.status.state(SlotState::DeviceReady);
        self.forward(stream, &mapper).await
    }

    /// Builds the mapper for this epoch and makes sure the device exists.
    async fn prepare_device(&self, record: &[u8]) -> Result<CodeMapper> {
        match self.mode {
            SlotMode::Dynamic => {
                let config = decode_config(record)?;
                info!(
                    "Received config for \"{}\" ({} buttons, {} axes)",
                    config.name,
                    config.num_buttons(),
                    config.num_axes()
                );
                self.device.lock().await.create(&config)?;
                Ok(CodeMapper::new(config))
            }
            SlotMode::Stable => {
                debug!("Discarding config record in stable mode");
                self.ensure_stable_device().await?;
                Ok(CodeMapper::new(default_device_config()))
            }
        }
    }

    /// Creates the default device unless it already exists.
    async fn ensure_stable_device(&self) -> Result<()> {
        let mut device = self.device.lock().await;
        if !device.is_created() {
            let config: DeviceConfig = default_device_config();
            device.create(&config)?;
            info!("Stable device ready");
        }
        Ok(())
    }

    /// Replays events until the connection ends or the device is lost.
    async fn forward(&self, stream: &mut UnixStream, mapper: &CodeMapper) -> EpochEnd {
        self.status.state(SlotState::Forwarding);
        let mut record = [0u8; EVENT_RECORD_SIZE];

        loop {
            if let Err(e) = stream.read_exact(&mut record).await {
                return read_failure(e);
            }
            self.status.received();

            let mapped = decode_event(&record)
                .map_err(BridgeError::from)
                .and_then(|event| mapper.map(&event).map_err(BridgeError::from));
            let kernel_event = match mapped {
                Ok(kernel_event) => kernel_event,
                Err(e) => {
                    warn!("Dropping event: {}", e);
                    self.status.dropped();
                    continue;
                }
            };

            let injected = self.device.lock().await.inject(kernel_event);
            match injected {
                Ok(()) => self.status.injected(),
                Err(e) if e.is_device_lost() => return EpochEnd::DeviceLost(e.into()),
                Err(e) => {
                    warn!("Dropping event: {}", e);
                    self.status.dropped();
                }
            }
        }
    }

    /// Tears down what this epoch owned.
    async fn release(&self, device_lost: bool) {
        self.status.state(SlotState::Releasing);
        if self.mode == SlotMode::Dynamic || device_lost {
            self.device.lock().await.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::{DeviceCall, Recorder, RecordingController};
    use crate::device::{new_slot, MockVirtualDeviceController};
    use crate::error::DeviceError;
    use crate::input::codes::{EV_ABS, EV_KEY};
    use crate::input::mapper::KernelEvent;
    use crate::status::{status_channel, StatusUpdate};
    use crate::wire::encoder::encode_config;
    use crate::wire::protocol::{InputEvent, KIND_AXIS, KIND_BUTTON, KIND_INIT_FLAG};
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixListener;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            connect_retry: Duration::from_millis(20),
            reconnect_delay: Duration::from_millis(20),
        }
    }

    fn button(index: u8, value: i16) -> [u8; EVENT_RECORD_SIZE] {
        InputEvent { timestamp: 0, value, kind: KIND_BUTTON, index }.encode()
    }

    struct Harness {
        dir: tempfile::TempDir,
        recorder: Recorder,
        status: UnboundedReceiver<StatusUpdate>,
        task: JoinHandle<Result<()>>,
    }

    impl Harness {
        fn start(mode: SlotMode) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let (controller, recorder) = RecordingController::new();
            let (sender, status) = status_channel();
            let supervisor = Supervisor::new(
                dir.path().join("js0.sock"),
                mode,
                new_slot(controller),
                fast_retry(),
                sender.reporter(0),
            );
            let task = tokio::spawn(supervisor.run());
            Self { dir, recorder, status, task }
        }

        fn listen(&self) -> UnixListener {
            UnixListener::bind(self.dir.path().join("js0.sock")).unwrap()
        }
    }

    async fn accept(listener: &UnixListener) -> UnixStream {
        let (stream, _) = timeout(WAIT, listener.accept()).await.expect("supervisor reconnects").unwrap();
        stream
    }

    async fn send_config(stream: &mut UnixStream) {
        let record = encode_config(&default_device_config()).unwrap();
        stream.write_all(&record).await.unwrap();
    }

    async fn wait_until(what: &str, condition: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while !condition() {
            assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
            sleep(Duration::from_millis(5)).await;
        }
    }

    // ==================== Read Failure Tests ====================

    #[test]
    fn test_closed_or_reset_peer_is_a_disconnect() {
        for kind in [ErrorKind::UnexpectedEof, ErrorKind::ConnectionReset, ErrorKind::BrokenPipe] {
            let end = read_failure(std::io::Error::from(kind));
            assert!(matches!(end, EpochEnd::Disconnected), "{:?} -> {:?}", kind, end);
        }
    }

    #[test]
    fn test_other_read_errors_fail_the_epoch() {
        let end = read_failure(std::io::Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(end, EpochEnd::Failed(BridgeError::Io(_))));
    }

    #[tokio::test]
    async fn test_producer_gone_during_config_read_reconnects() {
        let harness = Harness::start(SlotMode::Dynamic);
        let listener = harness.listen();

        // Half a config record, then the producer goes away
        let mut stream = accept(&listener).await;
        stream.write_all(&[0u8; CONFIG_RECORD_SIZE / 2]).await.unwrap();
        drop(stream);

        let mut stream = accept(&listener).await;
        send_config(&mut stream).await;
        let recorder = harness.recorder.clone();
        wait_until("device from second epoch", || recorder.live_devices() == 1).await;
        harness.task.abort();
    }

    // ==================== Forwarding Tests ====================

    #[tokio::test]
    async fn test_button_press_and_release_each_followed_by_sync() {
        let harness = Harness::start(SlotMode::Dynamic);
        let listener = harness.listen();
        let mut stream = accept(&listener).await;

        send_config(&mut stream).await;
        stream.write_all(&button(0, 1)).await.unwrap();
        stream.write_all(&button(0, 0)).await.unwrap();

        let recorder = harness.recorder.clone();
        wait_until("four writes", || recorder.writes().len() == 4).await;

        let code = default_device_config().button_map[0];
        assert_eq!(
            harness.recorder.writes(),
            vec![
                KernelEvent { event_type: EV_KEY, code, value: 1 },
                KernelEvent::sync(),
                KernelEvent { event_type: EV_KEY, code, value: 0 },
                KernelEvent::sync(),
            ]
        );
        assert_eq!(harness.recorder.count(|c| matches!(c, DeviceCall::Create(_))), 1);
        harness.task.abort();
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_dropped_and_connection_stays_open() {
        let harness = Harness::start(SlotMode::Dynamic);
        let listener = harness.listen();
        let mut stream = accept(&listener).await;

        send_config(&mut stream).await;
        stream.write_all(&button(99, 1)).await.unwrap();
        stream.write_all(&button(1, 1)).await.unwrap();

        let recorder = harness.recorder.clone();
        wait_until("second event", || recorder.writes().len() == 2).await;

        let code = default_device_config().button_map[1];
        assert_eq!(
            harness.recorder.writes(),
            vec![KernelEvent { event_type: EV_KEY, code, value: 1 }, KernelEvent::sync()]
        );
        assert_eq!(harness.recorder.count(|c| matches!(c, DeviceCall::Destroy)), 0);
        harness.task.abort();
    }

    #[tokio::test]
    async fn test_init_flag_is_masked() {
        let harness = Harness::start(SlotMode::Dynamic);
        let listener = harness.listen();
        let mut stream = accept(&listener).await;

        send_config(&mut stream).await;
        let replay = InputEvent { timestamp: 7, value: -32767, kind: KIND_AXIS | KIND_INIT_FLAG, index: 0 };
        stream.write_all(&replay.encode()).await.unwrap();

        let recorder = harness.recorder.clone();
        wait_until("axis write", || recorder.writes().len() == 2).await;

        let code = default_device_config().axis_map[0] as u16;
        assert_eq!(
            harness.recorder.writes()[0],
            KernelEvent { event_type: EV_ABS, code, value: -32767 }
        );
        harness.task.abort();
    }

    #[tokio::test]
    async fn test_injection_failure_drops_single_event() {
        let mut harness = Harness::start(SlotMode::Dynamic);
        let listener = harness.listen();
        let mut stream = accept(&listener).await;

        send_config(&mut stream).await;
        let recorder = harness.recorder.clone();
        wait_until("device", || recorder.live_devices() == 1).await;

        harness.recorder.set_fail_inject(true);
        stream.write_all(&button(0, 1)).await.unwrap();
        loop {
            let update = timeout(WAIT, harness.status.recv()).await.unwrap().unwrap();
            if update == (StatusUpdate::Dropped { slot: 0 }) {
                break;
            }
        }
        harness.recorder.set_fail_inject(false);
        stream.write_all(&button(2, 1)).await.unwrap();

        wait_until("next event", || recorder.writes().len() == 2).await;
        let code = default_device_config().button_map[2];
        assert_eq!(harness.recorder.writes()[0], KernelEvent { event_type: EV_KEY, code, value: 1 });
        assert_eq!(harness.recorder.count(|c| matches!(c, DeviceCall::Destroy)), 0);
        harness.task.abort();
    }

    // ==================== Lifecycle Tests ====================

    #[tokio::test]
    async fn test_partial_record_ends_epoch_and_reconnects() {
        let harness = Harness::start(SlotMode::Dynamic);
        let listener = harness.listen();
        let mut stream = accept(&listener).await;

        send_config(&mut stream).await;
        stream.write_all(&button(0, 1)[..5]).await.unwrap();
        drop(stream);

        let recorder = harness.recorder.clone();
        wait_until("device destroyed", || recorder.count(|c| matches!(c, DeviceCall::Destroy)) == 1).await;
        assert_eq!(harness.recorder.live_devices(), 0);
        assert!(harness.recorder.writes().is_empty());

        let mut stream = accept(&listener).await;
        send_config(&mut stream).await;
        wait_until("second device", || recorder.live_devices() == 1).await;
        assert_eq!(harness.recorder.count(|c| matches!(c, DeviceCall::Create(_))), 2);
        harness.task.abort();
    }

    #[tokio::test]
    async fn test_waits_for_socket_to_appear() {
        let harness = Harness::start(SlotMode::Dynamic);
        sleep(Duration::from_millis(100)).await;
        assert!(!harness.task.is_finished());

        let listener = harness.listen();
        let mut stream = accept(&listener).await;
        send_config(&mut stream).await;

        let recorder = harness.recorder.clone();
        wait_until("device", || recorder.live_devices() == 1).await;
        harness.task.abort();
    }

    #[tokio::test]
    async fn test_malformed_config_aborts_epoch() {
        let harness = Harness::start(SlotMode::Dynamic);
        let listener = harness.listen();
        let mut stream = accept(&listener).await;

        let mut record = encode_config(&default_device_config()).unwrap();
        record[256..258].copy_from_slice(&600u16.to_le_bytes());
        stream.write_all(&record).await.unwrap();

        // The supervisor hangs up and dials again
        let mut next = accept(&listener).await;
        assert!(harness.recorder.calls().is_empty());

        send_config(&mut next).await;
        let recorder = harness.recorder.clone();
        wait_until("device", || recorder.live_devices() == 1).await;
        harness.task.abort();
    }

    #[tokio::test]
    async fn test_creation_failure_is_retried() {
        let harness = Harness::start(SlotMode::Dynamic);
        harness.recorder.set_fail_create(true);
        let listener = harness.listen();

        let mut stream = accept(&listener).await;
        send_config(&mut stream).await;

        let mut stream = accept(&listener).await;
        assert_eq!(harness.recorder.live_devices(), 0);
        harness.recorder.set_fail_create(false);
        send_config(&mut stream).await;

        let recorder = harness.recorder.clone();
        wait_until("device", || recorder.live_devices() == 1).await;
        assert!(!harness.task.is_finished());
        harness.task.abort();
    }

    #[tokio::test]
    async fn test_status_reports_lifecycle() {
        let mut harness = Harness::start(SlotMode::Dynamic);
        let listener = harness.listen();
        let mut stream = accept(&listener).await;
        send_config(&mut stream).await;
        stream.write_all(&button(0, 1)).await.unwrap();

        let mut seen = Vec::new();
        while !seen.contains(&StatusUpdate::Injected { slot: 0 }) {
            let update = timeout(WAIT, harness.status.recv()).await.unwrap().unwrap();
            seen.push(update);
        }

        let states: Vec<SlotState> = seen
            .iter()
            .filter_map(|update| match update {
                StatusUpdate::State { state, .. } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                SlotState::Idle,
                SlotState::Connecting,
                SlotState::ConfigPending,
                SlotState::DeviceReady,
                SlotState::Forwarding,
            ]
        );
        assert!(seen.contains(&StatusUpdate::Received { slot: 0 }));
        harness.task.abort();
    }

    // ==================== Stable Mode Tests ====================

    #[tokio::test]
    async fn test_stable_device_created_before_connect_and_kept() {
        let harness = Harness::start(SlotMode::Stable);

        let recorder = harness.recorder.clone();
        wait_until("stable device", || recorder.live_devices() == 1).await;

        let listener = harness.listen();
        let mut stream = accept(&listener).await;
        send_config(&mut stream).await;
        stream.write_all(&button(3, 1)).await.unwrap();
        wait_until("event", || recorder.writes().len() == 2).await;
        drop(stream);

        let mut stream = accept(&listener).await;
        send_config(&mut stream).await;
        stream.write_all(&button(3, 0)).await.unwrap();
        wait_until("event after reconnect", || recorder.writes().len() == 4).await;

        assert_eq!(harness.recorder.count(|c| matches!(c, DeviceCall::Create(_))), 1);
        assert_eq!(harness.recorder.count(|c| matches!(c, DeviceCall::Destroy)), 0);
        assert_eq!(harness.recorder.live_devices(), 1);
        harness.task.abort();
    }

    #[tokio::test]
    async fn test_stable_device_recreated_after_failed_creation() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, recorder) = RecordingController::new();
        recorder.set_fail_create(true);
        let (sender, _status) = status_channel();
        let supervisor = Supervisor::new(
            dir.path().join("js0.sock"),
            SlotMode::Stable,
            new_slot(controller),
            fast_retry(),
            sender.reporter(0),
        );
        let task = tokio::spawn(supervisor.run());

        sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.live_devices(), 0);
        recorder.set_fail_create(false);

        let listener = UnixListener::bind(dir.path().join("js0.sock")).unwrap();
        let mut stream = accept(&listener).await;
        send_config(&mut stream).await;
        wait_until("stable device", || recorder.live_devices() == 1).await;
        task.abort();
    }

    // ==================== Fatal Error Tests ====================

    #[tokio::test]
    async fn test_unavailable_control_interface_is_fatal() {
        let mut mock = MockVirtualDeviceController::new();
        mock.expect_is_created().return_const(false);
        mock.expect_create().times(1).returning(|_| {
            Err(DeviceError::ControlUnavailable {
                path: PathBuf::from("/dev/uinput"),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        });
        mock.expect_destroy().return_const(());

        let (sender, _status) = status_channel();
        let supervisor = Supervisor::new(
            "/nonexistent/js0.sock",
            SlotMode::Stable,
            new_slot(mock),
            fast_retry(),
            sender.reporter(0),
        );

        let result = timeout(WAIT, supervisor.run()).await.unwrap();
        let err = tokio_test::assert_err!(result);
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unavailable_control_interface_is_fatal_in_dynamic_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("js0.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut mock = MockVirtualDeviceController::new();
        mock.expect_create().times(1).returning(|_| {
            Err(DeviceError::ControlUnavailable {
                path: PathBuf::from("/dev/uinput"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        });
        mock.expect_destroy().return_const(());

        let (sender, _status) = status_channel();
        let supervisor = Supervisor::new(&path, SlotMode::Dynamic, new_slot(mock), fast_retry(), sender.reporter(0));
        let task = tokio::spawn(supervisor.run());

        let mut stream = accept(&listener).await;
        send_config(&mut stream).await;

        let result = timeout(WAIT, task).await.unwrap().unwrap();
        assert!(result.unwrap_err().is_fatal());
    }
}
