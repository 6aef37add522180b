//! One connected DualSense: transport, I/O mode, latest input and pending output.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::delta::ButtonDelta;
use crate::error::{Error, Result};
use crate::input::{strip_report_header, InputSnapshot};
use crate::mode::IoMode;
use crate::output::{frame_output_report, OutputIntent};
use crate::poller::{self, PollHandler, PollerHandle};
use crate::transport::Transport;

pub const DEFAULT_DEAD_ZONE: f32 = 0.0;

/// Everything a poll handler may look at or change.
#[derive(Debug, Clone)]
pub struct ControllerState {
    io_mode: IoMode,
    dead_zone: f32,
    input: InputSnapshot,
    previous_input: InputSnapshot,
    output: OutputIntent,
}

impl ControllerState {
    fn new(io_mode: IoMode) -> Self {
        Self {
            io_mode,
            dead_zone: DEFAULT_DEAD_ZONE,
            input: InputSnapshot::default(),
            previous_input: InputSnapshot::default(),
            output: OutputIntent::default(),
        }
    }

    pub fn io_mode(&self) -> IoMode {
        self.io_mode
    }

    pub fn dead_zone(&self) -> f32 {
        self.dead_zone
    }

    /// Most recent snapshot.
    pub fn input(&self) -> &InputSnapshot {
        &self.input
    }

    pub fn previous_input(&self) -> &InputSnapshot {
        &self.previous_input
    }

    /// Output sent on the next transfer.
    pub fn output(&self) -> &OutputIntent {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputIntent {
        &mut self.output
    }

    pub fn set_output(&mut self, output: OutputIntent) {
        self.output = output;
    }
}

pub(crate) struct Session<T> {
    transport: T,
    read_size: usize,
    write_size: usize,
    pub(crate) state: ControllerState,
}

impl<T: Transport> Session<T> {
    /// One write+read exchange. Stores the new snapshot and returns the
    /// button transitions it caused.
    pub(crate) fn cycle(&mut self) -> Result<ButtonDelta> {
        let mode = self.state.io_mode;
        let payload = self.state.output.build_payload();
        let frame = frame_output_report(mode, &payload, self.write_size)?;

        let transfer = self.transport.transfer(&frame)?;
        if transfer.bytes_transferred != self.read_size {
            return Err(Error::TransferSizeMismatch {
                expected: self.read_size,
                actual: transfer.bytes_transferred,
            });
        }
        let raw = transfer
            .data
            .get(..transfer.bytes_transferred)
            .ok_or(Error::TransferSizeMismatch {
                expected: self.read_size,
                actual: transfer.data.len(),
            })?;

        let snapshot = InputSnapshot::parse(strip_report_header(raw), mode, self.state.dead_zone)?;
        let delta = ButtonDelta::between(&self.state.input, &snapshot);
        debug!(
            "[DS] {mode} cycle: wrote {} bytes, read {}",
            frame.len(),
            transfer.bytes_transferred
        );

        self.state.previous_input = std::mem::replace(&mut self.state.input, snapshot);
        Ok(delta)
    }
}

/// The session lock guards plain data, so a panic while it was held leaves
/// nothing half-updated that matters.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A DualSense controller bound to a transport.
pub struct DualSense<T: Transport + 'static> {
    io_mode: IoMode,
    shared: Arc<Mutex<Session<T>>>,
    poller: Option<PollerHandle>,
}

impl<T: Transport + 'static> DualSense<T> {
    /// Wrap a transport. The I/O mode is fixed here from the read buffer size.
    pub fn new(transport: T, read_buffer_size: usize, write_buffer_size: usize) -> Result<Self> {
        let io_mode = IoMode::from_read_buffer_size(read_buffer_size);
        if io_mode == IoMode::Unknown {
            return Err(Error::UnsupportedIoMode { read_buffer_size });
        }
        Ok(Self {
            io_mode,
            shared: Arc::new(Mutex::new(Session {
                transport,
                read_size: read_buffer_size,
                write_size: write_buffer_size,
                state: ControllerState::new(io_mode),
            })),
            poller: None,
        })
    }

    pub fn io_mode(&self) -> IoMode {
        self.io_mode
    }

    pub fn open(&mut self) -> Result<()> {
        lock(&self.shared).transport.open()?;
        info!("[DS] Opened ({})", self.io_mode);
        Ok(())
    }

    /// Stop polling if running, then release the device.
    pub fn close(&mut self) {
        if let Some(poller) = self.poller.take() {
            if let Err(e) = poller.stop() {
                warn!("[DS] Polling had stopped with an error: {e}");
            }
        }
        let mut session = lock(&self.shared);
        if session.transport.is_open() {
            session.transport.close();
            info!("[DS] Closed");
        }
    }

    pub fn is_open(&self) -> bool {
        lock(&self.shared).transport.is_open()
    }

    /// Stick axes below `dead_zone` read as zero from the next report on.
    pub fn set_dead_zone(&self, dead_zone: f32) {
        lock(&self.shared).state.dead_zone = dead_zone;
    }

    /// Run `f` with exclusive access to the controller state.
    ///
    /// While polling, this waits for any in-flight cycle to finish.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ControllerState) -> R) -> R {
        f(&mut lock(&self.shared).state)
    }

    pub fn input(&self) -> InputSnapshot {
        self.with_state(|s| s.input.clone())
    }

    pub fn output(&self) -> OutputIntent {
        self.with_state(|s| s.output.clone())
    }

    pub fn set_output(&self, output: OutputIntent) {
        self.with_state(|s| s.output = output);
    }

    /// Send the current output and read one input report.
    pub fn read_write_once(&self) -> Result<InputSnapshot> {
        let mut session = lock(&self.shared);
        session.cycle()?;
        Ok(session.state.input.clone())
    }

    /// Start polling every `interval` on a worker thread. The first cycle
    /// runs immediately.
    pub fn begin_polling<H: PollHandler>(&mut self, interval: Duration, handler: H) -> Result<()> {
        if self.poller.is_some() {
            return Err(Error::AlreadyPolling);
        }
        self.poller = Some(poller::spawn(self.shared.clone(), interval, handler)?);
        info!("[DS] Polling every {interval:?}");
        Ok(())
    }

    /// Stop polling and wait for the worker to exit.
    ///
    /// Returns the error that stopped the worker early, if any.
    pub fn end_polling(&mut self) -> Result<()> {
        let poller = self.poller.take().ok_or(Error::NotPolling)?;
        let result = poller.stop();
        info!("[DS] Polling stopped");
        result
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// True when polling was started but the worker has already exited
    /// (a cycle failed or the handler panicked). Call
    /// [`end_polling`](Self::end_polling) to collect the reason.
    pub fn poller_exited(&self) -> bool {
        self.poller.as_ref().is_some_and(PollerHandle::is_finished)
    }
}

impl<T: Transport + 'static> Drop for DualSense<T> {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            if let Err(e) = poller.stop() {
                warn!("[DS] Polling had stopped with an error: {e}");
            }
        }
    }
}
