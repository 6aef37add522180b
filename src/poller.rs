//! Repeating read/write worker.
//!
//! Runs on a dedicated OS thread (not tokio) because every transfer blocks on
//! the device. Each tick locks the session, runs one cycle, then hands the
//! state to the [`PollHandler`] while still holding the lock, so handler
//! mutations never interleave with a transfer.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::controller::{lock, ControllerState, Session};
use crate::delta::ButtonDelta;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Callbacks invoked from the polling worker after every cycle.
///
/// Any `FnMut(&mut ControllerState) + Send` closure is a handler that only
/// cares about state.
pub trait PollHandler: Send + 'static {
    fn on_state_polled(&mut self, state: &mut ControllerState);

    /// Called before [`on_state_polled`](Self::on_state_polled) when at least
    /// one button changed, and only if [`tracks_buttons`](Self::tracks_buttons)
    /// returns true.
    fn on_button_state_changed(&mut self, _state: &mut ControllerState, _delta: &ButtonDelta) {}

    fn tracks_buttons(&self) -> bool {
        false
    }
}

impl<F> PollHandler for F
where
    F: FnMut(&mut ControllerState) + Send + 'static,
{
    fn on_state_polled(&mut self, state: &mut ControllerState) {
        self(state)
    }
}

/// A pair of closures: one per cycle, one per button change.
pub struct StateAndButtons<S, B> {
    pub on_state: S,
    pub on_buttons: B,
}

impl<S, B> PollHandler for StateAndButtons<S, B>
where
    S: FnMut(&mut ControllerState) + Send + 'static,
    B: FnMut(&mut ControllerState, &ButtonDelta) + Send + 'static,
{
    fn on_state_polled(&mut self, state: &mut ControllerState) {
        (self.on_state)(state)
    }

    fn on_button_state_changed(&mut self, state: &mut ControllerState, delta: &ButtonDelta) {
        (self.on_buttons)(state, delta)
    }

    fn tracks_buttons(&self) -> bool {
        true
    }
}

/// Owner of a running worker. Dropping it without [`stop`](Self::stop)
/// detaches the thread, so the controller always stops it explicitly.
pub(crate) struct PollerHandle {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<Result<()>>,
}

impl PollerHandle {
    /// Signal the worker and join it. No handler call happens after this returns.
    pub(crate) fn stop(self) -> Result<()> {
        // The worker may already have exited on its own; that is fine.
        let _ = self.stop_tx.send(());
        self.thread.join().map_err(|_| Error::PollerPanicked)?
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

pub(crate) fn spawn<T, H>(
    shared: Arc<Mutex<Session<T>>>,
    interval: Duration,
    handler: H,
) -> Result<PollerHandle>
where
    T: Transport + 'static,
    H: PollHandler,
{
    let (stop_tx, stop_rx) = mpsc::channel();
    let thread = std::thread::Builder::new()
        .name("dualsense-poller".into())
        .spawn(move || run(&shared, interval, handler, &stop_rx))
        .map_err(Error::Spawn)?;
    Ok(PollerHandle { stop_tx, thread })
}

fn run<T: Transport, H: PollHandler>(
    shared: &Mutex<Session<T>>,
    interval: Duration,
    mut handler: H,
    stop_rx: &mpsc::Receiver<()>,
) -> Result<()> {
    // `None` once the interval runs past what `Instant` can represent: no more ticks.
    let mut next_tick = Some(Instant::now());
    let mut cycles: u64 = 0;

    loop {
        let woke = match next_tick {
            Some(at) => stop_rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => stop_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match woke {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("[POLL] Stopping after {cycles} cycle(s)");
                return Ok(());
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        {
            let mut session = lock(shared);
            let delta = match session.cycle() {
                Ok(delta) => delta,
                Err(e) => {
                    error!("[POLL] Cycle {cycles} failed, polling stopped: {e}");
                    return Err(e);
                }
            };
            let state = &mut session.state;
            if handler.tracks_buttons() && delta.has_changes() {
                handler.on_button_state_changed(state, &delta);
            }
            handler.on_state_polled(state);
        }
        cycles += 1;

        // Skip missed ticks instead of bursting to catch up.
        let now = Instant::now();
        next_tick = next_tick
            .and_then(|at| at.checked_add(interval))
            .map(|at| at.max(now));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::controller::tests::{press, usb_report};
    use crate::controller::DualSense;
    use crate::input::Button;
    use crate::transport::scripted::ScriptedTransport;
    use crate::transport::TransportError;

    const TICK: Duration = Duration::from_millis(2);

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn idle_controller() -> (DualSense<ScriptedTransport>, Arc<Mutex<crate::transport::scripted::Script>>) {
        let (t, script) = ScriptedTransport::new();
        script.lock().unwrap().idle = Some(usb_report(|_| {}));
        let mut ds = DualSense::new(t, 64, 48).unwrap();
        ds.open().unwrap();
        (ds, script)
    }

    #[test]
    fn test_polling_invokes_handler() {
        let (mut ds, _script) = idle_controller();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        ds.begin_polling(TICK, move |_: &mut ControllerState| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert!(ds.is_polling());

        wait_until(|| count.load(Ordering::SeqCst) >= 3);
        ds.end_polling().unwrap();
        assert!(!ds.is_polling());
    }

    #[test]
    fn test_no_callbacks_after_end_polling() {
        let (mut ds, _script) = idle_controller();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        ds.begin_polling(Duration::from_micros(100), move |_: &mut ControllerState| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        wait_until(|| count.load(Ordering::SeqCst) >= 5);

        ds.end_polling().unwrap();
        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_state_machine_errors() {
        let (mut ds, _script) = idle_controller();
        assert!(matches!(ds.end_polling(), Err(Error::NotPolling)));

        ds.begin_polling(TICK, |_: &mut ControllerState| {}).unwrap();
        assert!(matches!(
            ds.begin_polling(TICK, |_: &mut ControllerState| {}),
            Err(Error::AlreadyPolling)
        ));
        ds.end_polling().unwrap();

        // Idle again: polling can restart.
        ds.begin_polling(TICK, |_: &mut ControllerState| {}).unwrap();
        ds.end_polling().unwrap();
    }

    #[test]
    fn test_button_handler_fires_before_state_handler() {
        let (mut ds, script) = idle_controller();
        script
            .lock()
            .unwrap()
            .push_report(usb_report(press(9, 0x04)));

        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let (l1, l2) = (log.clone(), log.clone());
        ds.begin_polling(
            TICK,
            StateAndButtons {
                on_state: move |_: &mut ControllerState| {
                    l1.lock().unwrap().push("state".into());
                },
                on_buttons: move |_: &mut ControllerState, delta: &ButtonDelta| {
                    let names: Vec<_> = delta.changes().map(|(b, t)| format!("{b}:{t:?}")).collect();
                    l2.lock().unwrap().push(names.join(","));
                },
            },
        )
        .unwrap();

        wait_until(|| log.lock().unwrap().len() >= 5);
        ds.end_polling().unwrap();

        let log = log.lock().unwrap();
        // Cycle 1: mic pressed. Cycle 2: back to idle, mic released.
        assert_eq!(log[0], "mic:Pressed");
        assert_eq!(log[1], "state");
        assert_eq!(log[2], "mic:Released");
        assert_eq!(log[3], "state");
        assert!(log[4..].iter().all(|e| e == "state"));
    }

    #[test]
    fn test_closure_handler_ignores_buttons() {
        let (mut ds, script) = idle_controller();
        script.lock().unwrap().push_report(usb_report(press(7, 0x20)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        ds.begin_polling(TICK, move |state: &mut ControllerState| {
            s.lock().unwrap().push(state.input().is_pressed(Button::Cross));
        })
        .unwrap();
        wait_until(|| seen.lock().unwrap().len() >= 2);
        ds.end_polling().unwrap();
        assert_eq!(&seen.lock().unwrap()[..2], &[true, false]);
    }

    #[test]
    fn test_handler_output_reaches_next_frame() {
        let (mut ds, script) = idle_controller();
        ds.begin_polling(TICK, |state: &mut ControllerState| {
            state.output_mut().left_rumble = 1.0;
        })
        .unwrap();
        wait_until(|| script.lock().unwrap().writes.len() >= 2);
        ds.end_polling().unwrap();

        let s = script.lock().unwrap();
        assert_eq!(s.writes[0][1 + 0x03], 0, "first frame predates the handler");
        assert_eq!(s.writes[1][1 + 0x03], 0xFF);
    }

    #[test]
    fn test_with_state_while_polling() {
        let (mut ds, script) = idle_controller();
        ds.begin_polling(TICK, |_: &mut ControllerState| {}).unwrap();
        ds.with_state(|s| s.output_mut().right_rumble = 1.0);
        let writes_before = script.lock().unwrap().writes.len();
        wait_until(|| script.lock().unwrap().writes.len() > writes_before);
        ds.end_polling().unwrap();

        let s = script.lock().unwrap();
        assert_eq!(s.writes.last().unwrap()[1 + 0x02], 0xFF);
    }

    #[test]
    fn test_huge_interval_runs_once_and_stops_cleanly() {
        let (mut ds, _script) = idle_controller();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        ds.begin_polling(Duration::MAX, move |_: &mut ControllerState| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        wait_until(|| count.load(Ordering::SeqCst) == 1);
        thread::sleep(Duration::from_millis(20));
        assert!(!ds.poller_exited());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        ds.end_polling().unwrap();
    }

    #[test]
    fn test_transfer_error_stops_worker() {
        let (t, script) = ScriptedTransport::new();
        {
            let mut s = script.lock().unwrap();
            s.push_report(usb_report(|_| {}));
            s.responses
                .push_back(Err(TransportError::Other("unplugged".into())));
            s.idle = Some(usb_report(|_| {}));
        }
        let mut ds = DualSense::new(t, 64, 48).unwrap();
        ds.open().unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        ds.begin_polling(TICK, move |_: &mut ControllerState| {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        wait_until(|| ds.poller_exited());
        assert!(ds.is_polling());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(matches!(
            ds.end_polling(),
            Err(Error::Transport(TransportError::Other(_)))
        ));
        assert_eq!(script.lock().unwrap().writes.len(), 2);
    }

    #[test]
    fn test_handler_panic_is_reported() {
        let (mut ds, _script) = idle_controller();
        ds.begin_polling(TICK, |_: &mut ControllerState| panic!("boom"))
            .unwrap();
        wait_until(|| ds.poller_exited());
        assert!(matches!(ds.end_polling(), Err(Error::PollerPanicked)));

        // The poisoned session lock is recovered.
        assert!(ds.read_write_once().is_ok());
    }

    #[test]
    fn test_drop_stops_worker() {
        let (mut ds, script) = idle_controller();
        ds.begin_polling(TICK, |_: &mut ControllerState| {}).unwrap();
        wait_until(|| !script.lock().unwrap().writes.is_empty());
        drop(ds);
        let writes = script.lock().unwrap().writes.len();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(script.lock().unwrap().writes.len(), writes);
    }
}
