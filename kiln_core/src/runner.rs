//! Control loop thread.
//!
//! `OvenRunner::spawn` moves an `Oven` onto its own thread and returns an
//! `OvenHandle`. Commands arrive over a crossbeam channel; while RUNNING the
//! heating element paces the loop, while IDLE the loop waits up to one
//! `time_step` for the next command. The latest snapshot is published after
//! every cycle and non-idle cycle statuses are forwarded to subscribers.
//! The status queue holds at most `STATUS_CAPACITY` entries; when nobody
//! drains it the oldest status is discarded to make room for the newest.
//!
//! Dropping the handle shuts the thread down (aborting an active run) and joins it.
use crate::builder::Oven;
use crate::cooldown::CooldownCapture;
use crate::error::{KilnError, Result};
use crate::profile::ScheduleProfile;
use crate::recorder::Outcome;
use crate::state::{RunState, StateSnapshot};
use crate::status::CycleStatus;
use crossbeam_channel as xch;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

enum Command {
    Start {
        profile: ScheduleProfile,
        start_at_minutes: f64,
        reply: xch::Sender<std::result::Result<(), KilnError>>,
    },
    Abort,
    Shutdown,
}

/// Bound of the status queue returned by `OvenHandle::statuses`.
pub const STATUS_CAPACITY: usize = 64;

pub struct OvenRunner;

impl OvenRunner {
    pub fn spawn(oven: Oven) -> OvenHandle {
        let (tx, rx) = xch::unbounded::<Command>();
        let (status_tx, status_rx) = xch::bounded::<CycleStatus>(STATUS_CAPACITY);
        let overflow = status_rx.clone();
        let snapshot = Arc::new(Mutex::new(oven.snapshot()));
        let snapshot_clone = snapshot.clone();
        let cooldown = oven.cooldown();
        let idle_wait = oven.config().sensor.time_step();

        let join_handle = std::thread::spawn(move || {
            let statuses = StatusQueue {
                tx: status_tx,
                overflow,
            };
            control_loop(oven, &rx, &statuses, &snapshot_clone, idle_wait);
        });

        OvenHandle {
            tx,
            status_rx,
            snapshot,
            cooldown,
            join_handle: Some(join_handle),
        }
    }
}

/// Sending side of the status stream; drops the oldest entry when full.
struct StatusQueue {
    tx: xch::Sender<CycleStatus>,
    overflow: xch::Receiver<CycleStatus>,
}

impl StatusQueue {
    fn push(&self, mut status: CycleStatus) {
        loop {
            match self.tx.try_send(status) {
                Ok(()) | Err(xch::TrySendError::Disconnected(_)) => return,
                Err(xch::TrySendError::Full(back)) => {
                    let _ = self.overflow.try_recv();
                    status = back;
                }
            }
        }
    }
}

fn control_loop(
    mut oven: Oven,
    rx: &xch::Receiver<Command>,
    statuses: &StatusQueue,
    snapshot: &Mutex<StateSnapshot>,
    idle_wait: Duration,
) {
    let publish = |oven: &Oven| {
        *snapshot.lock().unwrap_or_else(PoisonError::into_inner) = oven.snapshot();
    };
    loop {
        // Drain pending commands without blocking.
        loop {
            match rx.try_recv() {
                Ok(cmd) => {
                    if !handle(&mut oven, cmd) {
                        publish(&oven);
                        tracing::trace!("control thread exiting cleanly");
                        return;
                    }
                }
                Err(xch::TryRecvError::Empty) => break,
                Err(xch::TryRecvError::Disconnected) => {
                    oven.shutdown();
                    tracing::debug!("control handle dropped, exiting thread");
                    return;
                }
            }
        }

        let status = oven.cycle();
        publish(&oven);
        if status != CycleStatus::Idle {
            statuses.push(status);
        }

        if oven.state() == RunState::Idle {
            match rx.recv_timeout(idle_wait) {
                Ok(cmd) => {
                    if !handle(&mut oven, cmd) {
                        publish(&oven);
                        return;
                    }
                    publish(&oven);
                }
                Err(xch::RecvTimeoutError::Timeout) => {}
                Err(xch::RecvTimeoutError::Disconnected) => {
                    oven.shutdown();
                    return;
                }
            }
        }
    }
}

/// Apply one command; false means the thread should exit.
fn handle(oven: &mut Oven, cmd: Command) -> bool {
    match cmd {
        Command::Start {
            profile,
            start_at_minutes,
            reply,
        } => {
            let result = oven.start_run(profile, start_at_minutes).map_err(|e| {
                e.downcast_ref::<KilnError>()
                    .cloned()
                    .unwrap_or_else(|| KilnError::State(e.to_string()))
            });
            let _ = reply.send(result);
            true
        }
        Command::Abort => {
            tracing::info!("abort requested");
            oven.abort_run(Outcome::Aborted);
            true
        }
        Command::Shutdown => {
            oven.shutdown();
            false
        }
    }
}

/// Cross-thread handle to a running control loop.
pub struct OvenHandle {
    tx: xch::Sender<Command>,
    status_rx: xch::Receiver<CycleStatus>,
    snapshot: Arc<Mutex<StateSnapshot>>,
    cooldown: CooldownCapture,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl OvenHandle {
    /// Ask the loop to start `profile`; waits for the start to be accepted or refused.
    pub fn start(&self, profile: ScheduleProfile, start_at_minutes: f64) -> Result<()> {
        let (reply, answer) = xch::bounded(1);
        self.send(Command::Start {
            profile,
            start_at_minutes,
            reply,
        })?;
        match answer.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(eyre::Report::new(e)),
            Err(_) => Err(eyre::Report::new(KilnError::State(
                "control thread exited".into(),
            ))),
        }
    }

    /// Abort the active run with outcome ABORTED.
    pub fn abort(&self) -> Result<()> {
        self.send(Command::Abort)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stream of non-idle cycle statuses, newest `STATUS_CAPACITY` kept.
    pub fn statuses(&self) -> &xch::Receiver<CycleStatus> {
        &self.status_rx
    }

    /// Stop cooldown capture directly, without waiting for the loop.
    pub fn stop_cooldown_capture(&self, session_id: Option<&str>) -> bool {
        self.cooldown.stop(session_id)
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.tx.send(cmd).map_err(|_| {
            eyre::Report::new(KilnError::State("control thread exited".into()))
        })
    }
}

impl Drop for OvenHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("control thread joined"),
                Err(e) => tracing::warn!(?e, "control thread panicked during shutdown"),
            }
        }
    }
}
