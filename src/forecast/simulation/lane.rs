//! Background simulation lane.
//!
//! A simulation runs on a blocking worker so async callers are never stalled
//! by thousands of simulated days. The caller gets a [`LaneHandle`] with an
//! event stream and a cancel switch.
//!
//! Event order per run id: zero or more `Progress` with strictly increasing
//! `done`, then exactly one terminal `Done`, `Cancelled` or `Error`. A panic in
//! the worker is reported as `Error`, never as `Cancelled`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::engine::{simulate_with, CancelFlag, RunStatus, SimulationInput, SimulationOutcome};
use crate::errors::{ForecastError, LaneError};
use crate::prelude::Result;

/// One message from the lane.
#[derive(Debug, Clone)]
pub struct LaneEvent {
    pub run_id: u64,
    pub kind: LaneEventKind,
}

#[derive(Debug, Clone)]
pub enum LaneEventKind {
    Progress { done: usize, total: usize },
    Done(Box<SimulationOutcome>),
    /// Cancelled after `completed` runs; carries the partial aggregate
    Cancelled { completed: usize, partial: Box<SimulationOutcome> },
    /// The job failed or panicked
    Error { message: String, panicked: bool },
}

impl LaneEventKind {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LaneEventKind::Progress { .. })
    }
}

/// How a lane run ended, as seen by [`LaneHandle::finish`].
#[derive(Debug, Clone)]
pub enum LaneResult {
    Done(SimulationOutcome),
    Cancelled(SimulationOutcome),
}

/// Handle to a running lane.
#[derive(Debug)]
pub struct LaneHandle {
    run_id: u64,
    cancel: CancelFlag,
    events: UnboundedReceiver<LaneEvent>,
    worker: JoinHandle<()>,
}

impl LaneHandle {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Request cooperative cancellation. The in-flight run still finishes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Next event, or `None` once the worker has hung up.
    pub async fn next_event(&mut self) -> Option<LaneEvent> {
        self.events.recv().await
    }

    /// Drain events until the terminal one, invoking `on_progress` on the way.
    pub async fn finish_with<F>(mut self, mut on_progress: F) -> Result<LaneResult>
    where
        F: FnMut(usize, usize),
    {
        while let Some(event) = self.events.recv().await {
            match event.kind {
                LaneEventKind::Progress { done, total } => on_progress(done, total),
                LaneEventKind::Done(outcome) => return Ok(LaneResult::Done(*outcome)),
                LaneEventKind::Cancelled { partial, .. } => {
                    return Ok(LaneResult::Cancelled(*partial))
                }
                LaneEventKind::Error { message, panicked } => {
                    let err = if panicked {
                        LaneError::Panicked(message)
                    } else {
                        LaneError::Failed(message)
                    };
                    return Err(ForecastError::Lane(err));
                }
            }
        }
        // No terminal event: surface the worker's join failure if there is one.
        match self.worker.await {
            Err(e) => Err(ForecastError::Lane(LaneError::Join(e.to_string()))),
            Ok(()) => Err(ForecastError::Lane(LaneError::ChannelClosed)),
        }
    }

    pub async fn finish(self) -> Result<LaneResult> {
        self.finish_with(|_, _| {}).await
    }
}

/// Spawns simulations on the blocking pool.
pub struct SimulationLane;

impl SimulationLane {
    /// Run `simulate_with(input)` in the background. Must be called inside a
    /// tokio runtime.
    pub fn spawn(run_id: u64, input: SimulationInput) -> LaneHandle {
        Self::spawn_job(run_id, move |cancel, progress| simulate_with(&input, cancel, progress))
    }

    /// Run an arbitrary simulation job under the lane protocol.
    pub fn spawn_job<J>(run_id: u64, job: J) -> LaneHandle
    where
        J: FnOnce(&CancelFlag, &mut dyn FnMut(usize, usize)) -> Result<SimulationOutcome>
            + Send
            + 'static,
    {
        let (tx, rx) = unbounded_channel();
        let cancel = CancelFlag::new();
        let worker_cancel = cancel.clone();

        let worker = tokio::task::spawn_blocking(move || {
            info!(run_id, "Simulation lane started");
            let progress_tx = tx.clone();
            let progress_cancel = worker_cancel.clone();
            let mut on_progress = move |done: usize, total: usize| {
                let event = LaneEvent {
                    run_id,
                    kind: LaneEventKind::Progress { done, total },
                };
                if progress_tx.send(event).is_err() {
                    // Nobody is listening; stop at the next run boundary.
                    progress_cancel.cancel();
                }
            };

            let result = panic::catch_unwind(AssertUnwindSafe(|| job(&worker_cancel, &mut on_progress)));
            let kind = match result {
                Ok(Ok(outcome)) => match outcome.status {
                    RunStatus::Complete => LaneEventKind::Done(Box::new(outcome)),
                    RunStatus::Cancelled { completed } => LaneEventKind::Cancelled {
                        completed,
                        partial: Box::new(outcome),
                    },
                },
                Ok(Err(e)) => {
                    warn!(run_id, error = %e, "Simulation lane failed");
                    LaneEventKind::Error {
                        message: e.to_string(),
                        panicked: false,
                    }
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(run_id, %message, "Simulation lane panicked");
                    LaneEventKind::Error {
                        message,
                        panicked: true,
                    }
                }
            };
            send_terminal(&tx, run_id, kind);
        });

        LaneHandle {
            run_id,
            cancel,
            events: rx,
            worker,
        }
    }
}

fn send_terminal(tx: &UnboundedSender<LaneEvent>, run_id: u64, kind: LaneEventKind) {
    if tx.send(LaneEvent { run_id, kind }).is_err() {
        debug!(run_id, "Lane receiver dropped before terminal event");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("simulation panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("simulation panicked: {s}")
    } else {
        "simulation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::metrics::MetricVector;
    use crate::forecast::simulation::settings::SimulationSettings;

    fn input(count: usize) -> SimulationInput {
        SimulationInput::new(MetricVector::neutral()).with_settings(
            SimulationSettings::default()
                .with_horizon_days(7)
                .with_simulation_count(count),
        )
    }

    #[tokio::test]
    async fn test_lane_progress_then_done() {
        let mut handle = SimulationLane::spawn(1, input(50));
        let mut last_done = 0;
        let mut terminal = None;
        while let Some(event) = handle.next_event().await {
            assert_eq!(event.run_id, 1);
            assert!(terminal.is_none(), "event after terminal");
            match event.kind {
                LaneEventKind::Progress { done, total } => {
                    assert_eq!(total, 50);
                    assert!(done > last_done);
                    last_done = done;
                }
                other => terminal = Some(other),
            }
        }
        assert_eq!(last_done, 50);
        match terminal {
            Some(LaneEventKind::Done(outcome)) => assert!(outcome.status.is_complete()),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lane_matches_direct_call() {
        let direct = crate::forecast::simulation::engine::simulate(&input(25)).unwrap();
        match SimulationLane::spawn(2, input(25)).finish().await.unwrap() {
            LaneResult::Done(outcome) => assert_eq!(outcome, direct),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lane_cancel_is_distinct() {
        let handle = SimulationLane::spawn_job(3, |cancel, progress| {
            let flag = cancel.clone();
            simulate_with(&input(100), cancel, |done, total| {
                progress(done, total);
                if done == 5 {
                    flag.cancel();
                }
            })
        });
        match handle.finish().await.unwrap() {
            LaneResult::Cancelled(partial) => {
                assert_eq!(partial.status, RunStatus::Cancelled { completed: 5 });
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lane_panic_is_error_not_cancel() {
        let handle = SimulationLane::spawn_job(4, |_, _| panic!("boom"));
        let err = handle.finish().await.unwrap_err();
        assert!(matches!(err, ForecastError::Lane(LaneError::Panicked(ref m)) if m.contains("boom")));
    }

    #[tokio::test]
    async fn test_lane_invalid_settings_is_error() {
        let handle = SimulationLane::spawn(5, input(33));
        let err = handle.finish().await.unwrap_err();
        assert!(matches!(err, ForecastError::Lane(LaneError::Failed(_))));
    }
}
