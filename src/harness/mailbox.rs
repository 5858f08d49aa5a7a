//! Single-slot request handoff between callers and the worker

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::backend::SourceUnit;
use crate::common::Error;

use super::pending::{PendingResult, ResultSender};
use super::worker::WorkerState;

/// A unit of work plus where its outcome goes
pub(crate) struct EvaluationRequest<V> {
    pub unit: SourceUnit,
    pub result: ResultSender<V>,
}

struct Slot<V> {
    request: Option<EvaluationRequest<V>>,
    done: bool,
    state: WorkerState,
}

/// Monitor guarding the request slot, the termination flag and the worker
/// state
pub(crate) struct RequestMailbox<V> {
    slot: Mutex<Slot<V>>,
    changed: Condvar,
}

impl<V> RequestMailbox<V> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                request: None,
                done: false,
                state: WorkerState::Starting,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<V>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a request without waiting for it to run
    ///
    /// An unclaimed earlier request is replaced; its result completes with
    /// [`Error::Superseded`]. Once the worker has stopped, the result
    /// completes with [`Error::WorkerStopped`] instead.
    pub fn submit(&self, unit: SourceUnit) -> PendingResult<V> {
        let mut slot = self.lock();
        if slot.state == WorkerState::Stopped {
            return PendingResult::ready(Err(Error::WorkerStopped));
        }

        let (result, pending) = PendingResult::channel();
        if let Some(replaced) = slot.request.replace(EvaluationRequest { unit, result }) {
            let name = replaced.unit.name().to_string();
            warn!(unit = %name, "unclaimed evaluation request replaced");
            let _ = replaced.result.send(Err(Error::Superseded(name)));
        }
        self.changed.notify_all();
        pending
    }

    /// Wait for the next request, or `None` once termination was requested
    ///
    /// A request already installed when termination is requested still
    /// runs; termination is only observed while idle.
    pub fn next(&self) -> Option<EvaluationRequest<V>> {
        let mut slot = self.lock();
        loop {
            if let Some(request) = slot.request.take() {
                slot.state = WorkerState::Executing;
                return Some(request);
            }
            if slot.done {
                slot.state = WorkerState::Terminating;
                return None;
            }
            slot.state = WorkerState::WaitingForWork;
            slot = self
                .changed
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Ask the worker to exit at its next idle checkpoint
    pub fn terminate(&self) {
        let mut slot = self.lock();
        slot.done = true;
        self.changed.notify_all();
    }

    /// Record that the worker is gone; anything still queued fails
    pub fn mark_stopped(&self) {
        let mut slot = self.lock();
        slot.done = true;
        slot.state = WorkerState::Stopped;
        if let Some(orphan) = slot.request.take() {
            let _ = orphan.result.send(Err(Error::WorkerStopped));
        }
        self.changed.notify_all();
    }

    pub fn state(&self) -> WorkerState {
        self.lock().state
    }
}
