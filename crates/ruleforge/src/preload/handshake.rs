//! Request/response handoff between caller threads and the preload worker.
//!
//! One [`Handshake`] exists per worker run. It holds the worker state, a single
//! request slot, a single response slot, and the failure captured during startup.
//! Every field sits behind one mutex; three condition variables stand in for the
//! request-ready, response-ready, and started/ended signals.
//!
//! The slots are single-valued. Callers must not post a second request before the
//! first response is consumed; the coordinator guarantees this with its submit gate.

use crate::{Result, RuleError};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle state of the preload worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// No worker thread has been launched, or the last one was torn down.
    NotStarted,
    /// The worker thread is constructing its engine.
    Starting,
    /// The engine is built and the worker is waiting for requests.
    Ready,
    /// A stop was signalled; the worker exits after any in-flight request.
    StopRequested,
    /// The worker loop exited, failed to start, or was abandoned after a timeout.
    Ended,
}

impl WorkerState {
    /// Whether a worker thread may still be running in this state.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Ready | Self::StopRequested)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::StopRequested => "stop-requested",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

struct Slots<Req, Resp> {
    state: WorkerState,
    request: Option<Req>,
    response: Option<Result<Resp>>,
    failure: Option<RuleError>,
    in_flight: bool,
}

pub(crate) struct Handshake<Req, Resp> {
    slots: Mutex<Slots<Req, Resp>>,
    request_ready: Condvar,
    response_ready: Condvar,
    lifecycle: Condvar,
}

impl<Req, Resp> Handshake<Req, Resp> {
    /// A handshake for a worker that is about to be launched.
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                state: WorkerState::Starting,
                request: None,
                response: None,
                failure: None,
                in_flight: false,
            }),
            request_ready: Condvar::new(),
            response_ready: Condvar::new(),
            lifecycle: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.slots.lock().state
    }

    // Worker side.

    /// Signal "started". Returns `false` if the worker was abandoned meanwhile.
    pub(crate) fn mark_ready(&self) -> bool {
        let mut slots = self.slots.lock();
        if slots.state == WorkerState::Starting {
            slots.state = WorkerState::Ready;
        }
        self.lifecycle.notify_all();
        slots.state != WorkerState::Ended
    }

    /// Capture a startup failure and signal both "started" and "ended".
    pub(crate) fn fail_startup(&self, err: RuleError) {
        let mut slots = self.slots.lock();
        if slots.state != WorkerState::Ended {
            slots.failure = Some(err);
            slots.state = WorkerState::Ended;
        }
        self.lifecycle.notify_all();
        self.response_ready.notify_all();
    }

    /// Block until a request is posted or a stop is signalled.
    ///
    /// A stop wins over a pending request.
    pub(crate) fn next_request(&self) -> Option<Req> {
        let mut slots = self.slots.lock();
        loop {
            if matches!(slots.state, WorkerState::StopRequested | WorkerState::Ended) {
                return None;
            }
            if let Some(request) = slots.request.take() {
                slots.in_flight = true;
                return Some(request);
            }
            self.request_ready.wait(&mut slots);
        }
    }

    /// Publish the outcome of the in-flight request.
    ///
    /// Returns `false` when the worker has been abandoned; the outcome is dropped.
    pub(crate) fn publish_response(&self, outcome: Result<Resp>) -> bool {
        let mut slots = self.slots.lock();
        if slots.state == WorkerState::Ended {
            return false;
        }
        slots.response = Some(outcome);
        slots.in_flight = false;
        self.response_ready.notify_all();
        true
    }

    /// Fail the in-flight request and move towards `Ended`; the loop can't continue.
    pub(crate) fn fail_and_stop(&self, err: RuleError) {
        let mut slots = self.slots.lock();
        if slots.state == WorkerState::Ended {
            return;
        }
        slots.response = Some(Err(err));
        slots.in_flight = false;
        slots.state = WorkerState::StopRequested;
        self.response_ready.notify_all();
        self.lifecycle.notify_all();
    }

    /// Signal "ended". Last thing the worker thread does.
    pub(crate) fn mark_ended(&self) {
        let mut slots = self.slots.lock();
        slots.state = WorkerState::Ended;
        self.lifecycle.notify_all();
        self.response_ready.notify_all();
        self.request_ready.notify_all();
    }

    // Caller side.

    /// Block until the worker leaves `Starting`.
    pub(crate) fn wait_started(&self) -> WorkerState {
        let mut slots = self.slots.lock();
        while slots.state == WorkerState::Starting {
            self.lifecycle.wait(&mut slots);
        }
        slots.state
    }

    pub(crate) fn take_failure(&self) -> Option<RuleError> {
        self.slots.lock().failure.take()
    }

    /// Hand `request` to the worker.
    pub(crate) fn post_request(&self, request: Req) -> Result<()> {
        let mut slots = self.slots.lock();
        if slots.state != WorkerState::Ready {
            return Err(RuleError::WorkerNotReady(format!(
                "cannot submit while worker is {}",
                slots.state
            )));
        }
        if slots.request.is_some() || slots.in_flight {
            return Err(RuleError::Other(
                "A preload request is already in flight".to_string(),
            ));
        }
        slots.response = None;
        slots.request = Some(request);
        self.request_ready.notify_one();
        Ok(())
    }

    /// Block until the response to the posted request, or the worker's end, is signalled.
    pub(crate) fn wait_response(&self) -> Result<Resp> {
        let mut slots = self.slots.lock();
        loop {
            if let Some(outcome) = slots.response.take() {
                return outcome;
            }
            if slots.state == WorkerState::Ended {
                return Err(slots.failure.take().unwrap_or_else(|| {
                    RuleError::WorkerUnresponsive("worker ended before answering the request".to_string())
                }));
            }
            self.response_ready.wait(&mut slots);
        }
    }

    /// Signal the worker to stop. Returns the state observed before signalling.
    pub(crate) fn request_stop(&self) -> WorkerState {
        let mut slots = self.slots.lock();
        let previous = slots.state;
        if matches!(previous, WorkerState::Starting | WorkerState::Ready) {
            slots.state = WorkerState::StopRequested;
        }
        self.request_ready.notify_all();
        previous
    }

    /// Wait up to `timeout` for "ended". Returns whether it was signalled.
    pub(crate) fn wait_ended(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slots = self.slots.lock();
        while slots.state != WorkerState::Ended {
            if self.lifecycle.wait_until(&mut slots, deadline).timed_out() {
                return slots.state == WorkerState::Ended;
            }
        }
        true
    }

    /// Declare the worker ended without its cooperation.
    ///
    /// A caller blocked on the in-flight request is released with `WorkerUnresponsive`.
    pub(crate) fn force_end(&self, reason: &str) {
        let mut slots = self.slots.lock();
        if slots.state == WorkerState::Ended {
            return;
        }
        slots.state = WorkerState::Ended;
        slots.request = None;
        if slots.in_flight && slots.response.is_none() {
            slots.response = Some(Err(RuleError::WorkerUnresponsive(reason.to_string())));
            slots.in_flight = false;
        }
        self.lifecycle.notify_all();
        self.response_ready.notify_all();
        self.request_ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_request_response_roundtrip() {
        let handshake = Arc::new(Handshake::<u32, u32>::new());
        assert!(handshake.mark_ready());

        let worker = {
            let handshake = Arc::clone(&handshake);
            thread::spawn(move || {
                while let Some(request) = handshake.next_request() {
                    handshake.publish_response(Ok(request * 2));
                }
                handshake.mark_ended();
            })
        };

        handshake.post_request(21).unwrap();
        assert_eq!(handshake.wait_response().unwrap(), 42);

        handshake.request_stop();
        assert!(handshake.wait_ended(Duration::from_secs(5)));
        worker.join().unwrap();
    }

    #[test]
    fn test_stop_wins_over_pending_request() {
        let handshake = Handshake::<u32, u32>::new();
        handshake.mark_ready();
        handshake.post_request(1).unwrap();
        handshake.request_stop();

        assert!(handshake.next_request().is_none());
    }

    #[test]
    fn test_post_rejected_unless_ready() {
        let handshake = Handshake::<u32, u32>::new();
        assert!(matches!(handshake.post_request(1), Err(RuleError::WorkerNotReady(_))));

        handshake.mark_ready();
        handshake.post_request(1).unwrap();
        assert!(handshake.post_request(2).is_err());
    }

    #[test]
    fn test_startup_failure_signals_started_and_ended() {
        let handshake = Handshake::<u32, u32>::new();
        handshake.fail_startup(RuleError::preload("bad config"));

        assert_eq!(handshake.wait_started(), WorkerState::Ended);
        assert!(handshake.wait_ended(Duration::from_millis(1)));
        assert!(matches!(handshake.take_failure(), Some(RuleError::Preload { .. })));
        assert!(handshake.take_failure().is_none());
    }

    #[test]
    fn test_force_end_releases_blocked_caller() {
        let handshake = Arc::new(Handshake::<u32, u32>::new());
        handshake.mark_ready();
        handshake.post_request(5).unwrap();
        assert_eq!(handshake.next_request(), Some(5));

        let caller = {
            let handshake = Arc::clone(&handshake);
            thread::spawn(move || handshake.wait_response())
        };

        handshake.request_stop();
        assert!(!handshake.wait_ended(Duration::from_millis(20)));
        handshake.force_end("stop timed out");

        let outcome = caller.join().unwrap();
        assert!(matches!(outcome, Err(RuleError::WorkerUnresponsive(_))));
        assert!(!handshake.publish_response(Ok(10)));
    }

    #[test]
    fn test_worker_state_display() {
        assert_eq!(WorkerState::StopRequested.to_string(), "stop-requested");
        assert!(WorkerState::Ready.is_running());
        assert!(!WorkerState::Ended.is_running());
    }
}
