//! The dedicated preload worker thread.
//!
//! [`WorkerContext`] owns at most one worker run at a time. A run builds the engine
//! on its own thread, serves requests from the handshake until told to stop, then
//! disposes the engine and signals "ended". The context is reused across runs:
//! every `start` launches a fresh thread with a fresh handshake, so a run that had
//! to be abandoned can never touch the state of its successor.

use super::engine::{BlockedErrors, EngineFactory, EngineRequest, EngineResponse, PreloadEngine};
use super::handshake::{Handshake, WorkerState};
use crate::core::config::PreloaderConfig;
use crate::core::identity::ConfigIdentity;
use crate::{Result, RuleError};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type WorkerHandshake<F> = Handshake<EngineRequest<F>, EngineResponse<F>>;

/// How a stop completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    NotRunning,
    /// The worker observed the stop signal and exited.
    Clean,
    /// The worker did not exit in time and was abandoned.
    Forced,
}

struct WorkerRun<F: EngineFactory> {
    identity: ConfigIdentity,
    handshake: Arc<WorkerHandshake<F>>,
    thread: Option<JoinHandle<()>>,
}

/// Owner of the preload worker thread and the engine living on it.
pub struct WorkerContext<F: EngineFactory> {
    factory: Arc<F>,
    config: PreloaderConfig,
    run: Option<WorkerRun<F>>,
}

impl<F: EngineFactory> WorkerContext<F> {
    pub fn new(factory: Arc<F>, config: PreloaderConfig) -> Self {
        Self {
            factory,
            config,
            run: None,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.run
            .as_ref()
            .map_or(WorkerState::NotStarted, |run| run.handshake.state())
    }

    /// Identity of the engine currently serving requests, if the worker is ready.
    pub fn identity(&self) -> Option<&ConfigIdentity> {
        self.run
            .as_ref()
            .filter(|run| run.handshake.state() == WorkerState::Ready)
            .map(|run| &run.identity)
    }

    pub(crate) fn handshake(&self) -> Option<Arc<WorkerHandshake<F>>> {
        self.run.as_ref().map(|run| Arc::clone(&run.handshake))
    }

    /// Launch a worker bound to `identity` and block until it is ready or has ended.
    ///
    /// Any previous run is stopped first. On failure the captured startup error is
    /// returned and the context is left with an ended run.
    pub fn start(&mut self, identity: ConfigIdentity) -> Result<()> {
        self.stop();

        let handshake: Arc<WorkerHandshake<F>> = Arc::new(Handshake::new());

        let mut builder = thread::Builder::new().name(self.config.worker_thread_name.clone());
        if let Some(stack_size) = self.config.worker_stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread = {
            let factory = Arc::clone(&self.factory);
            let handshake = Arc::clone(&handshake);
            let identity = identity.clone();
            builder
                .spawn(move || run_worker(factory.as_ref(), &identity, &handshake))
                .map_err(|e| RuleError::preload_with_source("Failed to spawn preload worker thread", e))?
        };

        tracing::debug!("Preload worker starting for {}", identity);

        let state = handshake.wait_started();
        let failure = (state != WorkerState::Ready).then(|| {
            handshake
                .take_failure()
                .unwrap_or_else(|| RuleError::WorkerNotReady(format!("worker is {} after startup", state)))
        });

        self.run = Some(WorkerRun {
            identity,
            handshake,
            thread: Some(thread),
        });

        match failure {
            None => Ok(()),
            Some(err) => {
                self.reap();
                Err(err)
            }
        }
    }

    /// Stop the current run, waiting at most the configured stop timeout.
    ///
    /// The stopped run stays in place in the `Ended` state until the next `start`.
    ///
    /// A worker that does not exit in time is abandoned: the run is marked ended,
    /// any blocked caller is released with `WorkerUnresponsive`, and the thread is
    /// detached.
    pub fn stop(&mut self) -> StopOutcome {
        let Some(run) = self.run.as_mut() else {
            return StopOutcome::NotRunning;
        };

        if run.handshake.request_stop() == WorkerState::Ended {
            join_worker(run);
            return StopOutcome::NotRunning;
        }

        let timeout = self.config.stop_timeout();
        if run.handshake.wait_ended(timeout) {
            join_worker(run);
            tracing::debug!("Preload worker for {} stopped", run.identity);
            return StopOutcome::Clean;
        }

        run.handshake
            .force_end(&format!("worker did not stop within {} ms", timeout.as_millis()));
        // Detach; the thread is left to finish or hang on its own.
        drop(run.thread.take());
        tracing::error!(
            "Preload worker for {} did not stop within {} ms and was abandoned",
            run.identity,
            timeout.as_millis()
        );
        StopOutcome::Forced
    }

    /// Join the thread of a run that already ended on its own.
    fn reap(&mut self) {
        if let Some(run) = self.run.as_mut()
            && run.handshake.state() == WorkerState::Ended
        {
            join_worker(run);
        }
    }
}

impl<F: EngineFactory> Drop for WorkerContext<F> {
    fn drop(&mut self) {
        if self.stop() == StopOutcome::Forced {
            tracing::warn!("Preload worker abandoned during teardown");
        }
    }
}

fn join_worker<F: EngineFactory>(run: &mut WorkerRun<F>) {
    if let Some(thread) = run.thread.take()
        && let Err(panic) = thread.join()
    {
        tracing::error!(
            "Preload worker thread for {} panicked: {}",
            run.identity,
            panic_reason(&panic)
        );
    }
}

fn run_worker<F: EngineFactory>(factory: &F, identity: &ConfigIdentity, handshake: &WorkerHandshake<F>) {
    let blocked = BlockedErrors::new();

    let constructed = catch_unwind(AssertUnwindSafe(|| factory.construct(identity, &blocked))).unwrap_or_else(|panic| {
        Err(RuleError::preload(format!(
            "Preload engine construction panicked: {}",
            panic_reason(&panic)
        )))
    });

    let mut engine = match constructed {
        Ok(mut engine) if !blocked.is_empty() => {
            dispose_engine(&mut engine, identity);
            let err = RuleError::Suppressed {
                messages: blocked.take(),
            };
            tracing::error!("Preload engine for {} failed to start: {}", identity, err);
            handshake.fail_startup(err);
            return;
        }
        Ok(engine) => engine,
        Err(err) => {
            blocked.take();
            tracing::error!("Preload engine for {} failed to start: {}", identity, err);
            handshake.fail_startup(err);
            return;
        }
    };

    if handshake.mark_ready() {
        tracing::debug!("Preload worker ready for {}", identity);
        serve(&mut engine, &blocked, handshake);
    }

    dispose_engine(&mut engine, identity);
    handshake.mark_ended();
}

fn serve<E: PreloadEngine>(engine: &mut E, blocked: &BlockedErrors, handshake: &Handshake<E::Request, E::Response>) {
    while let Some(request) = handshake.next_request() {
        match catch_unwind(AssertUnwindSafe(|| engine.load(request, blocked))) {
            Ok(outcome) => {
                if !handshake.publish_response(blocked.settle(outcome)) {
                    break;
                }
            }
            Err(panic) => {
                blocked.take();
                let err = RuleError::preload(format!(
                    "Preload engine panicked while loading: {}",
                    panic_reason(&panic)
                ));
                tracing::error!("{}; stopping worker", err);
                handshake.fail_and_stop(err);
                break;
            }
        }
    }
}

fn dispose_engine<E: PreloadEngine>(engine: &mut E, identity: &ConfigIdentity) {
    match catch_unwind(AssertUnwindSafe(|| engine.dispose())) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!("Failed to dispose preload engine for {}: {}", identity, err),
        Err(panic) => tracing::warn!(
            "Preload engine for {} panicked during dispose: {}",
            identity,
            panic_reason(&panic)
        ),
    }
}

fn panic_reason(panic: &Box<dyn Any + Send + 'static>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
