//! Process-wide arbitration of the shared preload worker.
//!
//! # Locking
//!
//! The coordinator uses two locks, always taken in this order:
//!
//! 1. `submit_gate` - held by every `submit` for the full request, and by
//!    `acquire` while it decides whether to restart. A restart therefore waits for
//!    the in-flight request and never interleaves with one.
//! 2. `state` - guards the worker, the loaded identity, and the client set. It is
//!    only held for bookkeeping and for bounded lifecycle waits.
//!
//! `release` takes only `state`. When the last client leaves while a request is
//! stuck in the engine, the stop still runs, and its timeout releases the stuck
//! submitter.

use super::engine::{EngineFactory, EngineRequest, EngineResponse};
use super::handle::{ClientHandle, HandleId};
use super::handshake::WorkerState;
use super::worker::{StopOutcome, WorkerContext};
use crate::core::config::PreloaderConfig;
use crate::core::identity::ConfigIdentity;
use crate::{Result, RuleError};
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::sync::Arc;

struct CoordinatorState<F: EngineFactory> {
    worker: WorkerContext<F>,
    clients: IndexSet<HandleId>,
}

/// Shares one preload worker between every client handle in the process.
///
/// Construct it once at startup and pass the `Arc` to each rule that needs it.
///
/// # Example
///
/// ```rust,no_run
/// use ruleforge::core::config::PreloaderConfig;
/// use ruleforge::core::identity::ConfigIdentity;
/// use ruleforge::preload::PreloadCoordinator;
/// # use ruleforge::preload::{BlockedErrors, EngineFactory, PreloadEngine};
/// # struct Noop;
/// # impl PreloadEngine for Noop {
/// #     type Request = String;
/// #     type Response = String;
/// #     fn load(&mut self, r: String, _: &BlockedErrors) -> ruleforge::Result<String> { Ok(r) }
/// # }
/// # struct NoopFactory;
/// # impl EngineFactory for NoopFactory {
/// #     type Engine = Noop;
/// #     fn construct(&self, _: &ConfigIdentity, _: &BlockedErrors) -> ruleforge::Result<Noop> { Ok(Noop) }
/// # }
///
/// let coordinator = PreloadCoordinator::new(NoopFactory, PreloaderConfig::default())?;
/// let handle = coordinator.client();
/// handle.acquire(&ConfigIdentity::from("/rules/verify.vcfg"))?;
/// let response = handle.submit("payload".to_string())?;
/// handle.release();
/// # Ok::<(), ruleforge::RuleError>(())
/// ```
pub struct PreloadCoordinator<F: EngineFactory> {
    submit_gate: Mutex<()>,
    state: Mutex<CoordinatorState<F>>,
}

impl<F: EngineFactory> PreloadCoordinator<F> {
    /// Create a coordinator. No worker is started until the first `acquire`.
    pub fn new(factory: F, config: PreloaderConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            submit_gate: Mutex::new(()),
            state: Mutex::new(CoordinatorState {
                worker: WorkerContext::new(Arc::new(factory), config),
                clients: IndexSet::new(),
            }),
        }))
    }

    /// Create a new client handle bound to this coordinator.
    pub fn client(self: &Arc<Self>) -> ClientHandle<F> {
        ClientHandle::new(Arc::clone(self))
    }

    /// Register `handle` and make sure the worker is ready for `identity`.
    ///
    /// A ready worker bound to a different identity is stopped and restarted; the
    /// last caller wins. Blocks until the worker is ready or has ended. On failure
    /// the captured startup error is returned and a handle registered by this call
    /// is removed again.
    pub fn acquire(&self, handle: HandleId, identity: &ConfigIdentity) -> Result<()> {
        let _gate = self.submit_gate.lock();
        let mut state = self.state.lock();

        let newly_registered = state.clients.insert(handle);

        let current = state.worker.state();
        if current == WorkerState::Ready {
            if state.worker.identity() == Some(identity) {
                return Ok(());
            }
            tracing::info!(
                "Reconfiguring preload worker from {} to {}",
                state.worker.identity().map(ConfigIdentity::as_str).unwrap_or("<none>"),
                identity
            );
        }

        match state.worker.start(identity.clone()) {
            Ok(()) => {
                tracing::debug!(
                    "Client {} acquired preload worker for {} ({} client(s))",
                    handle,
                    identity,
                    state.clients.len()
                );
                Ok(())
            }
            Err(err) => {
                if newly_registered {
                    state.clients.shift_remove(&handle);
                }
                tracing::error!("Preload worker failed to start for {}: {}", identity, err);
                Err(err)
            }
        }
    }

    /// Run `request` on the worker and return its response.
    ///
    /// Only one submit runs at a time across the whole process.
    pub fn submit(&self, handle: HandleId, request: EngineRequest<F>) -> Result<EngineResponse<F>> {
        let _gate = self.submit_gate.lock();

        let handshake = {
            let state = self.state.lock();
            if !state.clients.contains(&handle) {
                return Err(RuleError::NotAcquired(handle.to_string()));
            }
            state
                .worker
                .handshake()
                .ok_or_else(|| RuleError::WorkerNotReady("preload worker has not been started".to_string()))?
        };

        handshake.post_request(request)?;
        handshake.wait_response()
    }

    /// Deregister `handle`; stops the worker when the last handle leaves.
    ///
    /// Returns whether `handle` was registered. Repeated calls are no-ops.
    pub fn release(&self, handle: HandleId) -> bool {
        let mut state = self.state.lock();
        if !state.clients.shift_remove(&handle) {
            return false;
        }

        if state.clients.is_empty() {
            match state.worker.stop() {
                StopOutcome::Forced => {
                    tracing::error!("Last client {} released; preload worker had to be abandoned", handle)
                }
                outcome => tracing::debug!("Last client {} released; preload worker stop: {:?}", handle, outcome),
            }
        }
        true
    }

    pub fn worker_state(&self) -> WorkerState {
        self.state.lock().worker.state()
    }

    /// Identity of the engine currently serving requests.
    pub fn loaded_identity(&self) -> Option<ConfigIdentity> {
        self.state.lock().worker.identity().cloned()
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }
}
