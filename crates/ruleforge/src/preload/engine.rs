//! The preload engine seam.
//!
//! A preload engine is expensive to construct, keeps state between requests, and
//! must only ever be touched from the thread that built it. [`EngineFactory`] is
//! called on the worker thread, so engines are never required to be `Send`.

use crate::core::identity::ConfigIdentity;
use crate::{Result, RuleError};
use parking_lot::Mutex;
use std::sync::Arc;

/// A stateful, non-reentrant engine hosted by the preload worker.
pub trait PreloadEngine: 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Run one preload request.
    ///
    /// Errors the engine would normally surface to a user (dialogs, global error
    /// handlers) should be reported through `blocked` instead. Any report makes the
    /// request fail even when `load` returns `Ok`.
    fn load(&mut self, request: Self::Request, blocked: &BlockedErrors) -> Result<Self::Response>;

    /// Release engine resources. Called on the worker thread before it exits.
    fn dispose(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Builds engines for a configuration identity.
///
/// The factory is shared with the worker thread; `construct` runs there.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: PreloadEngine;

    fn construct(&self, identity: &ConfigIdentity, blocked: &BlockedErrors) -> Result<Self::Engine>;
}

/// Request type accepted by the engines a factory builds.
pub type EngineRequest<F> = <<F as EngineFactory>::Engine as PreloadEngine>::Request;

/// Response type produced by the engines a factory builds.
pub type EngineResponse<F> = <<F as EngineFactory>::Engine as PreloadEngine>::Response;

/// Side channel collecting errors an engine suppressed instead of raising.
///
/// Cloning shares the same buffer, so an engine can keep a copy wired into its own
/// error hooks.
#[derive(Debug, Clone, Default)]
pub struct BlockedErrors {
    messages: Arc<Mutex<Vec<String>>>,
}

impl BlockedErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("Preload engine blocked an error: {}", message);
        self.messages.lock().push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Drain collected messages.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }

    /// Turn an otherwise successful `outcome` into a failure if anything was reported.
    ///
    /// The buffer is drained either way, so the next operation starts clean.
    pub fn settle<T>(&self, outcome: Result<T>) -> Result<T> {
        let messages = self.take();
        match outcome {
            Ok(_) if !messages.is_empty() => Err(RuleError::Suppressed { messages }),
            Ok(value) => Ok(value),
            Err(err) => {
                if !messages.is_empty() {
                    tracing::debug!(
                        "Discarding {} blocked error(s) behind a raised error: {}",
                        messages.len(),
                        err
                    );
                }
                Err(err)
            }
        }
    }
}
