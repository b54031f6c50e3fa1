//! Per-rule registration with the preload coordinator.

use super::coordinator::PreloadCoordinator;
use super::engine::{EngineFactory, EngineRequest, EngineResponse};
use crate::Result;
use crate::core::identity::ConfigIdentity;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of one client handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0.simple())
    }
}

/// One consumer's registration with a [`PreloadCoordinator`].
///
/// Each rule object owns exactly one handle. The handle is released when
/// [`release`](Self::release) is called or when it is dropped, whichever comes
/// first; releasing twice has no effect.
pub struct ClientHandle<F: EngineFactory> {
    id: HandleId,
    coordinator: Arc<PreloadCoordinator<F>>,
    acquired: Mutex<Option<ConfigIdentity>>,
}

impl<F: EngineFactory> ClientHandle<F> {
    pub fn new(coordinator: Arc<PreloadCoordinator<F>>) -> Self {
        Self {
            id: HandleId::new(),
            coordinator,
            acquired: Mutex::new(None),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Identity held by this handle. Cleared by `release` and by a failed `acquire`.
    pub fn acquired_identity(&self) -> Option<ConfigIdentity> {
        self.acquired.lock().clone()
    }

    /// Make sure the shared worker is running `identity`.
    ///
    /// Cheap when the worker already runs `identity`. Otherwise the worker is
    /// (re)started, which affects every other handle too.
    pub fn acquire(&self, identity: &ConfigIdentity) -> Result<()> {
        // Held across the coordinator call so a concurrent `release` lands after it.
        let mut acquired = self.acquired.lock();
        match self.coordinator.acquire(self.id, identity) {
            Ok(()) => {
                *acquired = Some(identity.clone());
                Ok(())
            }
            Err(err) => {
                *acquired = None;
                Err(err)
            }
        }
    }

    /// Run one preload request on the shared worker.
    pub fn submit(&self, request: EngineRequest<F>) -> Result<EngineResponse<F>> {
        self.coordinator.submit(self.id, request)
    }

    /// Deregister from the coordinator. Safe to call repeatedly.
    pub fn release(&self) {
        let mut acquired = self.acquired.lock();
        acquired.take();
        if self.coordinator.release(self.id) {
            tracing::debug!("Released {}", self.id);
        }
    }
}

impl<F: EngineFactory> Drop for ClientHandle<F> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<F: EngineFactory> fmt::Debug for ClientHandle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("acquired", &*self.acquired.lock())
            .finish()
    }
}
