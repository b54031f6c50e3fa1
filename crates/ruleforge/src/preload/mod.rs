//! Shared, single-threaded preload worker.
//!
//! Many rule objects, called from arbitrary threads, need to run requests against
//! one engine that is expensive to build and not safe to use from more than one
//! thread. This module hosts that engine on a dedicated worker thread and arbitrates
//! access to it:
//!
//! - [`PreloadCoordinator`] - one per process; owns the worker, tracks the loaded
//!   [`ConfigIdentity`](crate::core::identity::ConfigIdentity), counts clients, and
//!   serializes every request
//! - [`ClientHandle`] - one per rule object; acquire, submit, release
//! - [`WorkerContext`] - the worker thread lifecycle (start, clean stop, forced end)
//! - [`EngineFactory`] / [`PreloadEngine`] - the engine seam supplied by the caller
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted -> Starting -> Ready -> StopRequested -> Ended
//!                  |                                   ^
//!                  +-------- construction error -------+
//! ```
//!
//! `Ended` is only terminal until the next `acquire`, which launches a fresh run.
//! A stop that does not complete within `PreloaderConfig::stop_timeout_ms` marks
//! the run ended anyway and abandons its thread.

pub mod coordinator;
pub mod engine;
pub mod handle;
pub mod handshake;
pub mod worker;

pub use coordinator::PreloadCoordinator;
pub use engine::{BlockedErrors, EngineFactory, EngineRequest, EngineResponse, PreloadEngine};
pub use handle::{ClientHandle, HandleId};
pub use handshake::WorkerState;
pub use worker::{StopOutcome, WorkerContext};
