//! Ruleforge - Attribute Extraction Rule Library
//!
//! Ruleforge provides rule objects that post-process the attributes extracted from
//! documents. Its centerpiece is a preload coordinator: many rule objects, called
//! from many threads, share one single-threaded preload engine running on a
//! dedicated worker thread.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ruleforge::preload::{BlockedErrors, EngineFactory, PreloadEngine};
//! use ruleforge::{ConfigIdentity, PreloadCoordinator, RuleforgeConfig};
//!
//! struct Passthrough;
//!
//! impl PreloadEngine for Passthrough {
//!     type Request = String;
//!     type Response = String;
//!
//!     fn load(&mut self, request: String, _blocked: &BlockedErrors) -> ruleforge::Result<String> {
//!         Ok(request)
//!     }
//! }
//!
//! struct PassthroughFactory;
//!
//! impl EngineFactory for PassthroughFactory {
//!     type Engine = Passthrough;
//!
//!     fn construct(&self, _identity: &ConfigIdentity, _blocked: &BlockedErrors) -> ruleforge::Result<Passthrough> {
//!         Ok(Passthrough)
//!     }
//! }
//!
//! # fn main() -> ruleforge::Result<()> {
//! let config = RuleforgeConfig::discover()?.unwrap_or_default();
//! let coordinator = PreloadCoordinator::new(PassthroughFactory, config.preload)?;
//!
//! let handle = coordinator.client();
//! handle.acquire(&ConfigIdentity::from_path("verify.vcfg")?)?;
//! let response = handle.submit("Invoice".to_string())?;
//! handle.release();
//! # let _ = response;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Core Module** (`core`): configuration loading and configuration identities
//! - **Preload** (`preload`): worker thread, handshake, and the cross-thread coordinator
//! - **Plugin System** (`plugins`): rule traits, the rule registry, and the built-in preloader rule

#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod plugins;
pub mod preload;
pub mod types;

pub use error::{Result, RuleError};
pub use types::*;

pub use core::config::{PreloaderConfig, RuleforgeConfig};
pub use core::identity::{ConfigIdentity, expand_path_tags};

pub use preload::{ClientHandle, PreloadCoordinator, StopOutcome, WorkerState};

pub use plugins::registry::{RuleRegistry, get_rule_registry};
