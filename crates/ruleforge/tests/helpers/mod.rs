//! Shared fixtures for preload integration tests.
//!
//! [`RecordingFactory`] builds engines that log every lifecycle event, so tests can
//! assert on construction order, request overlap, and which configuration served a
//! request.

#![allow(dead_code)]

use parking_lot::Mutex;
use ruleforge::preload::{BlockedErrors, EngineFactory, PreloadEngine};
use ruleforge::{ConfigIdentity, Result, RuleError};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Constructed(String),
    LoadStarted(String),
    LoadFinished(String),
    Disposed(String),
}

/// Engine behavior switches, shared between the factory and every engine it builds.
#[derive(Default)]
pub struct Script {
    /// Identities whose construction fails
    pub fail_construct: HashSet<String>,
    /// Identities whose construction reports a blocked error but succeeds
    pub suppress_construct: HashSet<String>,
    /// Identities whose construction panics
    pub panic_construct: HashSet<String>,
    /// Delay applied to every load
    pub load_delay: Duration,
    /// Delay applied to every dispose, after the event is recorded
    pub dispose_delay: Duration,
}

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    threads: Mutex<HashSet<ThreadId>>,
    thread_names: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events.lock().iter().filter(|e| *e == wanted).count()
    }

    pub fn constructed(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Constructed(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Highest number of loads observed running at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn thread_names(&self) -> Vec<String> {
        self.thread_names.lock().clone()
    }

    /// Distinct threads that constructed or ran an engine.
    pub fn engine_threads(&self) -> usize {
        self.threads.lock().len()
    }

    /// Poll until `event` has been recorded or `timeout` passes.
    pub fn wait_for(&self, event: &Event, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count(event) > 0 {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    fn note_thread(&self) {
        let current = thread::current();
        self.threads.lock().insert(current.id());
        if let Some(name) = current.name() {
            self.thread_names.lock().push(name.to_string());
        }
    }
}

/// Answers `"<identity>|<request>"`.
///
/// Special requests: `"reject"` fails, `"blocked"` reports a suppressed error,
/// `"panic"` panics, and `"hang:<ms>"` sleeps that long before answering.
pub struct RecordingEngine {
    identity: String,
    recorder: Arc<Recorder>,
    delay: Duration,
    dispose_delay: Duration,
}

impl PreloadEngine for RecordingEngine {
    type Request = String;
    type Response = String;

    fn load(&mut self, request: String, blocked: &BlockedErrors) -> Result<String> {
        self.recorder.note_thread();
        self.recorder.record(Event::LoadStarted(request.clone()));

        let now_active = self.recorder.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.max_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        let outcome = match request.as_str() {
            "reject" => Err(RuleError::preload("request rejected")),
            "blocked" => {
                blocked.report("modal dialog suppressed");
                Ok(format!("{}|{}", self.identity, request))
            }
            "panic" => {
                self.recorder.active.fetch_sub(1, Ordering::SeqCst);
                panic!("engine corrupted");
            }
            other => {
                if let Some(ms) = other.strip_prefix("hang:").and_then(|ms| ms.parse().ok()) {
                    thread::sleep(Duration::from_millis(ms));
                }
                Ok(format!("{}|{}", self.identity, request))
            }
        };

        self.recorder.active.fetch_sub(1, Ordering::SeqCst);
        self.recorder.record(Event::LoadFinished(request));
        outcome
    }

    fn dispose(&mut self) -> Result<()> {
        self.recorder.record(Event::Disposed(self.identity.clone()));
        if !self.dispose_delay.is_zero() {
            thread::sleep(self.dispose_delay);
        }
        Ok(())
    }
}

pub struct RecordingFactory {
    pub recorder: Arc<Recorder>,
    pub script: Script,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::with_script(Script::default())
    }

    pub fn with_script(script: Script) -> Self {
        Self {
            recorder: Arc::new(Recorder::default()),
            script,
        }
    }
}

impl EngineFactory for RecordingFactory {
    type Engine = RecordingEngine;

    fn construct(&self, identity: &ConfigIdentity, blocked: &BlockedErrors) -> Result<RecordingEngine> {
        self.recorder.note_thread();
        let id = identity.to_string();

        if self.script.fail_construct.contains(&id) {
            return Err(RuleError::preload(format!("cannot open {}", id)));
        }
        if self.script.panic_construct.contains(&id) {
            panic!("engine for {} blew up during construction", id);
        }
        if self.script.suppress_construct.contains(&id) {
            blocked.report(format!("{} has an unknown attribute type", id));
        }

        self.recorder.record(Event::Constructed(id.clone()));
        Ok(RecordingEngine {
            identity: id,
            recorder: Arc::clone(&self.recorder),
            delay: self.script.load_delay,
            dispose_delay: self.script.dispose_delay,
        })
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
