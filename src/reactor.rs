//! Completion-driven I/O reactor
//!
//! The reactor owns a completion queue that multiplexes I/O completions
//! from every registered endpoint. Endpoint workers perform the actual
//! blocking I/O and post a tagged [`Completion`] when an operation
//! finishes; the single reactor thread dequeues completions and dispatches
//! each to the owning endpoint's `on_io_complete`. Because dispatch is
//! single-threaded, all callbacks for one endpoint are serialized without
//! the endpoint taking any lock of its own.
//!
//! Shutdown is in-band: [`Reactor::quit`] posts a sentinel completion
//! carrying [`QUIT_KEY`], which `run` observes and returns. Registration
//! keys are assigned from a counter starting at zero, so the sentinel can
//! never collide with a live endpoint key.

use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Reserved completion key requesting reactor shutdown.
pub const QUIT_KEY: usize = usize::MAX;

/// Distinguishes read from write completions.
///
/// Each operation is tagged at submission time; the tag travels with the
/// completion instead of being recovered from buffer identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
}

/// One completed I/O operation.
#[derive(Debug)]
pub struct Completion {
    /// Registration key of the owning endpoint.
    pub key: usize,
    /// Which kind of operation completed.
    pub kind: OpKind,
    /// Bytes transferred by a read; empty for writes.
    pub bytes: Vec<u8>,
}

/// An endpoint's handle onto the completion queue.
///
/// Handed to the endpoint at registration; workers clone it and post one
/// completion per finished operation.
#[derive(Clone)]
pub struct CompletionSink {
    key: usize,
    tx: Sender<Completion>,
}

impl CompletionSink {
    /// The endpoint's registration key.
    pub fn key(&self) -> usize {
        self.key
    }

    /// Post a completed operation to the reactor.
    pub fn post(&self, kind: OpKind, bytes: Vec<u8>) {
        let _ = self.tx.send(Completion {
            key: self.key,
            kind,
            bytes,
        });
    }
}

/// An endpoint that can be registered with the reactor.
pub trait AsyncHandle: Send + Sync {
    /// Called once at registration. The endpoint keeps the sink and
    /// typically arms its first read here.
    fn on_register(&self, sink: CompletionSink) -> Result<()>;

    /// Called by the reactor thread for every completion addressed to
    /// this endpoint.
    fn on_io_complete(&self, completion: Completion);
}

/// The reactor: completion queue plus endpoint registry.
pub struct Reactor {
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    endpoints: Mutex<HashMap<usize, Arc<dyn AsyncHandle>>>,
    next_key: AtomicUsize,
}

impl Reactor {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            endpoints: Mutex::new(HashMap::new()),
            next_key: AtomicUsize::new(0),
        }
    }

    /// Register an endpoint.
    ///
    /// Assigns the endpoint a completion key, records it in the registry
    /// and invokes `on_register` exactly once. A registered endpoint stays
    /// registered until the reactor is dropped.
    pub fn register(&self, endpoint: Arc<dyn AsyncHandle>) -> Result<usize> {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        assert_ne!(key, QUIT_KEY);

        self.endpoints.lock().insert(key, Arc::clone(&endpoint));

        let sink = CompletionSink {
            key,
            tx: self.tx.clone(),
        };
        if let Err(e) = endpoint.on_register(sink) {
            self.endpoints.lock().remove(&key);
            return Err(Error::Registration(format!(
                "endpoint {} failed to register: {}",
                key, e
            )));
        }

        log::debug!("Registered endpoint with completion key {}", key);
        Ok(key)
    }

    /// Dispatch completions until the quit sentinel arrives.
    ///
    /// Completions for one endpoint are delivered in dequeue order; across
    /// endpoints no order is guaranteed.
    pub fn run(&self) {
        loop {
            let completion = match self.rx.recv() {
                Ok(c) => c,
                // All senders gone; nothing can ever complete again.
                Err(_) => break,
            };

            if completion.key == QUIT_KEY {
                log::debug!("Reactor received quit sentinel");
                break;
            }

            let endpoint = self.endpoints.lock().get(&completion.key).cloned();
            match endpoint {
                Some(endpoint) => endpoint.on_io_complete(completion),
                None => log::warn!(
                    "Completion for unknown endpoint key {}. Ignored.",
                    completion.key
                ),
            }
        }
    }

    /// Request `run` to return. Safe to call from any thread; outstanding
    /// I/O is not cancelled.
    pub fn quit(&self) {
        let _ = self.tx.send(Completion {
            key: QUIT_KEY,
            kind: OpKind::Read,
            bytes: Vec::new(),
        });
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}
