//! Serial endpoint with completion-based read/write discipline
//!
//! A [`SerialEndpoint`] owns one open serial device plus two worker
//! threads that perform the blocking I/O:
//!
//! - The **reader** worker reads only while armed. Arming happens once at
//!   registration and once per dispatched read completion, so the device
//!   sees at most one outstanding read at any time.
//! - The **writer** worker transmits one buffer per submission. The next
//!   queued buffer is submitted only after the previous write completion
//!   has been dispatched, so writes are serialized and globally FIFO.
//!
//! Both workers post tagged completions to the reactor's queue; all
//! handler callbacks (`on_read`, `on_write_complete`) therefore run on the
//! reactor thread. `async_write` may be called from any thread; the bytes
//! are copied into the queue under the write mutex, so callers may reuse
//! their buffer immediately.
//!
//! Runtime I/O failures are logged and the endpoint stays registered; a
//! later completion or fresh data recovers it.

use crate::error::Result;
use crate::reactor::{AsyncHandle, Completion, CompletionSink, OpKind};
use crate::transport::{SerialTransport, Transport};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Size of the reusable read buffer.
const READ_BUFFER_SIZE: usize = 4096;

/// How long idle workers wait before re-checking the shutdown flag.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Pause between polls while an armed read waits for inbound bytes.
const READ_POLL: Duration = Duration::from_millis(1);

/// Inbound-byte and write-completion consumer for one endpoint.
///
/// Callbacks run on the reactor thread. The byte slice passed to
/// `on_read` is only valid for the duration of the call; consume or copy
/// it synchronously.
pub trait SerialHandler: Send {
    /// Delivered when a read completes with at least one byte.
    fn on_read(&mut self, bytes: &[u8]);

    /// Delivered after each completed write buffer, before the queue head
    /// is popped.
    fn on_write_complete(&mut self) {}
}

/// One open serial device wired into the reactor.
pub struct SerialEndpoint {
    name: String,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    handler: Mutex<Box<dyn SerialHandler>>,
    write_queue: Mutex<VecDeque<Vec<u8>>>,
    writer_tx: Mutex<Option<Sender<Vec<u8>>>>,
    arm_tx: Mutex<Option<Sender<()>>>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SerialEndpoint {
    /// Wrap an already-open transport.
    pub fn new<T: Transport + 'static>(
        transport: T,
        name: &str,
        handler: Box<dyn SerialHandler>,
    ) -> Self {
        Self {
            name: name.to_string(),
            transport: Arc::new(Mutex::new(Box::new(transport) as Box<dyn Transport>)),
            handler: Mutex::new(handler),
            write_queue: Mutex::new(VecDeque::new()),
            writer_tx: Mutex::new(None),
            arm_tx: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Open a serial port and wrap it as an endpoint.
    pub fn open(port: &str, baud_rate: u32, handler: Box<dyn SerialHandler>) -> Result<Self> {
        let transport = SerialTransport::open(port, baud_rate)?;
        Ok(Self::new(transport, port, handler))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a copy of `data` for transmission.
    ///
    /// Buffers are transmitted whole and in submission order. If the queue
    /// transitions from empty to non-empty the write is started
    /// immediately; otherwise the pending write's completion starts it.
    pub fn async_write(&self, data: &[u8]) {
        let mut queue = self.write_queue.lock();
        queue.push_back(data.to_vec());

        if queue.len() == 1 {
            self.write_next_buffer(&queue);
        }
    }

    /// Arm the reader for the next (single) outstanding read.
    fn async_read(&self) {
        match self.arm_tx.lock().as_ref() {
            Some(tx) => {
                if tx.send(()).is_err() {
                    log::error!("{}: failed to arm read: reader worker is gone", self.name);
                }
            }
            None => log::warn!("{}: read armed before registration. Ignored.", self.name),
        }
    }

    /// Submit the queue head to the writer worker. Caller holds the queue
    /// lock, which is what keeps submissions single-file.
    fn write_next_buffer(&self, queue: &VecDeque<Vec<u8>>) {
        let Some(head) = queue.front() else {
            return;
        };

        match self.writer_tx.lock().as_ref() {
            Some(tx) => {
                if tx.send(head.clone()).is_err() {
                    log::error!("{}: failed to submit write: writer worker is gone", self.name);
                }
            }
            // Not registered yet; on_register drains the queue.
            None => log::debug!("{}: write queued before registration", self.name),
        }
    }

    /// Stop workers and wait for them to exit. Pending queue contents are
    /// discarded; the device itself closes when the endpoint is dropped.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        *self.arm_tx.lock() = None;
        *self.writer_tx.lock() = None;

        for worker in self.workers.lock().drain(..) {
            if worker.join().is_err() {
                log::error!("{}: worker thread panicked", self.name);
            }
        }
    }
}

impl AsyncHandle for SerialEndpoint {
    fn on_register(&self, sink: CompletionSink) -> Result<()> {
        let (arm_tx, arm_rx) = crossbeam_channel::unbounded();
        let (writer_tx, writer_rx) = crossbeam_channel::unbounded();

        {
            let reader_name = format!("{}-reader", self.name);
            let transport = Arc::clone(&self.transport);
            let shutdown = Arc::clone(&self.shutdown);
            let sink = sink.clone();
            let port = self.name.clone();
            let handle = thread::Builder::new()
                .name(reader_name)
                .spawn(move || reader_loop(&port, transport, arm_rx, sink, shutdown))?;
            self.workers.lock().push(handle);
        }

        {
            let writer_name = format!("{}-writer", self.name);
            let transport = Arc::clone(&self.transport);
            let shutdown = Arc::clone(&self.shutdown);
            let port = self.name.clone();
            let handle = thread::Builder::new()
                .name(writer_name)
                .spawn(move || writer_loop(&port, transport, writer_rx, sink, shutdown))?;
            self.workers.lock().push(handle);
        }

        *self.arm_tx.lock() = Some(arm_tx);
        *self.writer_tx.lock() = Some(writer_tx);

        // First read goes out as soon as the endpoint is registered.
        self.async_read();

        // Writes submitted before registration sit in the queue; kick the
        // head now that a worker exists.
        let queue = self.write_queue.lock();
        if !queue.is_empty() {
            self.write_next_buffer(&queue);
        }

        Ok(())
    }

    fn on_io_complete(&self, completion: Completion) {
        match completion.kind {
            OpKind::Read => {
                if !completion.bytes.is_empty() {
                    self.handler.lock().on_read(&completion.bytes);
                }
                self.async_read();
            }
            OpKind::Write => {
                self.handler.lock().on_write_complete();

                let mut queue = self.write_queue.lock();
                queue.pop_front();
                if !queue.is_empty() {
                    self.write_next_buffer(&queue);
                }
            }
        }
    }
}

impl Drop for SerialEndpoint {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reader worker: one blocking read per arm signal.
fn reader_loop(
    port: &str,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    arm_rx: Receiver<()>,
    sink: CompletionSink,
    shutdown: Arc<AtomicBool>,
) {
    log::debug!("{}: reader worker started", port);
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    'armed: loop {
        match arm_rx.recv_timeout(IDLE_WAIT) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        // One outstanding read: poll until bytes arrive, complete once.
        loop {
            if shutdown.load(Ordering::Relaxed) {
                break 'armed;
            }

            let mut transport = transport.lock();
            let available = match transport.available() {
                Ok(n) => n,
                Err(e) => {
                    drop(transport);
                    log::error!("{}: failed to query input queue: {}", port, e);
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }
            };

            if available == 0 {
                drop(transport);
                thread::sleep(READ_POLL);
                continue;
            }

            let want = available.min(READ_BUFFER_SIZE);
            match transport.read(&mut buffer[..want]) {
                Ok(0) => {
                    drop(transport);
                    thread::sleep(READ_POLL);
                }
                Ok(n) => {
                    drop(transport);
                    sink.post(OpKind::Read, buffer[..n].to_vec());
                    break;
                }
                Err(e) => {
                    drop(transport);
                    log::error!("{}: read failed: {}", port, e);
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }

    log::debug!("{}: reader worker exiting", port);
}

/// Writer worker: transmits one buffer per submission, then posts the
/// write completion that lets the endpoint release the next buffer.
fn writer_loop(
    port: &str,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    writer_rx: Receiver<Vec<u8>>,
    sink: CompletionSink,
    shutdown: Arc<AtomicBool>,
) {
    log::debug!("{}: writer worker started", port);

    loop {
        match writer_rx.recv_timeout(IDLE_WAIT) {
            Ok(buffer) => {
                let result = transport.lock().write_all(&buffer);
                if let Err(e) = result {
                    log::error!("{}: write failed: {}", port, e);
                }
                // The completion pops the queue head either way; a failed
                // buffer is not retried.
                sink.post(OpKind::Write, Vec::new());
            }
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::debug!("{}: writer worker exiting", port);
}
