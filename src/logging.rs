//! Buffered log backend for the `log` facade
//!
//! All modules log through `log::info!` and friends; this module provides
//! the process-wide sink behind them. Messages are appended to an internal
//! buffer under a mutex and written out in batches: the buffer is swapped
//! out while locked and persisted after the lock is released, so slow
//! writers never stall logging threads. Error-severity messages force an
//! immediate flush.
//!
//! The persistence backend is pluggable via [`LogWriter`]; the default
//! writes to stderr. Logging is best-effort throughout: a failing writer
//! never aborts the program.

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::OnceLock;

const BUFFER_SIZE: usize = 4096;
const FLUSH_SIZE: usize = BUFFER_SIZE - 256;

/// Persistence backend for log output.
///
/// Multiple threads may trigger writes concurrently; calls are serialized
/// by the logger.
pub trait LogWriter: Send {
    fn write(&mut self, data: &[u8]);
}

/// Default writer: stderr.
struct StderrWriter;

impl LogWriter for StderrWriter {
    fn write(&mut self, data: &[u8]) {
        let _ = std::io::stderr().write_all(data);
    }
}

/// Buffered, severity-filtered logger.
pub struct BufferedLogger {
    filter: Mutex<LevelFilter>,
    buffer: Mutex<String>,
    writer: Mutex<Box<dyn LogWriter>>,
}

impl BufferedLogger {
    fn new(filter: LevelFilter) -> Self {
        Self {
            filter: Mutex::new(filter),
            buffer: Mutex::new(String::with_capacity(BUFFER_SIZE)),
            writer: Mutex::new(Box::new(StderrWriter)),
        }
    }

    /// Replace the persistence backend. Already-buffered messages go to the
    /// new writer on the next flush.
    pub fn set_writer(&self, writer: Box<dyn LogWriter>) {
        *self.writer.lock() = writer;
    }

    /// Change the severity filter.
    pub fn set_level(&self, filter: LevelFilter) {
        *self.filter.lock() = filter;
        log::set_max_level(filter);
    }

    fn persist(&self, data: &str) {
        if !data.is_empty() {
            self.writer.lock().write(data.as_bytes());
        }
    }

    /// Write any buffered residue out.
    pub fn flush_buffer(&self) {
        let pending = {
            let mut buffer = self.buffer.lock();
            std::mem::replace(&mut *buffer, String::with_capacity(BUFFER_SIZE))
        };
        self.persist(&pending);
    }
}

impl log::Log for BufferedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= *self.filter.lock()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let thread = std::thread::current();

        // Swap the buffer out while locked; persist after unlocking.
        let pending = {
            let mut buffer = self.buffer.lock();
            let _ = write!(
                buffer,
                "{:?} {} [{}] {}\n",
                thread.id(),
                timestamp,
                record.level(),
                record.args()
            );

            if buffer.len() >= FLUSH_SIZE || record.level() <= Level::Error {
                Some(std::mem::replace(
                    &mut *buffer,
                    String::with_capacity(BUFFER_SIZE),
                ))
            } else {
                None
            }
        };

        if let Some(pending) = pending {
            self.persist(&pending);
        }
    }

    fn flush(&self) {
        self.flush_buffer();
    }
}

impl Drop for BufferedLogger {
    fn drop(&mut self) {
        self.flush_buffer();
    }
}

static LOGGER: OnceLock<BufferedLogger> = OnceLock::new();

/// Install the buffered logger as the process-wide `log` backend.
pub fn init(filter: LevelFilter) -> crate::error::Result<()> {
    let logger = LOGGER.get_or_init(|| BufferedLogger::new(filter));
    log::set_logger(logger)
        .map_err(|e| crate::error::Error::Other(format!("Failed to install logger: {}", e)))?;
    log::set_max_level(filter);
    Ok(())
}

/// Replace the installed logger's persistence backend.
pub fn set_writer(writer: Box<dyn LogWriter>) {
    if let Some(logger) = LOGGER.get() {
        logger.set_writer(writer);
    }
}

/// Flush any buffered residue. Call before process exit.
pub fn flush() {
    if let Some(logger) = LOGGER.get() {
        logger.flush_buffer();
    }
}
