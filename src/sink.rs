//! Frame record persistence
//!
//! The data-port handler hands every decoded frame to a writer callback.
//! [`RecordWriter`] is the default backing for that callback: an
//! append-only byte sink over a file or stdout. Records are written in
//! arrival order; flushing is left to the OS except at shutdown.

use crate::error::Result;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Append-only sink for decoded frame records.
pub struct RecordWriter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl RecordWriter {
    /// Stream records to stdout.
    pub fn stdout() -> Self {
        Self {
            out: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    /// Create (truncate) a file and append records to it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)?;
        log::info!("Writing frame records to {}", path.as_ref().display());
        Ok(Self {
            out: Mutex::new(Box::new(file)),
        })
    }

    /// Append one record.
    pub fn write_record(&self, bytes: &[u8]) -> Result<()> {
        self.out.lock().write_all(bytes)?;
        Ok(())
    }

    /// Flush buffered output. Called once at shutdown.
    pub fn flush(&self) -> Result<()> {
        self.out.lock().flush()?;
        Ok(())
    }
}
