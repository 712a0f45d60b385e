//! TI IWR1443 mmWave radar support
//!
//! The radar exposes two UARTs: a CLI port (115200 baud) that accepts
//! configuration commands and echoes responses, and a telemetry port
//! (921600 baud) that streams framed TLV data. [`ControlHandler`] relays
//! the CLI port's responses to the operator; [`DataHandler`] frames,
//! decodes and persists the telemetry stream.

mod decode;
mod framer;
pub mod protocol;

pub use decode::{decode_frame, render_frame, FrameRecord, TlvRecord};
pub use framer::FrameAccumulator;

use crate::endpoint::SerialHandler;
use std::io::Write;

/// Receives one rendered record per decoded frame.
pub type FrameSink = Box<dyn FnMut(&[u8]) + Send>;

/// CLI-port handler: echoes radar responses verbatim to the operator.
pub struct ControlHandler {
    out: Box<dyn Write + Send>,
}

impl ControlHandler {
    /// Echo to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }
}

impl Default for ControlHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialHandler for ControlHandler {
    fn on_read(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes).and_then(|_| self.out.flush()) {
            log::error!("Failed to echo radar response: {}", e);
        }
    }
}

/// Telemetry-port handler: accumulates bytes, extracts frames and hands
/// each rendered record to the sink.
pub struct DataHandler {
    accumulator: FrameAccumulator,
    sink: FrameSink,
    frame_count: u64,
    error_count: u64,
}

impl DataHandler {
    pub fn new(sink: FrameSink) -> Self {
        Self {
            accumulator: FrameAccumulator::new(),
            sink,
            frame_count: 0,
            error_count: 0,
        }
    }
}

impl SerialHandler for DataHandler {
    fn on_read(&mut self, bytes: &[u8]) {
        self.accumulator.push(bytes);

        while let Some(frame) = self.accumulator.next_frame() {
            match render_frame(&frame) {
                Ok(record) => {
                    self.frame_count += 1;
                    if self.frame_count % 1000 == 0 {
                        log::debug!(
                            "Decoded {} frames ({} dropped)",
                            self.frame_count,
                            self.error_count
                        );
                    }
                    (self.sink)(record.as_bytes());
                }
                Err(e) => {
                    self.error_count += 1;
                    log::error!("Dropping frame: {}", e);
                    // The bytes after a lying header are not trustworthy
                    // either; resync from the next read.
                    self.accumulator.clear();
                    break;
                }
            }
        }
    }
}
