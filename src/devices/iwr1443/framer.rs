//! Resynchronizing frame accumulator
//!
//! Telemetry bytes arrive in arbitrary chunks with no alignment to frame
//! boundaries, and the stream may begin mid-frame after the radar is
//! already running. The accumulator appends whatever arrives, locates the
//! 8-byte magic, waits until `packetLength` bytes are buffered and then
//! yields the complete frame. Only the frame's own bytes are drained, so
//! two frames landing in one read both decode.
//!
//! Resync rules:
//! - No magic anywhere a header could start: the buffer is garbage, drop
//!   it all and wait for more.
//! - Magic found mid-buffer: discard the leading bytes.
//! - Magic found but the declared `packetLength` is implausible (smaller
//!   than the header or beyond [`MAX_PACKET_LENGTH`]): skip one byte past
//!   the magic and re-scan.

use super::protocol::{read_u32, FRAME_HEADER_SIZE, FRAME_MAGIC};

/// Upper bound on a credible `packetLength`. Real frames are a few KB;
/// anything past this is a corrupted header, not a frame worth waiting
/// for.
const MAX_PACKET_LENGTH: usize = 65536;

/// Append-only byte accumulator that yields whole frames.
#[derive(Default)]
pub struct FrameAccumulator {
    buffer: Vec<u8>,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Try to extract the next complete frame.
    ///
    /// Returns the frame's `packetLength` bytes, magic included, and
    /// drains exactly those bytes. `None` means more input is needed (or
    /// the buffer was garbage and has been dropped).
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.buffer.len() < FRAME_HEADER_SIZE {
                return None;
            }

            let Some(offset) = self.find_magic() else {
                // Nowhere a header could start; resync from scratch.
                self.buffer.clear();
                return None;
            };

            if offset > 0 {
                self.buffer.drain(..offset);
            }

            let packet_length = read_u32(&self.buffer, 12) as usize;
            if packet_length < FRAME_HEADER_SIZE || packet_length > MAX_PACKET_LENGTH {
                log::warn!(
                    "Implausible packetLength {} after magic, skipping one byte",
                    packet_length
                );
                self.buffer.drain(..1);
                continue;
            }

            if self.buffer.len() < packet_length {
                // Frame located, waiting for the rest of it.
                return None;
            }

            let frame = self.buffer[..packet_length].to_vec();
            self.buffer.drain(..packet_length);
            return Some(frame);
        }
    }

    /// Scan for the magic at every position where a full header could
    /// still fit.
    fn find_magic(&self) -> Option<usize> {
        let window = self.buffer.len() - FRAME_HEADER_SIZE + 1;
        (0..window).find(|&i| self.buffer[i..i + FRAME_MAGIC.len()] == FRAME_MAGIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal frame: header plus raw TLV bytes.
    fn frame(tlv_bytes: &[u8]) -> Vec<u8> {
        let packet_length = (FRAME_HEADER_SIZE + tlv_bytes.len()) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(&FRAME_MAGIC);
        for value in [3u32, packet_length, 0x16, 7, 1000, 0, 0] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(tlv_bytes);
        out
    }

    #[test]
    fn test_whole_frame_in_one_push() {
        let bytes = frame(&[0xAB; 8]);
        let mut acc = FrameAccumulator::new();

        acc.push(&bytes);
        assert_eq!(acc.next_frame(), Some(bytes));
        assert_eq!(acc.len(), 0);
    }

    #[test]
    fn test_leading_garbage_discarded() {
        let bytes = frame(&[0xAB; 8]);
        let mut acc = FrameAccumulator::new();

        acc.push(&[0xDE, 0xAD, 0xBE, 0xEF]);
        acc.push(&bytes);
        assert_eq!(acc.next_frame(), Some(bytes));
    }

    #[test]
    fn test_split_delivery_byte_at_a_time() {
        let bytes = frame(&[0xAB; 8]);
        let mut acc = FrameAccumulator::new();

        let mut frames = Vec::new();
        for &byte in &bytes {
            acc.push(&[byte]);
            while let Some(f) = acc.next_frame() {
                frames.push(f);
            }
        }

        assert_eq!(frames, vec![bytes]);
    }

    #[test]
    fn test_garbage_only_buffer_cleared() {
        let mut acc = FrameAccumulator::new();
        acc.push(&[0x55; 64]);

        assert_eq!(acc.next_frame(), None);
        assert_eq!(acc.len(), 0);
    }

    #[test]
    fn test_short_buffer_not_scanned() {
        let mut acc = FrameAccumulator::new();
        acc.push(&[0x55; FRAME_HEADER_SIZE - 1]);

        assert_eq!(acc.next_frame(), None);
        // Below the scan threshold nothing is discarded yet.
        assert_eq!(acc.len(), FRAME_HEADER_SIZE - 1);
    }

    #[test]
    fn test_incomplete_frame_waits() {
        let bytes = frame(&[0xAB; 8]);
        let mut acc = FrameAccumulator::new();

        acc.push(&bytes[..bytes.len() - 1]);
        assert_eq!(acc.next_frame(), None);

        acc.push(&bytes[bytes.len() - 1..]);
        assert_eq!(acc.next_frame(), Some(bytes));
    }

    #[test]
    fn test_two_frames_in_one_push() {
        let first = frame(&[0x11; 4]);
        let second = frame(&[0x22; 12]);
        let mut acc = FrameAccumulator::new();

        let mut combined = first.clone();
        combined.extend_from_slice(&second);
        acc.push(&combined);

        assert_eq!(acc.next_frame(), Some(first));
        assert_eq!(acc.next_frame(), Some(second));
        assert_eq!(acc.next_frame(), None);
    }

    #[test]
    fn test_implausible_length_resyncs_to_next_magic() {
        // A corrupted header whose packetLength field is absurd, followed
        // by a good frame.
        let mut corrupted = Vec::new();
        corrupted.extend_from_slice(&FRAME_MAGIC);
        for value in [3u32, 0xFFFF_FFFF, 0, 0, 0, 0, 0] {
            corrupted.extend_from_slice(&value.to_le_bytes());
        }

        let good = frame(&[0xCC; 8]);
        let mut acc = FrameAccumulator::new();
        acc.push(&corrupted);
        acc.push(&good);

        assert_eq!(acc.next_frame(), Some(good));
    }

    #[test]
    fn test_zero_length_header_resyncs() {
        let mut corrupted = Vec::new();
        corrupted.extend_from_slice(&FRAME_MAGIC);
        for value in [0u32; 7] {
            corrupted.extend_from_slice(&value.to_le_bytes());
        }

        let good = frame(&[]);
        let mut acc = FrameAccumulator::new();
        acc.push(&corrupted);
        acc.push(&good);

        assert_eq!(acc.next_frame(), Some(good));
    }
}
