//! Framed binary protocol spoken by the robot controller.
//!
//! Every frame is `START opcode payload* END`. Movement commands and the
//! voltage request carry no payload; the voltage response carries two 7-bit
//! bytes `[high, low]` encoding centivolts as `high * 128 + low`.

use serde::{Deserialize, Serialize};

pub const FRAME_START: u8 = 0x80;
pub const FRAME_END: u8 = 0x81;

pub const OP_REQUEST_VOLTAGE: u8 = 0x0A;
pub const OP_VOLTAGE: u8 = 0x0B;

/// Bytes in a complete voltage response frame.
const VOLTAGE_FRAME_LEN: usize = 5;

/// Upper bound on undecoded bytes kept between reads.
pub const MAX_PENDING_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DecodedFrame {
    Voltage(f64),
}

/// Build an outbound command frame with no payload.
pub fn encode_command(opcode: u8) -> Vec<u8> {
    vec![FRAME_START, opcode, FRAME_END]
}

/// Build the telemetry request sent on every poll tick.
pub fn encode_voltage_request() -> Vec<u8> {
    encode_command(OP_REQUEST_VOLTAGE)
}

pub fn decode_voltage(high: u8, low: u8) -> f64 {
    (high as f64 * 128.0 + low as f64) / 100.0
}

/// Scan `buffer` for complete frames.
///
/// Returns the decoded frames and how many leading bytes are fully consumed.
/// Bytes past `consumed` belong to a frame that may still complete once more
/// data arrives, so the caller must keep them.
pub fn scan_frames(buffer: &[u8]) -> (Vec<DecodedFrame>, usize) {
    let mut frames = Vec::new();
    let mut cursor = 0;

    loop {
        let start = match buffer[cursor..].iter().position(|&b| b == FRAME_START) {
            Some(offset) => cursor + offset,
            // Nothing here can begin a frame
            None => return (frames, buffer.len()),
        };

        let Some(&opcode) = buffer.get(start + 1) else {
            return (frames, start);
        };

        match opcode {
            OP_VOLTAGE => {
                if buffer.len() < start + VOLTAGE_FRAME_LEN {
                    return (frames, start);
                }
                if buffer[start + 4] == FRAME_END {
                    let voltage = decode_voltage(buffer[start + 2], buffer[start + 3]);
                    frames.push(DecodedFrame::Voltage(voltage));
                    cursor = start + VOLTAGE_FRAME_LEN;
                } else {
                    // Malformed; resync on the next byte
                    cursor = start + 1;
                }
            }
            _ => {
                // Unknown opcode: skip through its END unless another frame starts first
                let rest = &buffer[start + 1..];
                match rest.iter().position(|&b| b == FRAME_END || b == FRAME_START) {
                    Some(offset) if rest[offset] == FRAME_END => cursor = start + 1 + offset + 1,
                    Some(offset) => cursor = start + 1 + offset,
                    None => return (frames, start),
                }
            }
        }
    }
}

/// Accumulates bytes across read events so frames split between reads still decode.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one read chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedFrame> {
        self.pending.extend_from_slice(chunk);

        let (frames, consumed) = scan_frames(&self.pending);
        self.pending.drain(..consumed);

        if self.pending.len() > MAX_PENDING_BYTES {
            // Only an unterminated unknown-opcode frame can grow this far
            log::warn!(
                "Dropping {} undecodable bytes from serial buffer",
                self.pending.len()
            );
            self.pending.clear();
        }

        frames
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command_frame() {
        assert_eq!(encode_command(0x50), vec![0x80, 0x50, 0x81]);
        assert_eq!(encode_voltage_request(), vec![0x80, 0x0A, 0x81]);
    }

    #[test]
    fn test_decode_voltage_frame() {
        let (frames, consumed) = scan_frames(&[0x80, 0x0B, 0x09, 0x64, 0x81]);
        assert_eq!(frames, vec![DecodedFrame::Voltage(12.52)]);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_incomplete_frame_is_kept() {
        let (frames, consumed) = scan_frames(&[0x00, 0x80, 0x0B, 0x09]);
        assert!(frames.is_empty());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_malformed_voltage_frame_resyncs() {
        let bytes = [0x80, 0x0B, 0x09, 0x64, 0x00, 0x80, 0x0B, 0x00, 0x0A, 0x81];
        let (frames, consumed) = scan_frames(&bytes);
        assert_eq!(frames, vec![DecodedFrame::Voltage(0.1)]);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_unknown_opcode_is_skipped() {
        let bytes = [0x80, 0x42, 0x01, 0x02, 0x81, 0x80, 0x0B, 0x01, 0x00, 0x81];
        let (frames, _) = scan_frames(&bytes);
        assert_eq!(frames, vec![DecodedFrame::Voltage(1.28)]);
    }

    #[test]
    fn test_unknown_opcode_yields_to_next_start() {
        let bytes = [0x80, 0x42, 0x80, 0x0B, 0x09, 0x64, 0x81];
        let (frames, consumed) = scan_frames(&bytes);
        assert_eq!(frames, vec![DecodedFrame::Voltage(12.52)]);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_decoder_joins_split_frame() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&[0x80, 0x0B]).is_empty());
        assert_eq!(decoder.pending_len(), 2);
        assert_eq!(
            decoder.push(&[0x09, 0x64, 0x81]),
            vec![DecodedFrame::Voltage(12.52)]
        );
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_decoder_bounds_pending_bytes() {
        let mut decoder = FrameDecoder::new();
        let mut junk = vec![0x80, 0x42];
        junk.extend(std::iter::repeat(0x01).take(MAX_PENDING_BYTES + 10));
        assert!(decoder.push(&junk).is_empty());
        assert!(decoder.pending_len() <= MAX_PENDING_BYTES);

        assert_eq!(
            decoder.push(&[0x80, 0x0B, 0x09, 0x64, 0x81]),
            vec![DecodedFrame::Voltage(12.52)]
        );
    }
}
