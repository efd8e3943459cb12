// Newline-delimited framing. A single read can carry several frames or only
// part of one, so inbound bytes are buffered until a delimiter shows up.

use crate::error::{NodeError, Result};
use crate::utils::canonicalize;
use serde::Serialize;
use std::mem;

/// Largest frame, delimiter included, either side will put on the wire
pub const MAX_FRAME_LEN: usize = 4096;

const DELIMITER: u8 = b'\n';

pub fn encode_frame<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>> {
    let mut bytes = canonicalize(message)?;
    bytes.push(DELIMITER);
    if bytes.len() > MAX_FRAME_LEN {
        return Err(NodeError::FrameTooLarge {
            size: bytes.len(),
            max: MAX_FRAME_LEN,
        });
    }
    Ok(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One complete message without its delimiter
    Line(Vec<u8>),
    /// A line that exceeded the limit and was thrown away
    Oversized { len: usize },
}

pub struct FrameBuffer {
    pending: Vec<u8>,
    discarded: usize,
    discarding: bool,
    max_len: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> FrameBuffer {
        Self::with_limit(MAX_FRAME_LEN)
    }

    pub fn with_limit(max_len: usize) -> FrameBuffer {
        FrameBuffer {
            pending: Vec::new(),
            discarded: 0,
            discarding: false,
            max_len,
        }
    }

    /// Feed raw bytes, returning every frame they complete
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for chunk in data.split_inclusive(|b| *b == DELIMITER) {
            let complete = chunk.last() == Some(&DELIMITER);
            let body = if complete {
                &chunk[..chunk.len() - 1]
            } else {
                chunk
            };

            if self.discarding {
                self.discarded += body.len();
                if complete {
                    frames.push(self.finish_discard());
                }
                continue;
            }

            self.pending.extend_from_slice(body);
            // `max_len` counts the delimiter
            if self.pending.len() >= self.max_len {
                self.discarded = self.pending.len();
                self.pending.clear();
                self.discarding = true;
                if complete {
                    frames.push(self.finish_discard());
                }
                continue;
            }

            if complete {
                let line = mem::take(&mut self.pending);
                if !line.iter().all(u8::is_ascii_whitespace) {
                    frames.push(Frame::Line(line));
                }
            }
        }
        frames
    }

    fn finish_discard(&mut self) -> Frame {
        let len = self.discarded;
        self.discarded = 0;
        self.discarding = false;
        Frame::Oversized { len }
    }

    /// Bytes of an unfinished frame still waiting for a delimiter
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_splits_multiple_frames_in_one_read() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(
            frames,
            vec![
                Frame::Line(b"{\"a\":1}".to_vec()),
                Frame::Line(b"{\"b\":2}".to_vec())
            ]
        );
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_reassembles_partial_frames() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(b"{\"type\":").is_empty());
        assert_eq!(buffer.pending_len(), 8);
        let frames = buffer.push(b"\"getpeers\"}\n{\"ty");
        assert_eq!(frames, vec![Frame::Line(b"{\"type\":\"getpeers\"}".to_vec())]);
        assert_eq!(buffer.pending_len(), 4);
    }

    #[test]
    fn test_skips_blank_lines() {
        let mut buffer = FrameBuffer::new();
        assert!(buffer.push(b"\n \n").is_empty());
    }

    #[test]
    fn test_oversized_line_is_dropped_and_stream_recovers() {
        let mut buffer = FrameBuffer::with_limit(8);
        assert!(buffer.push(b"0123456789").is_empty());
        let frames = buffer.push(b"abc\n{}\n");
        assert_eq!(
            frames,
            vec![Frame::Oversized { len: 13 }, Frame::Line(b"{}".to_vec())]
        );
    }

    #[test]
    fn test_encode_rejects_oversized_message() {
        let big = json!({"type": "error", "error": "x".repeat(MAX_FRAME_LEN)});
        assert!(matches!(
            encode_frame(&big),
            Err(NodeError::FrameTooLarge { max: MAX_FRAME_LEN, .. })
        ));

        let small = encode_frame(&json!({"type": "getpeers"})).unwrap();
        assert_eq!(small.last(), Some(&b'\n'));
    }
}
