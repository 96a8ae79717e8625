//! SSE frame reassembly for the DashScope byte stream.
//!
//! The transport hands over raw chunks with no alignment guarantees: a frame
//! separator, a field line, or a single multi-byte character may be split
//! across reads. The decoder buffers bytes, cuts complete blank-line
//! delimited frames, and extracts their `event:`/`data:` fields.

use bytes::{Bytes, BytesMut};
use tracing::debug;

/// One decoded SSE frame.
///
/// Frames without a `data:` line are never produced; an empty data payload
/// is still a valid frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE frame decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the frames it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        self.drain_complete(&mut frames);
        frames
    }

    /// Flushes the buffered remainder as a final frame.
    ///
    /// Called when the transport closes: whatever is still buffered was never
    /// terminated by a separator but may hold the last frame of the stream.
    pub fn finalize(&mut self) -> Vec<DecodedFrame> {
        let mut frames = Vec::new();
        self.drain_complete(&mut frames);
        let rest = self.buf.split().freeze();
        if let Some(frame) = parse_frame(&rest) {
            frames.push(frame);
        }
        frames
    }

    fn drain_complete(&mut self, frames: &mut Vec<DecodedFrame>) {
        while let Some((end, sep_len)) = find_separator(&self.buf) {
            let raw: Bytes = self.buf.split_to(end + sep_len).freeze();
            if let Some(frame) = parse_frame(&raw[..end]) {
                frames.push(frame);
            }
        }
    }
}

/// Finds the earliest frame separator: `\n\n` or `\r\n\r\n`, whichever
/// starts first. Returns `(frame_end, separator_len)`.
fn find_separator(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = find_subsequence(buf, b"\n\n").map(|i| (i, 2));
    let crlf = find_subsequence(buf, b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parses one raw frame into its `event:`/`data:` fields.
///
/// Unknown lines are ignored; a repeated field keeps its last occurrence.
/// Invalid UTF-8 drops the frame without failing the stream.
fn parse_frame(raw: &[u8]) -> Option<DecodedFrame> {
    if raw.is_empty() {
        return None;
    }
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(err) => {
            debug!("dropping frame with invalid utf-8: {err}");
            return None;
        }
    };

    let mut event = None;
    let mut data = None;
    for line in text.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        }
    }

    Some(DecodedFrame {
        event,
        data: data?,
    })
}
