//! Incremental server-sent-events decoding
//!
//! Bytes arrive in arbitrary chunks; an event is only decoded once its
//! terminating blank line has been seen, so multi-byte characters split across
//! chunks come out intact.

use crate::{MurmurError, Result};

/// Payload marker that ends a generation stream
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Joined `data:` lines of one event
    Data(String),
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk and return every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>> {
        // CRLF and LF framing are treated alike.
        self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_event_end(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = decode_event(&event[..end])? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Decode whatever is left once the body has ended
    pub fn finish(&mut self) -> Result<Option<SseFrame>> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        decode_event(&rest)
    }
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn decode_event(raw: &[u8]) -> Result<Option<SseFrame>> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| MurmurError::GenerationFailed(format!("invalid UTF-8 in event: {}", e)))?;

    let mut data: Option<String> = None;
    for line in text.split('\n') {
        let Some(value) = line.strip_prefix("data:") else {
            // comments, `event:`, `id:`, `retry:`
            continue;
        };
        // Only the single separator space is stripped; token whitespace is content.
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(joined) => {
                joined.push('\n');
                joined.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    Ok(data.map(|payload| {
        if payload == DONE_MARKER {
            SseFrame::Done
        } else {
            SseFrame::Data(payload)
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> SseFrame {
        SseFrame::Data(s.to_string())
    }

    #[test]
    fn test_events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: Hel").unwrap().is_empty());
        assert_eq!(decoder.push(b"\n\ndata: lo").unwrap(), vec![data("Hel")]);
        assert_eq!(
            decoder.push(b"\n\ndata: [DONE]\n\n").unwrap(),
            vec![data("lo"), SseFrame::Done]
        );
    }

    #[test]
    fn test_token_whitespace_preserved() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data:  world\n\ndata: \n\n").unwrap();
        assert_eq!(frames, vec![data(" world"), data("")]);
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let split = bytes.len() - 3; // inside the two-byte é
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).unwrap().is_empty());
        assert_eq!(decoder.push(&bytes[split..]).unwrap(), vec![data("caf\u{e9}")]);
    }

    #[test]
    fn test_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder
            .push(b": keepalive\r\n\r\nevent: token\r\ndata: a\r\ndata: b\r\n\r\n")
            .unwrap();
        assert_eq!(frames, vec![data("a\nb")]);
    }

    #[test]
    fn test_unterminated_tail_flushed_on_finish() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap(), Some(data("tail")));
        assert_eq!(decoder.finish().unwrap(), None);
    }

    #[test]
    fn test_invalid_utf8_is_generation_failure() {
        let mut decoder = SseDecoder::new();
        let err = decoder.push(b"data: \xff\xfe\n\n").unwrap_err();
        assert!(matches!(err, MurmurError::GenerationFailed(_)));
    }
}
