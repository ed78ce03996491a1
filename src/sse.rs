//! Incremental server-sent-event framing.
//!
//! [`SseDecoder`] accepts the response body in whatever chunks the transport
//! delivers and yields complete [`SseFrame`]s. Frames end at a blank line.
//! Bytes after the last blank line stay buffered until more data arrives, so
//! the output does not depend on where the chunk boundaries fall (including
//! inside a multi-byte UTF-8 sequence).

const DEFAULT_EVENT: &str = "message";

/// One complete event from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, or `"message"` when absent.
    pub event: String,
    /// Concatenated `data:` lines.
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        self.drain(false)
    }

    /// End of input. A trailing `\r` can no longer be the first half of a
    /// `\r\n`, so it completes its line. Anything still unterminated after
    /// that stays in the buffer and is not a frame.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        self.drain(true)
    }

    /// Bytes received after the last complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn drain(&mut self, at_eof: bool) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        while let Some((end, next)) = find_separator(&self.buffer, at_eof) {
            let raw: Vec<u8> = self.buffer.drain(..next).collect();
            if let Some(frame) = parse_frame(&raw[..end]) {
                frames.push(frame);
            }
        }
        frames
    }
}

enum LineEnd {
    /// `\n`, `\r` or `\r\n`, with its length.
    Complete(usize),
    /// A `\r` as the last buffered byte.
    Undecided,
}

fn line_end(buf: &[u8], at_eof: bool) -> Option<LineEnd> {
    match buf {
        [b'\r', b'\n', ..] => Some(LineEnd::Complete(2)),
        [b'\r'] if !at_eof => Some(LineEnd::Undecided),
        [b'\r', ..] | [b'\n', ..] => Some(LineEnd::Complete(1)),
        _ => None,
    }
}

/// First blank line: two line ends in a row, in any mix of `\n`, `\r\n`
/// and `\r`. Returns where the frame ends and where the next one starts.
fn find_separator(buf: &[u8], at_eof: bool) -> Option<(usize, usize)> {
    for i in 0..buf.len() {
        let first = match line_end(&buf[i..], at_eof) {
            None => continue,
            Some(LineEnd::Undecided) => return None,
            Some(LineEnd::Complete(len)) => len,
        };
        match line_end(&buf[i + first..], at_eof) {
            None => {}
            Some(LineEnd::Undecided) => return None,
            Some(LineEnd::Complete(second)) => return Some((i, i + first + second)),
        }
    }
    None
}

fn parse_frame(raw: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return None;
    }

    let mut event = None;
    let mut data: Option<String> = None;

    for line in text.split(|c| c == '\n' || c == '\r') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    let data = data.filter(|d| !d.is_empty())?;
    Some(SseFrame {
        event: event
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "event: retrieval_trace\ndata: {\"timing_ms\":12.5}\n\n\
                          event: content\ndata: {\"delta\":\"Caf\u{e9} \u{1f600}\"}\n\n\
                          : keep-alive\n\n\
                          event: tool_start\ndata: {\"name\":\"memory_store\"}\n\n\
                          event: done\ndata: {\"session_id\":\"s9\"}\n\n";

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: event.into(),
            data: data.into(),
        }
    }

    fn decode_whole(bytes: &[u8]) -> Vec<SseFrame> {
        SseDecoder::new().push(bytes)
    }

    #[test]
    fn parses_named_events() {
        let frames = decode_whole(STREAM.as_bytes());
        assert_eq!(
            frames,
            vec![
                frame("retrieval_trace", "{\"timing_ms\":12.5}"),
                frame("content", "{\"delta\":\"Caf\u{e9} \u{1f600}\"}"),
                frame("tool_start", "{\"name\":\"memory_store\"}"),
                frame("done", "{\"session_id\":\"s9\"}"),
            ]
        );
    }

    #[test]
    fn every_two_way_split_matches_whole_input() {
        let bytes = STREAM.as_bytes();
        let expected = decode_whole(bytes);

        for split in 0..=bytes.len() {
            let mut decoder = SseDecoder::new();
            let mut frames = decoder.push(&bytes[..split]);
            frames.extend(decoder.push(&bytes[split..]));
            assert_eq!(frames, expected, "split at byte {split}");
            assert_eq!(decoder.pending(), 0);
        }
    }

    #[test]
    fn crlf_stream_matches_lf_stream_at_every_split() {
        let crlf = STREAM.replace('\n', "\r\n");
        let bytes = crlf.as_bytes();
        let expected = decode_whole(STREAM.as_bytes());

        for split in 0..=bytes.len() {
            let mut decoder = SseDecoder::new();
            let mut frames = decoder.push(&bytes[..split]);
            frames.extend(decoder.push(&bytes[split..]));
            assert_eq!(frames, expected, "split at byte {split}");
            assert_eq!(decoder.pending(), 0);
        }
    }

    #[test]
    fn crlf_blank_line_ends_a_frame() {
        let frames = decode_whole(b"event: content\r\ndata: {\"delta\":\"hi\"}\r\n\r\n");
        assert_eq!(frames, vec![frame("content", "{\"delta\":\"hi\"}")]);
    }

    #[test]
    fn cr_only_stream_completes_at_finish() {
        let cr = STREAM.replace('\n', "\r");
        let bytes = cr.as_bytes();
        let expected = decode_whole(STREAM.as_bytes());

        for split in 0..=bytes.len() {
            let mut decoder = SseDecoder::new();
            let mut frames = decoder.push(&bytes[..split]);
            frames.extend(decoder.push(&bytes[split..]));
            frames.extend(decoder.finish());
            assert_eq!(frames, expected, "split at byte {split}");
            assert_eq!(decoder.pending(), 0);
        }
    }

    #[test]
    fn finish_keeps_unterminated_event_out() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: content\ndata: {}\n").is_empty());
        assert!(decoder.finish().is_empty());
        assert!(decoder.pending() > 0);
    }

    #[test]
    fn byte_at_a_time_matches_whole_input() {
        let bytes = STREAM.as_bytes();
        let mut decoder = SseDecoder::new();
        let frames: Vec<SseFrame> = bytes.iter().flat_map(|b| decoder.push(&[*b])).collect();
        assert_eq!(frames, decode_whole(bytes));
    }

    #[test]
    fn partial_event_is_held_until_separator() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: content\ndata: {\"del").is_empty());
        assert!(decoder.push(b"ta\":\"x\"}\n").is_empty());
        assert!(decoder.pending() > 0);

        let frames = decoder.push(b"\n");
        assert_eq!(frames, vec![frame("content", "{\"delta\":\"x\"}")]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn missing_event_line_defaults_to_message() {
        let frames = decode_whole(b"data: {\"a\":1}\n\n");
        assert_eq!(frames, vec![frame("message", "{\"a\":1}")]);
    }

    #[test]
    fn events_without_data_are_dropped() {
        let frames = decode_whole(b"event: ping\n\nevent: content\ndata:\n\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn multiple_data_lines_are_joined() {
        let frames = decode_whole(b"event: done\ndata: {\"a\":\ndata: 1}\n\n");
        assert_eq!(frames, vec![frame("done", "{\"a\":\n1}")]);
    }

    #[test]
    fn tolerates_missing_space_and_carriage_returns() {
        let frames = decode_whole(b"event:content\r\ndata:{\"delta\":\"hi\"}\r\n\n");
        assert_eq!(frames, vec![frame("content", "{\"delta\":\"hi\"}")]);
    }
}
