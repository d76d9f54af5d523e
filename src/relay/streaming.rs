use crate::provider::ResponseStreamEvent;
use tracing::debug;

/// Output of the SSE decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Non-empty incremental text
    Content(String),
    /// The `[DONE]` sentinel; nothing after it is decoded
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DecoderState {
    #[default]
    Reading,
    Finished,
}

/// Line-oriented decoder for OpenRouter's `data: <json>` stream.
///
/// Bytes are buffered until a full line is available, so lines and UTF-8
/// sequences split across network chunks decode correctly. Lines without a
/// `data:` prefix are ignored and malformed payloads are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    state: DecoderState,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.state == DecoderState::Finished
    }

    /// Feed one chunk and return everything it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Decoded> {
        if self.is_finished() {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);

        let mut decoded = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let line_end = consumed + offset;
            let line = String::from_utf8_lossy(&self.buffer[consumed..line_end]).into_owned();
            consumed = line_end + 1;

            if let Some(item) = self.decode_line(&line) {
                decoded.push(item);
                if self.is_finished() {
                    break;
                }
            }
        }

        if self.is_finished() {
            self.buffer.clear();
        } else {
            self.buffer.drain(..consumed);
        }

        decoded
    }

    /// Flush a trailing line that was not newline-terminated (upstream EOF)
    pub fn finish(&mut self) -> Vec<Decoded> {
        if self.is_finished() || self.buffer.is_empty() {
            self.buffer.clear();
            return Vec::new();
        }

        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, line: &str) -> Option<Decoded> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let data = line.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data == "[DONE]" {
            self.state = DecoderState::Finished;
            return Some(Decoded::Done);
        }

        match serde_json::from_str::<ResponseStreamEvent>(data) {
            Ok(event) => event
                .content()
                .filter(|content| !content.is_empty())
                .map(|content| Decoded::Content(content.to_string())),
            Err(e) => {
                debug!(error = %e, "Skipping malformed stream fragment");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
        )
    }

    #[test]
    fn test_content_then_done() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}data: [DONE]\n", fragment("Hi"));

        assert_eq!(
            decoder.push(body.as_bytes()),
            vec![Decoded::Content("Hi".to_string()), Decoded::Done]
        );
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_malformed_fragment_is_skipped() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}data: {{not json\n{}", fragment("a"), fragment("b"));

        assert_eq!(
            decoder.push(body.as_bytes()),
            vec![
                Decoded::Content("a".to_string()),
                Decoded::Content("b".to_string())
            ]
        );
        assert!(!decoder.is_finished());
    }

    #[test]
    fn test_lines_without_data_prefix_are_ignored() {
        let mut decoder = SseDecoder::new();
        let body = format!(
            ": OPENROUTER PROCESSING\n\nevent: ping\n{}",
            fragment("ok")
        );

        assert_eq!(
            decoder.push(body.as_bytes()),
            vec![Decoded::Content("ok".to_string())]
        );
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let line = fragment("héllo");
        let bytes = line.as_bytes();
        // Split inside the two-byte 'é'
        let split = line.find('é').unwrap() + 1;

        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(
            decoder.push(&bytes[split..]),
            vec![Decoded::Content("héllo".to_string())]
        );
    }

    #[test]
    fn test_nothing_decoded_after_done() {
        let mut decoder = SseDecoder::new();
        let body = format!("data: [DONE]\n{}", fragment("late"));

        assert_eq!(decoder.push(body.as_bytes()), vec![Decoded::Done]);
        assert!(decoder.push(fragment("later").as_bytes()).is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_empty_content_and_crlf() {
        let mut decoder = SseDecoder::new();
        let body = format!(
            "{}data: {{\"choices\":[{{\"delta\":{{\"content\":\"x\"}}}}]}}\r\n",
            fragment("")
        );

        assert_eq!(
            decoder.push(body.as_bytes()),
            vec![Decoded::Content("x".to_string())]
        );
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        let line = fragment("tail");
        let unterminated = line.trim_end_matches('\n');

        assert!(decoder.push(unterminated.as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec![Decoded::Content("tail".to_string())]);
    }
}
