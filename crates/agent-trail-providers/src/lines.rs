//! Newline-delimited line splitting over chunked transports.
//!
//! Converts a `reqwest::Response` body into a `Stream<Item = String>` of
//! complete lines, re-assembling lines (and multi-byte characters) split
//! across transport chunks.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use tokio_stream::StreamExt;

/// Byte-level accumulator that re-assembles complete `\n`-terminated lines
/// from arbitrarily chunked input.
///
/// Splitting happens on raw bytes before any decoding, so a multi-byte UTF-8
/// sequence broken across two chunks is put back together before the line is
/// turned into a `String`. A trailing `\r` is trimmed.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let rest = self.buffer.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.pop(); // the \n
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush the trailing unterminated segment at end of stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(tail)
    }
}

/// Parse a streaming response body into a stream of complete lines.
///
/// The final unterminated segment, if non-empty, is emitted as one last line.
/// Transport errors are yielded once, then the stream ends.
pub fn line_stream(response: reqwest::Response) -> impl Stream<Item = anyhow::Result<String>> {
    futures::stream::unfold(
        LineState {
            byte_stream: Box::pin(response.bytes_stream()),
            buffer: LineBuffer::new(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(line) = state.pending.pop_front() {
                    return Some((Ok(line), state));
                }
                if state.done {
                    return None;
                }

                match state.byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        state.pending.extend(state.buffer.push(&chunk));
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(anyhow::anyhow!("Run stream error: {e}")), state));
                    }
                    None => {
                        state.done = true;
                        if let Some(tail) = state.buffer.finish() {
                            state.pending.push_back(tail);
                        }
                    }
                }
            }
        },
    )
}

struct LineState {
    byte_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: LineBuffer,
    pending: VecDeque<String>,
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Push the input split at the given byte offsets and collect all output.
    fn split_at_offsets(input: &[u8], offsets: &[usize]) -> Vec<String> {
        let mut buffer = LineBuffer::new();
        let mut lines = Vec::new();
        let mut start = 0;
        for &end in offsets {
            lines.extend(buffer.push(&input[start..end]));
            start = end;
        }
        lines.extend(buffer.push(&input[start..]));
        lines.extend(buffer.finish());
        lines
    }

    #[test]
    fn test_single_chunk() {
        let lines = split_at_offsets(b"one\ntwo\n", &[]);
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn test_chunk_boundary_independence() {
        let input = b"alpha\nbeta\ngamma\n";
        let expected = vec!["alpha", "beta", "gamma"];

        // Every possible single split point yields the same lines.
        for split in 0..=input.len() {
            assert_eq!(
                split_at_offsets(input, &[split]),
                expected,
                "split at {split} changed the output"
            );
        }
        // Byte-at-a-time.
        let offsets: Vec<usize> = (1..input.len()).collect();
        assert_eq!(split_at_offsets(input, &offsets), expected);
    }

    #[test]
    fn test_trailing_remainder_emitted_at_finish() {
        let lines = split_at_offsets(b"done\npartial", &[7]);
        assert_eq!(lines, vec!["done", "partial"]);
    }

    #[test]
    fn test_no_remainder_when_input_ends_with_newline() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"full\n"), vec!["full"]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        // "héllo\n" with the two-byte é split between chunks.
        let input = "héllo\n".as_bytes();
        let split = 2; // inside the é sequence
        let lines = split_at_offsets(input, &[split]);
        assert_eq!(lines, vec!["héllo"]);
    }

    #[test]
    fn test_crlf_trimmed() {
        let lines = split_at_offsets(b"one\r\ntwo\r\n", &[]);
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn test_empty_lines_preserved() {
        let lines = split_at_offsets(b"a\n\nb\n", &[]);
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn test_no_line_emitted_twice() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"once\nsecond"), vec!["once"]);
        assert_eq!(buffer.push(b" half\n"), vec!["second half"]);
        assert_eq!(buffer.finish(), None);
    }

    #[tokio::test]
    async fn test_line_stream_over_response_body() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"a\":1}\n{\"b\"")),
            Ok(Bytes::from_static(b":2}\ntail")),
        ];
        let body = reqwest::Body::wrap_stream(futures::stream::iter(chunks));
        let response = reqwest::Response::from(http::Response::new(body));

        let lines: Vec<String> = line_stream(response)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|l| l.unwrap())
            .collect();

        assert_eq!(lines, vec![r#"{"a":1}"#, r#"{"b":2}"#, "tail"]);
    }
}
