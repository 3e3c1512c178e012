// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{MessageStream, Transport};
use crate::errors::TransportError;
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use reqwest::header::ACCEPT;
use std::{collections::VecDeque, time::Duration};
use tracing::debug;

/// A [`Transport`] reading server-sent events over HTTP.
#[derive(Clone, Debug)]
pub struct SseTransport {
    client: reqwest::Client,
    url: String,
}

impl SseTransport {
    /// Creates a transport for the given endpoint.
    ///
    /// `connect_timeout` bounds establishing the connection only. An
    /// established stream may stay idle indefinitely.
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|error| TransportError::ClientBuild { error })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Returns the endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for SseTransport {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn subscribe(&self) -> Result<MessageStream, TransportError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|error| TransportError::Connect {
                url: self.url.clone(),
                error,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: self.url.clone(),
                status,
            });
        }
        debug!(url = %self.url, %status, "event stream response received");

        Ok(decode_body(response.bytes_stream().boxed(), |error| {
            TransportError::Read { error }
        }))
    }
}

/// Turns a stream of body chunks into a stream of event payloads.
///
/// A read error is yielded once, after which the stream ends. A partial event
/// left over when the body ends is discarded.
pub fn decode_body<E: Send + 'static>(
    body: BoxStream<'static, Result<Bytes, E>>,
    map_err: fn(E) -> TransportError,
) -> MessageStream {
    struct State<E> {
        body: BoxStream<'static, Result<Bytes, E>>,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        done: bool,
    }

    let state = State {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(message) = state.pending.pop_front() {
                return Some((Ok(message), state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.pending.extend(state.decoder.feed(&chunk)),
                Some(Err(error)) => {
                    state.done = true;
                    return Some((Err(map_err(error)), state));
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}

/// An incremental decoder for the `text/event-stream` format.
///
/// Only the `data` field is used. Each blank line dispatches the data lines
/// seen since the previous one, joined by `\n`.
#[derive(Clone, Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: String,
    has_data: bool,
}

impl SseDecoder {
    /// Creates a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of the body, returning every event completed by it.
    ///
    /// Chunks may split lines, including in the middle of a UTF-8 sequence.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut buffer = std::mem::take(&mut self.line);
        // The buffered partial line never contains a newline, so only the new
        // bytes need scanning.
        let mut scan_from = buffer.len();
        buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = buffer[scan_from..].iter().position(|byte| *byte == b'\n') {
            let newline = scan_from + offset;
            let mut line = &buffer[line_start..newline];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if let Some(event) = self.process_line(&String::from_utf8_lossy(line)) {
                events.push(event);
            }
            line_start = newline + 1;
            scan_from = line_start;
        }

        buffer.drain(..line_start);
        self.line = buffer;
        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if !self.has_data {
                return None;
            }
            self.has_data = false;
            let event = std::mem::take(&mut self.data);
            return (!event.is_empty()).then_some(event);
        }

        // Comment line, usually a keep-alive.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(value);
            self.has_data = true;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use test_case::test_case;

    #[test_case("data: hello\n\n", &["hello"] ; "single line")]
    #[test_case("data:hello\n\n", &["hello"] ; "no space after colon")]
    #[test_case("data:  two spaces\n\n", &[" two spaces"] ; "only one space is stripped")]
    #[test_case("data: a\ndata: b\n\n", &["a\nb"] ; "multi-line data")]
    #[test_case("data: a\r\n\r\ndata: b\r\n\r\n", &["a", "b"] ; "crlf line endings")]
    #[test_case(": keep-alive\n\ndata: x\n\n", &["x"] ; "comments are skipped")]
    #[test_case("event: update\nid: 7\nretry: 100\ndata: x\n\n", &["x"] ; "other fields ignored")]
    #[test_case("\n\n\n", &[] ; "blank lines alone dispatch nothing")]
    #[test_case("data\n\n", &[] ; "empty data is not dispatched")]
    #[test_case("data: incomplete", &[] ; "no dispatch without blank line")]
    fn decodes(input: &str, expected: &[&str]) {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.feed(input.as_bytes()), expected);
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let input = "data: {\"type\":\"init\",\r\ndata: \"data\":{}}\r\n\r\n: ping\n\ndata: ünïcödé\n\n";
        let mut whole = SseDecoder::new();
        let expected = whole.feed(input.as_bytes());
        assert_eq!(
            expected,
            vec!["{\"type\":\"init\",\n\"data\":{}}".to_owned(), "ünïcödé".to_owned()]
        );

        let bytes = input.as_bytes();
        for split in 0..bytes.len() {
            let mut decoder = SseDecoder::new();
            let mut events = decoder.feed(&bytes[..split]);
            events.extend(decoder.feed(&bytes[split..]));
            assert_eq!(events, expected, "split at byte {split}");
        }

        let mut decoder = SseDecoder::new();
        let events: Vec<_> = bytes
            .iter()
            .flat_map(|byte| decoder.feed(std::slice::from_ref(byte)))
            .collect();
        assert_eq!(events, expected, "one byte at a time");
    }

    #[test]
    fn large_line_in_small_chunks() {
        const PAYLOAD_LEN: usize = 8 * 1024 * 1024;

        let mut input = b"data: ".to_vec();
        input.resize(input.len() + PAYLOAD_LEN, b'x');
        input.extend_from_slice(b"\n\n");

        let mut decoder = SseDecoder::new();
        let start = std::time::Instant::now();
        let events: Vec<_> = input
            .chunks(8 * 1024)
            .flat_map(|chunk| decoder.feed(chunk))
            .collect();
        let elapsed = start.elapsed();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].len(), PAYLOAD_LEN);
        assert!(decoder.line.is_empty(), "buffer is drained after dispatch");
        // Rescanning the buffered line on every chunk takes seconds here.
        assert!(
            elapsed < std::time::Duration::from_secs(2),
            "decoding took {elapsed:?}"
        );
    }

    #[test]
    fn partial_line_survives_many_lines_per_chunk() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.feed(b"data: a\n\ndata: b\n\ndata: c"), vec!["a", "b"]);
        assert_eq!(decoder.line, b"data: c");
        assert_eq!(decoder.feed(b"d\n\n"), vec!["cd"]);
    }

    #[tokio::test]
    async fn body_stream_yields_events_then_ends() {
        let chunks: Vec<Result<Bytes, Infallible>> = vec![
            Ok(Bytes::from_static(b"data: one\n\nda")),
            Ok(Bytes::from_static(b"ta: two\n\n")),
            Ok(Bytes::from_static(b"data: partial\n")),
        ];
        let body = futures::stream::iter(chunks).boxed();
        let messages: Vec<_> = decode_body(body, |never| match never {})
            .map(|message| message.expect("infallible body"))
            .collect()
            .await;
        assert_eq!(messages, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn body_stream_ends_after_read_error() {
        let chunks: Vec<Result<Bytes, &'static str>> = vec![
            Ok(Bytes::from_static(b"data: one\n\n")),
            Err("connection reset"),
            Ok(Bytes::from_static(b"data: never\n\n")),
        ];
        let body = futures::stream::iter(chunks).boxed();
        let mut messages = decode_body(body, |reason| TransportError::unreachable(reason));

        assert_eq!(
            messages.next().await.map(|m| m.expect("first message is ok")),
            Some("one".to_owned())
        );
        match messages.next().await {
            Some(Err(TransportError::Unreachable { reason })) => {
                assert_eq!(reason, "connection reset");
            }
            other => panic!("expected a read error, got {other:?}"),
        }
        assert!(messages.next().await.is_none());
    }
}
