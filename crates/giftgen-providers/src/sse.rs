//! Incremental SSE (Server-Sent Events) decoder.
//!
//! Bytes go in as they arrive; complete events come out once their blank
//! terminator line has been seen.

use futures::{Stream, StreamExt};

use giftgen_core::error::{GiftGenError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            // A chunk may end mid-character; decode whole lines only.
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else if line.starts_with(':') {
                // comment
            } else if let Some(value) = line.strip_prefix("event:") {
                self.event = Some(value.trim_start().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.trim_start().to_string());
            }
        }
        events
    }

    /// Flush an event left pending when the stream ends without a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&raw);
            if let Some(value) = rest.trim_end_matches('\r').strip_prefix("data:") {
                self.data.push(value.trim_start().to_string());
            }
        }
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Decode a response body into a stream of SSE events.
pub fn sse_events(response: reqwest::Response) -> impl Stream<Item = Result<SseEvent>> + Send {
    let bytes = response.bytes_stream();
    futures::stream::unfold(
        (Box::pin(bytes), SseDecoder::new(), std::collections::VecDeque::new(), false),
        |(mut bytes, mut decoder, mut ready, mut done)| async move {
            loop {
                if let Some(event) = ready.pop_front() {
                    return Some((Ok(event), (bytes, decoder, ready, done)));
                }
                if done {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => ready.extend(decoder.push(&chunk)),
                    Some(Err(e)) => {
                        done = true;
                        let err = GiftGenError::vendor("SSE stream error", e);
                        return Some((Err(err), (bytes, decoder, ready, done)));
                    }
                    None => {
                        done = true;
                        ready.extend(decoder.finish());
                    }
                }
            }
        },
    )
}
