use crate::{error::CommonRequestError, openai_format::StreamChunk};
use bytes::Bytes;
use futures_util::{StreamExt, stream::BoxStream};
use thiserror::Error;

/// Prefix of a frame that carries a JSON payload
pub const DATA_PREFIX: &str = "data: ";

/// Line the endpoint sends after the last delta
pub const DONE_SENTINEL: &str = "data: [DONE]";

/// Incremental UTF-8 decoder.
///
/// Bytes of a multi-byte character split across two chunks are held back until the
/// rest arrives. Invalid sequences decode to U+FFFD instead of failing the stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning every character that is complete so far
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // `valid` is well-formed, so this borrows without replacing anything
                    out.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // truncated sequence at the end: wait for more bytes
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let consumed = self.pending.len() - rest.len();
        self.pending.drain(..consumed);
        out
    }

    /// Number of bytes held back waiting for the rest of a character
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Accumulates decoded text and hands out complete `\n`-terminated lines
#[derive(Debug, Default)]
struct LineBuffer {
    text: String,
}

impl LineBuffer {
    fn push(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Pop the next complete line without its terminator.
    /// The trailing unterminated fragment stays buffered.
    fn next_line(&mut self) -> Option<String> {
        let pos = self.text.find('\n')?;
        let mut line: String = self.text.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

/// Classification of one complete line of the event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Blank line
    Empty,
    /// `data: [DONE]`
    Done,
    /// `data: <payload>`, payload not yet parsed
    Data(&'a str),
    /// Anything else (comments, `event:` fields, noise); discarded
    Other,
}

impl<'a> Frame<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();

        if line.is_empty() {
            Frame::Empty
        } else if line == DONE_SENTINEL {
            Frame::Done
        } else if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
            Frame::Data(payload)
        } else {
            Frame::Other
        }
    }
}

/// A `data:` line whose payload is not valid JSON for a stream chunk
#[derive(Debug, Error)]
#[error("malformed stream frame {line:?}: {source}")]
pub struct FrameParseError {
    pub line: String,
    #[source]
    pub source: serde_json::Error,
}

/// Parse the text delta out of one line, if it carries any.
///
/// # Errors
///
/// Returns [`FrameParseError`] when a `data:` payload is not valid JSON. Callers
/// treat this as non-fatal.
pub fn parse_delta(line: &str) -> Result<Option<String>, FrameParseError> {
    match Frame::parse(line) {
        Frame::Data(payload) => {
            let chunk: StreamChunk =
                serde_json::from_str(payload).map_err(|source| FrameParseError {
                    line: line.trim().to_string(),
                    source,
                })?;
            if let Some(reason) = chunk.finish_reason() {
                log::debug!("generation finished: {reason}");
            }
            Ok(chunk.content().map(str::to_string))
        }
        Frame::Done => {
            log::trace!("received end-of-stream sentinel");
            Ok(None)
        }
        Frame::Empty | Frame::Other => Ok(None),
    }
}

/// Synchronous core of the stream decoder: bytes in, text deltas out.
///
/// Owned by exactly one streaming operation. Deltas are produced lazily, one line
/// at a time, so nothing is parsed ahead of what the consumer asks for.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    utf8: Utf8Decoder,
    lines: LineBuffer,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of raw body bytes
    pub fn push(&mut self, chunk: &[u8]) {
        let text = self.utf8.decode(chunk);
        self.lines.push(&text);
    }

    /// Next delta from the lines buffered so far, or `None` if more bytes are needed
    pub fn next_delta(&mut self) -> Option<String> {
        while let Some(line) = self.lines.next_line() {
            match parse_delta(&line) {
                Ok(Some(delta)) => return Some(delta),
                Ok(None) => {}
                Err(e) => log::warn!("skipping {e}"),
            }
        }
        None
    }

    /// End of input: whatever is still buffered never became a complete line and is dropped.
    ///
    /// Returns the number of discarded bytes.
    pub fn finish(&mut self) -> usize {
        let dropped = self.lines.take().len() + self.utf8.pending_len();
        self.utf8 = Utf8Decoder::new();
        if dropped > 0 {
            log::debug!("discarding {dropped} bytes of unterminated trailing data");
        }
        dropped
    }

    /// Whether no text is waiting for a line terminator
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.lines.is_empty() && self.utf8.pending_len() == 0
    }
}

/// Server-Sent Events reader for streaming chat completions
pub struct SseParser {
    byte_stream: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    decoder: DeltaDecoder,
    yielded: usize,
    finished: bool,
}

impl SseParser {
    pub fn new(response: reqwest::Response) -> Self {
        Self::from_byte_stream(response.bytes_stream())
    }

    /// Read from any byte stream, e.g. a response body already split into chunks
    pub fn from_byte_stream<S>(stream: S) -> Self
    where
        S: futures_util::Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    {
        Self {
            byte_stream: stream.boxed(),
            decoder: DeltaDecoder::new(),
            yielded: 0,
            finished: false,
        }
    }

    /// Get the next text delta from the stream.
    ///
    /// Reads from the network only when no complete line is buffered. Returns
    /// `Ok(None)` once the body ends.
    ///
    /// # Errors
    ///
    /// Fails if reading the body fails. Malformed frames are logged and skipped.
    pub async fn next_delta(&mut self) -> Result<Option<String>, CommonRequestError> {
        loop {
            if let Some(delta) = self.decoder.next_delta() {
                self.yielded += 1;
                return Ok(Some(delta));
            }

            if self.finished {
                return Ok(None);
            }

            if let Some(chunk) = self.byte_stream.next().await {
                self.decoder.push(&chunk?);
            } else {
                self.finished = true;
                self.decoder.finish();
                log::debug!("stream completed after {} deltas", self.yielded);
                return Ok(None);
            }
        }
    }

    /// Number of deltas handed out so far
    #[must_use]
    pub fn yielded(&self) -> usize {
        self.yielded
    }
}
