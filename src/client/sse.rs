//! Incremental server-sent-event decoding
//!
//! [`SseDecoder`] turns arbitrary byte chunks into complete event records.
//! A chunk boundary may fall anywhere: inside a field line, between the two
//! newlines of a record separator, or in the middle of a multi-byte UTF-8
//! character. Incomplete input stays buffered until the rest arrives, so the
//! records produced never depend on how the body was split on the wire.
//!
//! SSE field processing:
//!
//! - `event:` -- the record's event name (whitespace trimmed).
//! - `data:` -- one payload line; a single leading space is stripped and
//!   multiple lines are joined with `\n`.
//! - `id:` -- kept on the record for callers that track resumption.
//! - Lines starting with `:` are comments; `retry:` and unknown fields are
//!   ignored.

/// One complete SSE record (the text between two blank-line separators).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseRecord {
    /// Value of the `event:` field, if present
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`
    pub data: String,
    /// Value of the `id:` field, if present
    pub id: Option<String>,
}

/// Stateful decoder from raw body chunks to [`SseRecord`]s.
///
/// # Examples
///
/// ```
/// use docchat::client::sse::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.push(b"event: token\ndata: {\"tok").is_empty());
/// let records = decoder.push(b"en\":\"hi\"}\n\n");
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].event.as_deref(), Some("token"));
/// assert_eq!(records[0].data, r#"{"token":"hi"}"#);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Undecoded tail of the previous chunk (an incomplete UTF-8 sequence)
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a blank line
    buffer: String,
}

impl SseDecoder {
    /// Creates an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every record it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseRecord> {
        self.decode_into_buffer(chunk);

        let mut records = Vec::new();
        // SSE events are separated by blank lines (`\n\n`).
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(record) = parse_record(&block[..pos]) {
                records.push(record);
            }
        }
        records
    }

    /// Flush whatever is left once the body has ended.
    ///
    /// A trailing record without its closing blank line is still returned;
    /// a dangling partial UTF-8 sequence decodes to U+FFFD.
    pub fn finish(&mut self) -> Option<SseRecord> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let rest = std::mem::take(&mut self.buffer);
        parse_record(rest.trim_end_matches('\n'))
    }

    /// Returns true if no partial input is buffered
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.buffer.is_empty()
    }

    fn decode_into_buffer(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        while consumed < self.pending.len() {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                }
                Err(e) => {
                    let valid_end = consumed + e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[consumed..valid_end]) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        // Invalid bytes mid-stream: replace and keep going.
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + len;
                        }
                        // Incomplete sequence at the end: wait for the next chunk.
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);

        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
    }
}

/// Parse a single record block. Returns `None` for blocks with neither an
/// event name nor data (keep-alive comments, stray blank lines).
fn parse_record(block: &str) -> Option<SseRecord> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event: Option<String> = None;
    let mut id: Option<String> = None;

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("id:") {
            id = Some(value.trim().to_string());
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseRecord {
        event,
        data: data_lines.join("\n"),
        id,
    })
}
