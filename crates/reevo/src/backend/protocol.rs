//! The Reevo chat API answers with a line based data stream. Each line is a
//! one character type tag, a colon and a JSON payload:
//!
//! - `0:` text delta, a JSON string
//! - `9:` tool call, `a:` tool result
//! - `2:` data such as the created chat
//! - `e:` / `d:` step and message finish reasons
//! - `f:` message metadata
//!
//! Only text deltas are relevant for speech; everything else is dropped.
use serde_json::json;

/// Incrementally turns raw bytes into UTF-8 text.
///
/// Chunk boundaries on the wire can split a multibyte character, the tail is
/// kept until the next chunk completes it.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                text
            }
        }
    }

    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Incremental decoder for the data stream, yielding only the text parts
#[derive(Debug, Default)]
pub struct DataStreamDecoder {
    line: String,
}

impl DataStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more text, returning the text deltas of every line completed by it
    pub fn push(&mut self, chunk: &str) -> String {
        self.line.push_str(chunk);
        let mut out = String::new();
        while let Some(end) = self.line.find('\n') {
            let line: String = self.line.drain(..=end).collect();
            if let Some(text) = decode_line(line.trim_end_matches(['\n', '\r'])) {
                out.push_str(&text);
            }
        }
        out
    }

    /// Decode whatever is left once the stream has ended
    pub fn finish(&mut self) -> String {
        let line = std::mem::take(&mut self.line);
        decode_line(line.trim_end_matches(['\n', '\r'])).unwrap_or_default()
    }
}

fn decode_line(line: &str) -> Option<String> {
    let payload = line.strip_prefix("0:")?;
    if payload.len() >= 2 && payload.starts_with('"') && payload.ends_with('"') {
        match serde_json::from_str::<String>(payload) {
            Ok(text) => Some(text),
            Err(_) => Some(payload.trim_matches('"').to_string()),
        }
    } else {
        Some(payload.to_string())
    }
}

/// Decode a complete data stream body in one go
pub fn decode_data_stream(raw: &str) -> String {
    let mut decoder = DataStreamDecoder::new();
    let mut text = decoder.push(raw);
    text.push_str(&decoder.finish());
    text
}

pub fn format_text(text: &str) -> String {
    let encoded_text = serde_json::to_string(text).unwrap_or_default();
    format!("0:{}\n", encoded_text)
}

pub fn format_finish(reason: &str) -> String {
    let finish = json!({
        "finishReason": reason,
        "usage": {
            "promptTokens": 0,
            "completionTokens": 0
        }
    });
    format!("d:{}\n", finish)
}
