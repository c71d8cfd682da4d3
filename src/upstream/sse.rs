//! Incremental decoder for `text/event-stream` bodies.
//!
//! Network reads do not line up with event boundaries, so bytes are buffered
//! until a full line is available. Only `data` fields are kept; comments and
//! other fields are dropped.

use bytes::BytesMut;

#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of the current, not yet terminated line.
    buf: BytesMut,

    /// `data` lines of the event being assembled.
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read. Returns the payload of every event it completes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            self.handle_line(trim_line_ending(&line), &mut events);
        }
        events
    }

    /// Flush an event left unterminated when the body ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = self.buf.split();
        let mut events = Vec::new();
        if !rest.is_empty() {
            self.handle_line(trim_line_ending(&rest), &mut events);
        }
        events.pop().or_else(|| self.dispatch())
    }

    fn handle_line(&mut self, line: &[u8], events: &mut Vec<String>) {
        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }

        let line = String::from_utf8_lossy(line);
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (&*line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
