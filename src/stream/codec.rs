//! `event:`/`data:` frame codec for the pipeline stream.
//!
//! A frame is a run of `field: value` lines terminated by a blank line.
//! Only the `event` and `data` fields carry meaning; `:` lines are comments.

use tracing::{debug, warn};

use crate::errors::ConsoleError;
use crate::models::{EventKind, PipelineEvent};

/// Kind reported for a frame with no `event:` line.
pub const DEFAULT_FRAME_KIND: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self { event: event.into(), data: data.into() }
    }

    pub fn encode(&self) -> String {
        encode_frame(&self.event, &self.data)
    }
}

/// Serialize one frame. Multi-line data is split across several `data:` lines.
pub fn encode_frame(event: &str, data: &str) -> String {
    let mut out = String::with_capacity(event.len() + data.len() + 16);
    out.push_str("event: ");
    out.push_str(event);
    out.push('\n');
    for line in data.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Incremental frame parser. Feed it arbitrary byte chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    dropped: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = match String::from_utf8(line) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Dropping stream line with invalid UTF-8");
                    self.dropped += 1;
                    continue;
                }
            };

            if let Some(frame) = self.accept_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Signal end of input. A partially received frame is an error.
    pub fn finish(&mut self) -> Result<(), ConsoleError> {
        let leftover = !self.buffer.is_empty() || self.event.is_some() || !self.data.is_empty();
        self.buffer.clear();
        self.event = None;
        self.data.clear();
        if leftover {
            Err(ConsoleError::Protocol("stream ended in the middle of a frame".into()))
        } else {
            Ok(())
        }
    }

    /// Lines discarded because they were not valid UTF-8.
    pub fn dropped_lines(&self) -> usize {
        self.dropped
    }

    fn accept_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.take_frame();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            other => debug!(field = other, "Ignoring unknown stream field"),
        }
        None
    }

    fn take_frame(&mut self) -> Option<Frame> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(Frame {
            event: event.unwrap_or_else(|| DEFAULT_FRAME_KIND.to_string()),
            data,
        })
    }
}

impl PipelineEvent {
    pub fn to_frame(&self) -> Result<Frame, ConsoleError> {
        Ok(Frame::new(self.kind().as_str(), self.payload_json()?))
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, ConsoleError> {
        let kind = EventKind::parse(&frame.event).ok_or_else(|| {
            ConsoleError::Protocol(format!("unknown event kind '{}'", frame.event))
        })?;
        PipelineEvent::from_payload(kind, &frame.data).map_err(|e| {
            ConsoleError::Protocol(format!("malformed '{}' payload: {}", frame.event, e))
        })
    }
}

pub fn encode_event(event: &PipelineEvent) -> Result<String, ConsoleError> {
    Ok(event.to_frame()?.encode())
}

pub fn decode_event(frame: &Frame) -> Result<PipelineEvent, ConsoleError> {
    PipelineEvent::from_frame(frame)
}
