//! Wire framing for the event stream.
//!
//! Each event is written as `event: <label>\ndata: <json>\n\n`. The parser
//! is incremental: bytes may arrive split anywhere, including inside a
//! multi-byte character, and frames are only produced once their blank
//! terminator line has been seen.

use thiserror::Error;
use tracing::warn;

use crate::pipeline::events::PipelineEvent;

/// Label used when a frame carries data but no `event:` line.
const DEFAULT_LABEL: &str = "message";

#[derive(Debug, Error)]
pub enum StreamProtocolError {
    #[error("malformed '{label}' payload: {source}")]
    MalformedCritical {
        label: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Serializes one event into its wire frame.
pub fn encode_frame(event: &PipelineEvent) -> Result<String, serde_json::Error> {
    let data = event.payload_json()?;
    Ok(format!("event: {}\ndata: {}\n\n", event.label(), data))
}

/// One dispatched frame: its label and the joined data lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub label: String,
    pub data: String,
}

impl Frame {
    /// Decodes the payload. Unknown labels and unparseable non-critical
    /// payloads yield `Ok(None)`; an unparseable `complete`/`error` is a
    /// protocol error.
    pub fn decode(&self) -> Result<Option<PipelineEvent>, StreamProtocolError> {
        match PipelineEvent::decode(&self.label, &self.data) {
            Ok(event) => Ok(event),
            Err(source) if PipelineEvent::is_critical_label(&self.label) => {
                Err(StreamProtocolError::MalformedCritical {
                    label: self.label.clone(),
                    source,
                })
            }
            Err(e) => {
                warn!("Ignoring malformed '{}' payload: {e}", self.label);
                Ok(None)
            }
        }
    }
}

/// Incremental line-buffering parser.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    /// Bytes after the last complete line.
    partial: Vec<u8>,
    label: Option<String>,
    data: Vec<String>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a chunk and returns every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.partial.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.partial[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let mut line = &self.partial[start..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.partial.drain(..start);
        frames
    }

    /// Flushes a trailing unterminated line and any pending frame at end of input.
    pub fn finish(&mut self) -> Option<Frame> {
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            let line = String::from_utf8_lossy(&rest).into_owned();
            let line = line.strip_suffix('\r').unwrap_or(line.as_str()).to_string();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.label = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let label = self.label.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(Frame {
            label: label.unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CoverLetterDraft;
    use crate::pipeline::phase::Phase;
    use chrono::Utc;

    fn letter_frame() -> String {
        let event = PipelineEvent::CoverLetter(CoverLetterDraft {
            job_id: "job-1".to_string(),
            content: "Sehr geehrte Damen und Herren, ich freue mich über die Stelle – 日本語も話せます。"
                .to_string(),
            highlighted_experiences: vec!["Führung eines Teams".to_string()],
            customizations: vec![],
            generated_at: Utc::now(),
        });
        encode_frame(&event).unwrap()
    }

    #[test]
    fn test_single_frame_round_trip() {
        let wire = encode_frame(&PipelineEvent::phase(Phase::Analyzing, 52, "batch 1")).unwrap();
        let mut parser = EventStreamParser::new();
        let frames = parser.feed(wire.as_bytes());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].label, "phase");
        match frames[0].decode().unwrap() {
            Some(PipelineEvent::Phase(update)) => assert_eq!(update.progress, 52),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_multibyte_payload_split_mid_character() {
        let wire = letter_frame();
        let bytes = wire.as_bytes();
        let split = wire.find("日本").unwrap() + 1;
        assert!(!wire.is_char_boundary(split));

        let mut parser = EventStreamParser::new();
        assert!(parser.feed(&bytes[..split]).is_empty());
        let frames = parser.feed(&bytes[split..]);
        assert_eq!(frames.len(), 1);
        match frames[0].decode().unwrap() {
            Some(PipelineEvent::CoverLetter(letter)) => {
                assert!(letter.content.contains("日本語"));
                assert_eq!(letter.highlighted_experiences, vec!["Führung eines Teams"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_byte_at_a_time_feed() {
        let wire = format!(
            "{}{}",
            letter_frame(),
            encode_frame(&PipelineEvent::heartbeat_now()).unwrap()
        );
        let mut parser = EventStreamParser::new();
        let frames: Vec<Frame> = wire
            .as_bytes()
            .iter()
            .flat_map(|b| parser.feed(std::slice::from_ref(b)))
            .collect();
        let labels: Vec<&str> = frames.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["coverLetter", "heartbeat"]);
    }

    #[test]
    fn test_crlf_comments_and_multiline_data() {
        let wire = b": keep-alive\r\nevent: custom\r\ndata: first\r\ndata: second\r\n\r\n";
        let mut parser = EventStreamParser::new();
        let frames = parser.feed(wire);
        assert_eq!(
            frames,
            vec![Frame {
                label: "custom".to_string(),
                data: "first\nsecond".to_string(),
            }]
        );
        assert_eq!(frames[0].decode().unwrap(), None);
    }

    #[test]
    fn test_label_resets_between_frames() {
        let mut parser = EventStreamParser::new();
        let frames = parser.feed(b"event: job\n\ndata: {}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].label, DEFAULT_LABEL);
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut parser = EventStreamParser::new();
        assert!(parser.feed(b"event: heartbeat\ndata: {\"timestamp\":1}").is_empty());
        let frame = parser.finish().unwrap();
        assert_eq!(frame.label, "heartbeat");
        assert_eq!(frame.data, "{\"timestamp\":1}");
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_malformed_non_critical_payload_is_ignored() {
        let frame = Frame {
            label: "job".to_string(),
            data: "{\"id\": ".to_string(),
        };
        assert!(frame.decode().unwrap().is_none());
    }

    #[test]
    fn test_malformed_terminal_payload_is_an_error() {
        let frame = Frame {
            label: "error".to_string(),
            data: "not json".to_string(),
        };
        assert!(matches!(
            frame.decode(),
            Err(StreamProtocolError::MalformedCritical { .. })
        ));
    }
}
