//! Event records, human-readable rendering, and ready-made hook sinks.

use std::io::{self, Write};

use serde::Serialize;

use crate::app::{AppError, Fragment};
use crate::dissect::Hooks;
use crate::link::Frame;
use crate::transport::Segment;

/// One dissection event, owned and serializable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    LinkFrame {
        source: u16,
        destination: u16,
        function: String,
        crc_ok: bool,
        len: usize,
    },
    TransportReject,
    TransportSegment {
        segment: Segment,
    },
    TransportPayload {
        payload: Vec<u8>,
    },
    AppFragment {
        fragment: Fragment,
        raw_len: usize,
    },
    AppError {
        error: AppError,
    },
    AppReject,
}

impl Event {
    fn from_frame(frame: &Frame) -> Self {
        Event::LinkFrame {
            source: frame.source,
            destination: frame.destination,
            function: frame.control.function.to_string(),
            crc_ok: frame.payload.is_some(),
            len: frame.len,
        }
    }
}

/// Hook sink that records every event; useful for embedding and tests.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<Event>,
}

impl Hooks for EventLog {
    fn link_frame(&mut self, frame: &Frame, _raw: &[u8]) {
        self.events.push(Event::from_frame(frame));
    }

    fn transport_reject(&mut self) {
        self.events.push(Event::TransportReject);
    }

    fn transport_segment(&mut self, segment: &Segment) {
        self.events.push(Event::TransportSegment {
            segment: segment.clone(),
        });
    }

    fn transport_payload(&mut self, payload: &[u8]) {
        self.events.push(Event::TransportPayload {
            payload: payload.to_vec(),
        });
    }

    fn app_fragment(&mut self, fragment: &Fragment, raw_frames: &[u8]) {
        self.events.push(Event::AppFragment {
            fragment: fragment.clone(),
            raw_len: raw_frames.len(),
        });
    }

    fn app_error(&mut self, error: AppError) {
        self.events.push(Event::AppError { error });
    }

    fn app_reject(&mut self) {
        self.events.push(Event::AppReject);
    }
}

/// Hook sink that renders events as text or JSON lines.
pub struct Printer<W: Write> {
    out: W,
    json: bool,
    label: Option<String>,
}

impl Printer<io::Stdout> {
    pub fn stdout(json: bool) -> Self {
        Self {
            out: io::stdout(),
            json,
            label: None,
        }
    }
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            out,
            json,
            label: None,
        }
    }

    /// Prefix every text line with a stream label (pcap mode interleaves
    /// several streams on one output)
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn emit_json(&mut self, event: &Event) {
        if let Ok(line) = serde_json::to_string(event) {
            let _ = writeln!(self.out, "{}", line);
        }
    }

    fn emit_text(&mut self, line: std::fmt::Arguments<'_>) {
        let _ = match &self.label {
            Some(label) => writeln!(self.out, "[{}] {}", label, line),
            None => writeln!(self.out, "{}", line),
        };
    }
}

impl<W: Write> Hooks for Printer<W> {
    fn link_frame(&mut self, frame: &Frame, _raw: &[u8]) {
        if self.json {
            self.emit_json(&Event::from_frame(frame));
        } else {
            self.emit_text(format_args!("L> {}", frame));
        }
    }

    fn transport_reject(&mut self) {
        if self.json {
            self.emit_json(&Event::TransportReject);
        } else {
            self.emit_text(format_args!("T! segment rejected"));
        }
    }

    fn transport_segment(&mut self, segment: &Segment) {
        if self.json {
            self.emit_json(&Event::TransportSegment {
                segment: segment.clone(),
            });
        } else {
            self.emit_text(format_args!("T> {}", segment));
        }
    }

    fn transport_payload(&mut self, payload: &[u8]) {
        if self.json {
            self.emit_json(&Event::TransportPayload {
                payload: payload.to_vec(),
            });
        } else {
            self.emit_text(format_args!("T: reassembled {} octets", payload.len()));
        }
    }

    fn app_fragment(&mut self, fragment: &Fragment, raw_frames: &[u8]) {
        if self.json {
            self.emit_json(&Event::AppFragment {
                fragment: fragment.clone(),
                raw_len: raw_frames.len(),
            });
        } else {
            self.emit_text(format_args!("A> {}", fragment));
        }
    }

    fn app_error(&mut self, error: AppError) {
        if self.json {
            self.emit_json(&Event::AppError { error });
        } else {
            self.emit_text(format_args!("A! {}", error));
        }
    }

    fn app_reject(&mut self) {
        if self.json {
            self.emit_json(&Event::AppReject);
        } else {
            self.emit_text(format_args!("A! rejected"));
        }
    }
}
