//! Dissection pipeline: resynchronize the stream, route frames to
//! contexts, drive the series assembler, parse reassembled fragments.

use tracing::{debug, error, trace, warn};

use crate::app::{parse_message, AppError, AppMessage, Fragment};
use crate::config::DissectorSettings;
use crate::context::{Context, ContextTable, TableStats};
use crate::link::{next_frame, plausible_start, Frame, LinkFunction, Synced};
use crate::transport::{encode_tokens, parse_segment, FeedOutcome, Segment, SeriesAssembler};

/// Observer for dissection events.
///
/// Calls are synchronous and arrive in strict order: within one context
/// every `transport_segment` precedes any `transport_payload` or `app_*`
/// call derived from it, and each `app_*` call is immediately preceded by
/// its `transport_payload`.
pub trait Hooks {
    /// Every link frame recognized in the stream, with its raw bytes
    /// (including any skipped prefix)
    fn link_frame(&mut self, _frame: &Frame, _raw: &[u8]) {}
    /// A USER_DATA payload failed the transport-segment parse
    fn transport_reject(&mut self) {}
    /// A transport segment was accepted
    fn transport_segment(&mut self, _segment: &Segment) {}
    /// A segment series completed; `payload` is the reassembled fragment
    fn transport_payload(&mut self, _payload: &[u8]) {}
    /// The application parse succeeded; `raw_frames` are the accumulated
    /// frame bytes the fragment arrived in
    fn app_fragment(&mut self, _fragment: &Fragment, _raw_frames: &[u8]) {}
    /// The application parse produced a diagnostic token
    fn app_error(&mut self, _error: AppError) {}
    /// The application parse failed outright
    fn app_reject(&mut self) {}
}

/// Counters for one dissector instance
#[derive(Debug, Clone, Default)]
pub struct DissectorStats {
    pub bytes_fed: u64,
    pub frames: u64,
    pub crc_dropped: u64,
    pub resync_skipped: u64,
    pub junk_dropped: u64,
    pub segments: u64,
    pub transport_rejects: u64,
    pub payloads: u64,
    pub fragments: u64,
    pub app_errors: u64,
    pub app_rejects: u64,
}

/// A streaming DNP3 dissector.
///
/// One instance owns its rolling input buffer, its context table, and any
/// in-flight reassembly state; feed it from a single conversation
/// direction. Instances are independent and may run on separate threads.
pub struct Dissector<H: Hooks> {
    hooks: H,
    buf: Vec<u8>,
    buf_len: usize,
    contexts: ContextTable,
    stats: DissectorStats,
}

impl<H: Hooks> Dissector<H> {
    pub fn new(settings: &DissectorSettings, hooks: H) -> Self {
        Self {
            hooks,
            buf: Vec::with_capacity(settings.buf_len),
            buf_len: settings.buf_len,
            contexts: ContextTable::new(settings.ctx_max),
            stats: DissectorStats::default(),
        }
    }

    /// Consume a chunk of the input stream.
    ///
    /// Frames are processed as soon as they are complete; the unconsumed
    /// tail stays buffered until more input arrives. Chunk boundaries do
    /// not affect the emitted event sequence.
    pub fn feed(&mut self, mut input: &[u8]) {
        self.stats.bytes_fed += input.len() as u64;
        while !input.is_empty() {
            let room = self.buf_len - self.buf.len();
            if room == 0 {
                self.force_room();
                continue;
            }
            let take = room.min(input.len());
            self.buf.extend_from_slice(&input[..take]);
            input = &input[take..];
            self.drain();
        }
    }

    /// Tear the instance down, dropping all contexts and abandoning any
    /// in-flight series without emitting partial results. Returns the
    /// hook sink.
    pub fn finish(mut self) -> H {
        debug!(
            "finish: {} frames, {} segments, {} fragments, {} contexts live",
            self.stats.frames,
            self.stats.segments,
            self.stats.fragments,
            self.contexts.len()
        );
        self.contexts.clear();
        self.hooks
    }

    pub fn stats(&self) -> &DissectorStats {
        &self.stats
    }

    pub fn context_stats(&self) -> &TableStats {
        &self.contexts.stats
    }

    pub fn active_contexts(&self) -> usize {
        self.contexts.len()
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Pull every complete frame out of the buffer and compact the rest.
    fn drain(&mut self) {
        let mut offset = 0;
        loop {
            match next_frame(&self.buf[offset..]) {
                Synced::Frame {
                    frame,
                    consumed,
                    skipped,
                } => {
                    if skipped > 0 {
                        trace!("resynchronized after {} junk bytes", skipped);
                        self.stats.resync_skipped += skipped as u64;
                    }
                    let raw = self.buf[offset..offset + consumed].to_vec();
                    self.process_link_frame(frame, &raw);
                    offset += consumed;
                }
                Synced::NeedMore => break,
            }
        }
        if offset > 0 {
            self.buf.drain(..offset);
        }
    }

    /// The buffer is full of bytes that contain no complete frame. Drop
    /// the prefix that cannot begin one so input can keep flowing; a
    /// recoverable frame start is never discarded since frames are far
    /// smaller than the buffer.
    fn force_room(&mut self) {
        let cut = plausible_start(&self.buf[1..])
            .map(|p| p + 1)
            .unwrap_or(self.buf.len());
        warn!("input buffer full with no frame, dropping {} bytes", cut);
        self.stats.junk_dropped += cut as u64;
        self.buf.drain(..cut);
    }

    fn process_link_frame(&mut self, frame: Frame, raw: &[u8]) {
        self.stats.frames += 1;
        self.hooks.link_frame(&frame, raw);

        match frame.control.function {
            LinkFunction::UnconfirmedUserData => {
                let Some(payload) = frame.payload.as_deref() else {
                    // CRC error: the frame was reported, its payload is gone
                    self.stats.crc_dropped += 1;
                    debug!("dropping user data with bad CRC from {}", frame.source);
                    return;
                };

                let ctx = self.contexts.lookup_or_create(frame.source, frame.destination);

                let segment = match parse_segment(payload) {
                    Ok((_, segment)) => segment,
                    Err(_) => {
                        // only an empty payload parses as no segment
                        self.stats.transport_rejects += 1;
                        self.hooks.transport_reject();
                        return;
                    }
                };

                if ctx.raw.len() + raw.len() <= self.buf_len {
                    ctx.raw.extend_from_slice(raw);
                } else {
                    error!(
                        "context {} -> {} raw buffer at {} bytes, dropping {} byte frame",
                        ctx.src,
                        ctx.dst,
                        ctx.raw.len(),
                        raw.len()
                    );
                }

                Self::process_transport_segment(&mut self.hooks, &mut self.stats, ctx, &segment);
            }
            LinkFunction::ConfirmedUserData => {
                if frame.payload.is_some() {
                    error!(
                        "confirmed user data from {} not supported, ignoring",
                        frame.source
                    );
                }
            }
            _ => {}
        }
    }

    fn process_transport_segment(
        hooks: &mut H,
        stats: &mut DissectorStats,
        ctx: &mut Context,
        segment: &Segment,
    ) {
        stats.segments += 1;
        hooks.transport_segment(segment);

        let tokens = encode_tokens(segment, ctx.last_segment.as_ref());
        ctx.last_segment = Some(segment.clone());

        let n = tokens.len();
        let mut m = 0;
        while m < n {
            if ctx.assembler.is_none() {
                ctx.assembler = Some(SeriesAssembler::start());
                ctx.tokens_fed = 0;
            }
            let outcome = ctx
                .assembler
                .as_mut()
                .expect("assembler initialized above")
                .feed(&tokens[m..]);
            match outcome {
                FeedOutcome::NeedMore => break,
                FeedOutcome::Match { end, payload } => {
                    let consumed = (end - ctx.tokens_fed) as usize;
                    debug_assert!(consumed > 0);
                    if let Some(bytes) = payload {
                        Self::process_transport_payload(hooks, stats, ctx, &bytes);
                    }
                    // any series terminator flushes the raw-frame buffer
                    ctx.raw.clear();
                    ctx.assembler = None;
                    m += consumed;
                }
            }
        }

        // A Fin token always commits, so a machine left open here was fed
        // every token of this chunk.
        if ctx.assembler.is_some() {
            ctx.tokens_fed += n as u64;
        } else {
            ctx.tokens_fed = 0;
        }
    }

    fn process_transport_payload(
        hooks: &mut H,
        stats: &mut DissectorStats,
        ctx: &mut Context,
        payload: &[u8],
    ) {
        stats.payloads += 1;
        hooks.transport_payload(payload);

        match parse_message(payload) {
            Some(AppMessage::Fragment(fragment)) => {
                stats.fragments += 1;
                hooks.app_fragment(&fragment, &ctx.raw);
            }
            Some(AppMessage::Invalid(error)) => {
                stats.app_errors += 1;
                hooks.app_error(error);
            }
            None => {
                stats.app_rejects += 1;
                hooks.app_reject();
            }
        }

        ctx.raw.clear();
    }
}
