//! Incremental recognizer for transport segment series.
//!
//! Over the token alphabet the well-formed inputs are the greedy regular
//! language
//!
//! ```text
//! ( Fir+ [Next Dup]* ( Fin | Gap | Orphan ) | [^Fir] )*
//! ```
//!
//! A series opens with one or more `Fir` tokens (the last one wins; every
//! earlier `Fir` abandons the series it started), continues over `Next`
//! and `Dup`, and ends either with `Fin`, committing the reassembled
//! payload, or with an out-of-order token, discarding it. Any other token
//! outside a series is consumed and ignored. Compare IEEE 1815-2012
//! Figure 8-4, the transport reception state diagram.

use tracing::trace;

use super::tokens::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Series,
}

/// In-flight reassembly state for one context.
#[derive(Debug)]
pub struct SeriesAssembler {
    state: State,
    assembled: Vec<u8>,
    /// Tokens consumed since `start`; match positions are reported in
    /// this absolute unit
    pos: u64,
}

/// Outcome of feeding a token chunk.
#[derive(Debug, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Everything consumed, no decision yet
    NeedMore,
    /// A top-level alternative committed at absolute token index `end`.
    /// `payload` carries the reassembled series, or `None` when the match
    /// was a discard.
    Match {
        end: u64,
        payload: Option<Vec<u8>>,
    },
}

impl SeriesAssembler {
    pub fn start() -> Self {
        Self {
            state: State::Idle,
            assembled: Vec::new(),
            pos: 0,
        }
    }

    /// Consume tokens until a match commits or the chunk is exhausted.
    ///
    /// Payload bytes are copied out of the referenced segments as tokens
    /// are consumed; nothing borrowed from `tokens` survives this call.
    /// The caller re-feeds any tokens past a committed match into a fresh
    /// assembler.
    pub fn feed(&mut self, tokens: &[Token<'_>]) -> FeedOutcome {
        for token in tokens {
            self.pos += 1;
            match (self.state, token.kind) {
                (State::Idle, TokenKind::Fir) => self.begin(token),
                (State::Idle, _) => {
                    // stray token outside a series: consume and ignore
                    return FeedOutcome::Match {
                        end: self.pos,
                        payload: None,
                    };
                }
                (State::Series, TokenKind::Fir) => {
                    trace!("series restarted, dropping {} assembled octets", self.assembled.len());
                    self.begin(token);
                }
                (State::Series, TokenKind::Next) => {
                    if let Some(segment) = token.segment {
                        self.assembled.extend_from_slice(&segment.payload);
                    }
                }
                (State::Series, TokenKind::Dup) => {
                    // retransmission; its payload is already assembled
                }
                (State::Series, TokenKind::Fin) => {
                    self.state = State::Idle;
                    let payload = std::mem::take(&mut self.assembled);
                    return FeedOutcome::Match {
                        end: self.pos,
                        payload: Some(payload),
                    };
                }
                (State::Series, TokenKind::Gap | TokenKind::Orphan) => {
                    self.state = State::Idle;
                    self.assembled.clear();
                    return FeedOutcome::Match {
                        end: self.pos,
                        payload: None,
                    };
                }
            }
        }
        // A Fin token always commits, so an undecided chunk ends mid-series.
        FeedOutcome::NeedMore
    }

    fn begin(&mut self, token: &Token<'_>) {
        self.state = State::Series;
        self.assembled.clear();
        if let Some(segment) = token.segment {
            self.assembled.extend_from_slice(&segment.payload);
        }
    }
}
