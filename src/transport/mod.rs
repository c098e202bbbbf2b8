//! DNP3 transport layer: segment grammar, input tokens, series reassembly.

mod assembler;
mod tokens;

pub use assembler::{FeedOutcome, SeriesAssembler};
pub use tokens::{encode_tokens, Token, TokenKind};

use std::fmt;

use nom::number::complete::u8 as octet;
use nom::IResult;
use serde::Serialize;

/// Maximum payload octets in one segment (one frame payload minus the
/// transport header octet)
pub const MAX_SEGMENT_PAYLOAD: usize = crate::link::MAX_FRAME_PAYLOAD - 1;

/// A decoded transport segment.
///
/// Equality is field- and byte-exact, which is what duplicate detection
/// relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub fir: bool,
    pub fin: bool,
    pub seq: u8,
    pub payload: Vec<u8>,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        if self.fir {
            write!(f, "fir")?;
        }
        if self.fin {
            write!(f, "{}fin", if self.fir { "," } else { "" })?;
        }
        write!(f, ") seq={} len={}", self.seq, self.payload.len())
    }
}

/// Parse a link-frame payload as a transport segment.
///
/// Only an empty payload is rejected: USER_DATA frames must carry at least
/// the transport header octet (AN2013-004b).
pub fn parse_segment(input: &[u8]) -> IResult<&[u8], Segment> {
    let (rest, header) = octet(input)?;
    let segment = Segment {
        fin: header & 0x80 != 0,
        fir: header & 0x40 != 0,
        seq: header & 0x3f,
        payload: rest.to_vec(),
    };
    Ok((&rest[rest.len()..], segment))
}
