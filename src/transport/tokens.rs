//! Input tokens for the series assembler.
//!
//! Each incoming segment is translated into one or two events:
//!
//! - `Fir`: the segment carries the FIR bit
//! - `Dup`: FIR unset and bit-identical to the previous segment
//! - `Next`: FIR unset and seq == (previous seq + 1) mod 64
//! - `Gap`: FIR unset with any other seq
//! - `Orphan`: FIR unset and no previous segment recorded
//! - `Fin`: appended when the segment carries the FIN bit
//!
//! `Dup` covers link-layer retransmission, `Next` advances the running
//! series, `Gap` and `Orphan` are arrivals the assembler discards a series
//! over.

use super::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Fir,
    Dup,
    Next,
    Gap,
    Orphan,
    Fin,
}

/// A token plus the segment whose payload it stands for.
///
/// `Fin` only marks the end of the segment that produced the preceding
/// token and carries no segment itself.
#[derive(Debug, Clone, Copy)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub segment: Option<&'a Segment>,
}

/// Translate an incoming segment into assembler input.
pub fn encode_tokens<'a>(segment: &'a Segment, last: Option<&Segment>) -> Vec<Token<'a>> {
    let first = if segment.fir {
        TokenKind::Fir
    } else if let Some(last) = last {
        if segment == last {
            TokenKind::Dup
        } else if segment.seq == (last.seq + 1) % 64 {
            TokenKind::Next
        } else {
            TokenKind::Gap
        }
    } else {
        TokenKind::Orphan
    };

    let mut out = vec![Token {
        kind: first,
        segment: Some(segment),
    }];
    if segment.fin {
        out.push(Token {
            kind: TokenKind::Fin,
            segment: None,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(fir: bool, fin: bool, seq: u8, payload: &[u8]) -> Segment {
        Segment {
            fir,
            fin,
            seq,
            payload: payload.to_vec(),
        }
    }

    fn kinds(segment: &Segment, last: Option<&Segment>) -> Vec<TokenKind> {
        encode_tokens(segment, last).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_fir_wins_over_history() {
        let last = seg(false, false, 7, b"x");
        assert_eq!(kinds(&seg(true, false, 0, b"a"), Some(&last)), [TokenKind::Fir]);
    }

    #[test]
    fn test_no_history_is_orphan() {
        assert_eq!(kinds(&seg(false, false, 0, b"a"), None), [TokenKind::Orphan]);
    }

    #[test]
    fn test_identical_segment_is_dup() {
        let last = seg(false, false, 5, b"abc");
        assert_eq!(kinds(&last.clone(), Some(&last)), [TokenKind::Dup]);
    }

    #[test]
    fn test_payload_mismatch_breaks_dup() {
        let last = seg(false, false, 5, b"abc");
        // same header, different bytes: not a retransmission
        assert_eq!(kinds(&seg(false, false, 5, b"abd"), Some(&last)), [TokenKind::Gap]);
    }

    #[test]
    fn test_successor_seq_is_next() {
        let last = seg(true, false, 5, b"a");
        assert_eq!(kinds(&seg(false, false, 6, b"b"), Some(&last)), [TokenKind::Next]);
    }

    #[test]
    fn test_seq_wraps_mod_64() {
        let last = seg(true, false, 63, b"a");
        assert_eq!(kinds(&seg(false, false, 0, b"b"), Some(&last)), [TokenKind::Next]);
    }

    #[test]
    fn test_out_of_order_is_gap() {
        let last = seg(true, false, 0, b"a");
        assert_eq!(kinds(&seg(false, false, 4, b"x"), Some(&last)), [TokenKind::Gap]);
    }

    #[test]
    fn test_fin_appends_second_token() {
        let last = seg(true, false, 0, b"a");
        assert_eq!(
            kinds(&seg(false, true, 1, b"b"), Some(&last)),
            [TokenKind::Next, TokenKind::Fin]
        );
        let last_seg = seg(true, true, 3, b"z");
        let tokens = encode_tokens(&last_seg, None);
        assert!(tokens[1].segment.is_none());
    }
}
