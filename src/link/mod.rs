//! DNP3 link layer: frame grammar and stream resynchronization.

pub mod crc;
mod sync;

pub use crc::crc16;
pub use sync::{next_frame, Synced};
pub(crate) use sync::plausible_start;

use std::fmt;

use nom::bytes::complete::{tag, take};
use nom::number::complete::{le_u16, u8 as octet};
use nom::IResult;
use serde::Serialize;

/// Start-of-frame sentinel octets
pub const START_OCTETS: [u8; 2] = [0x05, 0x64];

/// Maximum user octets in one frame (LEN = 255 minus the 5 counted header
/// octets)
pub const MAX_FRAME_PAYLOAD: usize = 250;

/// Maximum on-wire size of one frame: a 10-octet header block plus 250
/// user octets in 16 CRC-protected blocks
pub const MAX_FRAME_WIRE_LEN: usize = 292;

/// Link-layer function, qualified by the PRM bit of the control octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkFunction {
    // primary to secondary
    ResetLinkStates,
    TestLinkStates,
    ConfirmedUserData,
    UnconfirmedUserData,
    RequestLinkStatus,
    // secondary to primary
    Ack,
    Nack,
    LinkStatus,
    NotSupported,
    Other(u8),
}

impl LinkFunction {
    fn decode(prm: bool, code: u8) -> Self {
        match (prm, code) {
            (true, 0) => LinkFunction::ResetLinkStates,
            (true, 2) => LinkFunction::TestLinkStates,
            (true, 3) => LinkFunction::ConfirmedUserData,
            (true, 4) => LinkFunction::UnconfirmedUserData,
            (true, 9) => LinkFunction::RequestLinkStatus,
            (false, 0) => LinkFunction::Ack,
            (false, 1) => LinkFunction::Nack,
            (false, 11) => LinkFunction::LinkStatus,
            (false, 15) => LinkFunction::NotSupported,
            (_, code) => LinkFunction::Other(code),
        }
    }
}

impl fmt::Display for LinkFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkFunction::ResetLinkStates => write!(f, "RESET_LINK_STATES"),
            LinkFunction::TestLinkStates => write!(f, "TEST_LINK_STATES"),
            LinkFunction::ConfirmedUserData => write!(f, "CONFIRMED_USER_DATA"),
            LinkFunction::UnconfirmedUserData => write!(f, "UNCONFIRMED_USER_DATA"),
            LinkFunction::RequestLinkStatus => write!(f, "REQUEST_LINK_STATUS"),
            LinkFunction::Ack => write!(f, "ACK"),
            LinkFunction::Nack => write!(f, "NACK"),
            LinkFunction::LinkStatus => write!(f, "LINK_STATUS"),
            LinkFunction::NotSupported => write!(f, "NOT_SUPPORTED"),
            LinkFunction::Other(code) => write!(f, "FUNC_{:#x}", code),
        }
    }
}

/// Decoded link control octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkControl {
    pub dir: bool,
    pub prm: bool,
    pub fcb: bool,
    pub fcv: bool,
    pub function: LinkFunction,
}

impl LinkControl {
    pub fn from_octet(value: u8) -> Self {
        let prm = value & 0x40 != 0;
        Self {
            dir: value & 0x80 != 0,
            prm,
            fcb: value & 0x20 != 0,
            fcv: value & 0x10 != 0,
            function: LinkFunction::decode(prm, value & 0x0f),
        }
    }
}

/// A decoded link-layer frame.
///
/// `payload` is `None` when the header was valid but a data-block CRC
/// failed; `len` still reflects the user-octet count from the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub control: LinkControl,
    pub destination: u16,
    pub source: u16,
    pub len: usize,
    pub payload: Option<Vec<u8>>,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} -> {}) len={}{}",
            self.control.function,
            self.source,
            self.destination,
            self.len,
            if self.payload.is_none() { " [crc error]" } else { "" }
        )
    }
}

fn reject(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

/// Parse one link frame at the start of `input`.
///
/// The start octets, LEN field, and header CRC must all check out for a
/// frame to be recognized at all; a data-block CRC failure still yields
/// the frame, with `payload` stripped.
pub fn parse_frame(input: &[u8]) -> IResult<&[u8], Frame> {
    let (rest, _) = tag(&START_OCTETS[..])(input)?;
    let (rest, len) = octet(rest)?;
    if len < 5 {
        return Err(reject(input));
    }
    let (rest, control) = octet(rest)?;
    let (rest, destination) = le_u16(rest)?;
    let (rest, source) = le_u16(rest)?;
    let (rest, header_crc) = le_u16(rest)?;
    if crc16(&input[..8]) != header_crc {
        return Err(reject(input));
    }

    let user_len = len as usize - 5;
    let mut payload = Vec::with_capacity(user_len);
    let mut crc_ok = true;
    let mut rest = rest;
    let mut remaining = user_len;
    while remaining > 0 {
        let block_len = remaining.min(16);
        let (r, block) = take(block_len)(rest)?;
        let (r, block_crc) = le_u16(r)?;
        if crc16(block) != block_crc {
            crc_ok = false;
        }
        payload.extend_from_slice(block);
        rest = r;
        remaining -= block_len;
    }

    Ok((
        rest,
        Frame {
            control: LinkControl::from_octet(control),
            destination,
            source,
            len: user_len,
            payload: crc_ok.then_some(payload),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // control 0xc4: dir, prm, UNCONFIRMED_USER_DATA
    fn build(control: u8, destination: u16, source: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x05, 0x64, (payload.len() + 5) as u8, control];
        frame.extend_from_slice(&destination.to_le_bytes());
        frame.extend_from_slice(&source.to_le_bytes());
        let header_crc = crc16(&frame);
        frame.extend_from_slice(&header_crc.to_le_bytes());
        for block in payload.chunks(16) {
            frame.extend_from_slice(block);
            frame.extend_from_slice(&crc16(block).to_le_bytes());
        }
        frame
    }

    #[test]
    fn test_parse_user_data_frame() {
        let bytes = build(0xc4, 3, 1, &[0xc3, 0x01, 0x02]);
        let (rest, frame) = parse_frame(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(frame.control.function, LinkFunction::UnconfirmedUserData);
        assert!(frame.control.dir);
        assert_eq!(frame.destination, 3);
        assert_eq!(frame.source, 1);
        assert_eq!(frame.len, 3);
        assert_eq!(frame.payload.as_deref(), Some(&[0xc3, 0x01, 0x02][..]));
    }

    #[test]
    fn test_parse_empty_user_data() {
        let bytes = build(0x44, 100, 200, &[]);
        let (_, frame) = parse_frame(&bytes).unwrap();
        assert_eq!(frame.len, 0);
        assert_eq!(frame.payload.as_deref(), Some(&[][..]));
    }

    #[test]
    fn test_multi_block_payload() {
        let payload: Vec<u8> = (0..40).collect();
        let bytes = build(0xc4, 1, 2, &payload);
        // 10 header octets + 2 full blocks + 1 partial, each with a CRC
        assert_eq!(bytes.len(), 10 + 16 + 2 + 16 + 2 + 8 + 2);
        let (_, frame) = parse_frame(&bytes).unwrap();
        assert_eq!(frame.payload.as_deref(), Some(&payload[..]));
    }

    #[test]
    fn test_data_crc_error_strips_payload() {
        let mut bytes = build(0xc4, 3, 1, &[0xc3, 0x01, 0x02]);
        let last = bytes.len() - 3;
        bytes[last] ^= 0xff; // corrupt a payload octet
        let (_, frame) = parse_frame(&bytes).unwrap();
        assert_eq!(frame.len, 3);
        assert!(frame.payload.is_none());
    }

    #[test]
    fn test_header_crc_error_rejects_frame() {
        let mut bytes = build(0xc4, 3, 1, &[0xc3, 0x01, 0x02]);
        bytes[4] ^= 0x01; // destination octet
        assert!(parse_frame(&bytes).is_err());
    }

    #[test]
    fn test_len_below_header_size_rejects() {
        let mut bytes = build(0xc4, 3, 1, &[]);
        bytes[2] = 4;
        assert!(parse_frame(&bytes).is_err());
    }

    #[test]
    fn test_truncated_frame_rejects() {
        let bytes = build(0xc4, 3, 1, &[0xc3, 0x01, 0x02]);
        assert!(parse_frame(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_secondary_function_decoding() {
        let bytes = build(0x0b, 1, 2, &[]);
        let (_, frame) = parse_frame(&bytes).unwrap();
        assert_eq!(frame.control.function, LinkFunction::LinkStatus);
        assert!(!frame.control.prm);
    }
}
