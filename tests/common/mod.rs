//! Wire-level test helpers: hand-built frames with valid CRCs.
#![allow(dead_code)] // not every test binary uses every helper

use dnp3dissect::link::crc16;

/// Build a link frame around arbitrary user octets.
pub fn link_frame(control: u8, destination: u16, source: u16, user_data: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x05, 0x64, (user_data.len() + 5) as u8, control];
    frame.extend_from_slice(&destination.to_le_bytes());
    frame.extend_from_slice(&source.to_le_bytes());
    let header_crc = crc16(&frame);
    frame.extend_from_slice(&header_crc.to_le_bytes());
    for block in user_data.chunks(16) {
        frame.extend_from_slice(block);
        frame.extend_from_slice(&crc16(block).to_le_bytes());
    }
    frame
}

/// Build an UNCONFIRMED_USER_DATA frame carrying one transport segment.
pub fn segment_frame(
    source: u16,
    destination: u16,
    fir: bool,
    fin: bool,
    seq: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut transport = vec![transport_header(fir, fin, seq)];
    transport.extend_from_slice(payload);
    link_frame(0xc4, destination, source, &transport)
}

pub fn transport_header(fir: bool, fin: bool, seq: u8) -> u8 {
    (if fin { 0x80 } else { 0 }) | (if fir { 0x40 } else { 0 }) | (seq & 0x3f)
}

/// A reassembled-fragment body that parses as a READ request for class 0.
pub const READ_CLASS0: [u8; 5] = [0xc0, 0x01, 0x3c, 0x01, 0x06];
