//! Stream resynchronization.

use super::{parse_frame, Frame, START_OCTETS};

/// Result of scanning a buffer for the next link frame
#[derive(Debug)]
pub enum Synced {
    /// A frame was recognized. `consumed` counts from the start of the
    /// scanned slice, including the `skipped` junk prefix.
    Frame {
        frame: Frame,
        consumed: usize,
        skipped: usize,
    },
    /// No complete frame anywhere in the buffer; feed more input
    NeedMore,
}

/// Locate the next valid link frame in `buf`.
///
/// Attempts a frame parse at offset 0 and advances exactly one byte on
/// failure. One byte is the only safe stride: the start sentinel may occur
/// at any offset and false positives are ruled out by the frame CRCs, but
/// a larger skip could jump over a frame that begins inside a discarded
/// run.
pub fn next_frame(buf: &[u8]) -> Synced {
    for skipped in 0..buf.len() {
        if let Ok((rest, frame)) = parse_frame(&buf[skipped..]) {
            return Synced::Frame {
                frame,
                consumed: buf.len() - rest.len(),
                skipped,
            };
        }
    }
    Synced::NeedMore
}

/// Earliest offset that could still become a frame start once more input
/// arrives.
pub(crate) fn plausible_start(buf: &[u8]) -> Option<usize> {
    (0..buf.len()).find(|&i| {
        buf[i] == START_OCTETS[0] && buf.get(i + 1).map_or(true, |&b| b == START_OCTETS[1])
    })
}

#[cfg(test)]
mod tests {
    use super::super::crc16;
    use super::*;

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
    fn test_frame_at_offset_zero() {
        let bytes = build(0xc4, 2, 1, &[0xc1, 0xaa]);
        match next_frame(&bytes) {
            Synced::Frame {
                consumed, skipped, ..
            } => {
                assert_eq!(consumed, bytes.len());
                assert_eq!(skipped, 0);
            }
            Synced::NeedMore => panic!("expected a frame"),
        }
    }

    #[test]
    fn test_junk_prefix_is_skipped() {
        let mut bytes = vec![0xde, 0xad, 0x05, 0xbe, 0xef];
        let frame = build(0xc4, 2, 1, &[0xc1, 0xaa]);
        bytes.extend_from_slice(&frame);
        match next_frame(&bytes) {
            Synced::Frame {
                consumed, skipped, ..
            } => {
                assert_eq!(skipped, 5);
                assert_eq!(consumed, 5 + frame.len());
            }
            Synced::NeedMore => panic!("expected a frame"),
        }
    }

    #[test]
    fn test_truncated_frame_needs_more() {
        let bytes = build(0xc4, 2, 1, &[0xc1, 0xaa]);
        assert!(matches!(
            next_frame(&bytes[..bytes.len() - 1]),
            Synced::NeedMore
        ));
    }

    #[test]
    fn test_pure_junk_needs_more() {
        assert!(matches!(next_frame(&[0x01, 0x02, 0x03, 0x04]), Synced::NeedMore));
    }

    #[test]
    fn test_plausible_start() {
        assert_eq!(plausible_start(&[0x00, 0x05, 0x64, 0x00]), Some(1));
        assert_eq!(plausible_start(&[0x00, 0x05, 0x63]), None);
        // a trailing 0x05 may yet be followed by 0x64
        assert_eq!(plausible_start(&[0x00, 0x00, 0x05]), Some(2));
        assert_eq!(plausible_start(&[]), None);
    }
}
