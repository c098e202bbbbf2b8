//! Pcap replay front-end.
//!
//! Reads a capture file, peels Ethernet/IP/TCP-UDP, and feeds each
//! direction of every DNP3 conversation on the configured port into its
//! own dissector instance.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use pcap_file::pcap::PcapReader;
use tracing::{debug, info};

use crate::config::Config;
use crate::dissect::{Dissector, DissectorStats, Hooks};
use crate::error::{DissectError, Result};

/// One direction of a DNP3 conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub src: SocketAddr,
    pub dst: SocketAddr,
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// Replay a pcap file, demultiplexing DNP3 payload streams into per-
/// direction dissectors built by `make_hooks`.
///
/// Returns the streams in order of first appearance, each with its final
/// stats and hook sink.
pub fn replay_file<P, H, F>(
    path: P,
    config: &Config,
    mut make_hooks: F,
) -> Result<Vec<(StreamKey, DissectorStats, H)>>
where
    P: AsRef<Path>,
    H: Hooks,
    F: FnMut(&StreamKey) -> H,
{
    let file = File::open(path.as_ref())?;
    let mut reader =
        PcapReader::new(BufReader::new(file)).map_err(|e| DissectError::Capture(e.to_string()))?;

    let mut streams: HashMap<StreamKey, Dissector<H>> = HashMap::new();
    let mut order: Vec<StreamKey> = Vec::new();
    let mut packets = 0u64;

    while let Some(packet) = reader.next_packet() {
        let packet = packet.map_err(|e| DissectError::Capture(e.to_string()))?;
        packets += 1;

        let Some((key, payload)) =
            dnp3_payload(&packet.data, config.capture.port, config.capture.udp)
        else {
            continue;
        };
        if payload.is_empty() {
            continue;
        }

        let dissector = streams.entry(key).or_insert_with(|| {
            info!("new DNP3 stream {}", key);
            order.push(key);
            Dissector::new(&config.dissector, make_hooks(&key))
        });
        dissector.feed(&payload);
    }

    debug!("replayed {} packets, {} DNP3 streams", packets, order.len());

    Ok(order
        .into_iter()
        .map(|key| {
            let dissector = streams.remove(&key).expect("stream was registered");
            let stats = dissector.stats().clone();
            (key, stats, dissector.finish())
        })
        .collect())
}

/// Extract the DNP3-bearing payload of one captured packet, if any.
fn dnp3_payload(data: &[u8], port: u16, udp: bool) -> Option<(StreamKey, Vec<u8>)> {
    let sliced = SlicedPacket::from_ethernet(data).ok()?;

    let (src_ip, dst_ip): (IpAddr, IpAddr) = match &sliced.net {
        Some(NetSlice::Ipv4(v4)) => (
            v4.header().source_addr().into(),
            v4.header().destination_addr().into(),
        ),
        Some(NetSlice::Ipv6(v6)) => (
            v6.header().source_addr().into(),
            v6.header().destination_addr().into(),
        ),
        _ => return None,
    };

    let (src_port, dst_port, payload) = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            (tcp.source_port(), tcp.destination_port(), tcp.payload())
        }
        Some(TransportSlice::Udp(u)) if udp => {
            (u.source_port(), u.destination_port(), u.payload())
        }
        _ => return None,
    };

    if src_port != port && dst_port != port {
        return None;
    }

    Some((
        StreamKey {
            src: SocketAddr::new(src_ip, src_port),
            dst: SocketAddr::new(dst_ip, dst_port),
        },
        payload.to_vec(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal hand-built Ethernet + IPv4 + UDP packet carrying `payload`
    // from 10.0.0.1:20000 to 10.0.0.2:1234.
    fn udp_packet(payload: &[u8]) -> Vec<u8> {
        let mut pkt = Vec::new();
        pkt.extend_from_slice(&[0; 6]); // dst mac
        pkt.extend_from_slice(&[0; 6]); // src mac
        pkt.extend_from_slice(&[0x08, 0x00]); // IPv4

        let total_len = 20 + 8 + payload.len();
        let mut ip = vec![0x45, 0x00];
        ip.extend_from_slice(&(total_len as u16).to_be_bytes());
        ip.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 64, 17]); // id/flags/ttl/udp
        ip.extend_from_slice(&[0x00, 0x00]); // checksum placeholder
        ip.extend_from_slice(&[10, 0, 0, 1]);
        ip.extend_from_slice(&[10, 0, 0, 2]);
        let checksum = ipv4_checksum(&ip);
        ip[10..12].copy_from_slice(&checksum.to_be_bytes());
        pkt.extend_from_slice(&ip);

        pkt.extend_from_slice(&20000u16.to_be_bytes());
        pkt.extend_from_slice(&1234u16.to_be_bytes());
        pkt.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        pkt.extend_from_slice(&[0x00, 0x00]); // udp checksum optional
        pkt.extend_from_slice(payload);
        pkt
    }

    fn ipv4_checksum(header: &[u8]) -> u16 {
        let mut sum = 0u32;
        for chunk in header.chunks(2) {
            sum += u32::from(u16::from_be_bytes([chunk[0], chunk[1]]));
        }
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        !(sum as u16)
    }

    #[test]
    fn test_udp_payload_extraction() {
        let pkt = udp_packet(b"\x05\x64");
        let (key, payload) = dnp3_payload(&pkt, 20000, true).unwrap();
        assert_eq!(key.src.port(), 20000);
        assert_eq!(key.dst.port(), 1234);
        assert_eq!(payload, b"\x05\x64");
    }

    #[test]
    fn test_other_ports_are_ignored() {
        let pkt = udp_packet(b"\x05\x64");
        assert!(dnp3_payload(&pkt, 19999, true).is_none());
    }

    #[test]
    fn test_udp_disabled_filters_datagrams() {
        let pkt = udp_packet(b"\x05\x64");
        assert!(dnp3_payload(&pkt, 20000, false).is_none());
    }
}
