use std::net::{IpAddr, SocketAddr};

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;

use crate::config::{SYNC_PACKET_AMOUNT, TS_PACKET_SIZE, UNSYNC_PACKET_AMOUNT};
use crate::error::CaptureError;

/// UDP datagrams rarely carry more than a handful of TS packets; this keeps
/// one `recv()` large enough for typical 1316-byte (7-packet) datagrams with
/// headroom for jumbo ones.
const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Tracks transport-stream packet sync across datagram boundaries,
/// independent of the socket it is fed from.
///
/// A sender is assumed to pack whole 188-byte TS packets back-to-back into
/// each datagram, but this does not trust that assumption blindly: losing
/// sync (a byte where 0x47 was expected) is only declared after
/// [`UNSYNC_PACKET_AMOUNT`] consecutive failures, and regaining it requires
/// [`SYNC_PACKET_AMOUNT`] consecutive clean packets, so a single corrupted
/// datagram does not thrash the receiver in and out of sync search.
struct SyncState {
    carry: BytesMut,
    synced: bool,
    consecutive_ok: usize,
    consecutive_bad: usize,
}

impl SyncState {
    fn new() -> Self {
        SyncState {
            carry: BytesMut::new(),
            synced: false,
            consecutive_ok: 0,
            consecutive_bad: 0,
        }
    }

    /// Append freshly received bytes and extract every complete, validated
    /// TS packet now available. Packets with a bad sync byte or the
    /// transport error indicator set are dropped, not returned.
    fn feed(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.carry.extend_from_slice(data);

        let mut packets = Vec::new();
        loop {
            if !self.synced {
                match memchr::memchr(0x47, &self.carry) {
                    Some(offset) => {
                        let _ = self.carry.split_to(offset);
                    }
                    None => {
                        self.carry.clear();
                        break;
                    }
                }
            }

            if self.carry.len() < TS_PACKET_SIZE {
                break;
            }

            let candidate = self.carry.split_to(TS_PACKET_SIZE).freeze();
            if candidate[0] != 0x47 {
                self.note_bad();
                continue;
            }

            let transport_error_indicator = (candidate[1] & 0x80) != 0;
            if transport_error_indicator {
                self.note_bad();
                continue;
            }

            self.note_ok();
            packets.push(candidate);
        }

        packets
    }

    fn note_ok(&mut self) {
        self.consecutive_ok += 1;
        self.consecutive_bad = 0;
        if self.consecutive_ok >= SYNC_PACKET_AMOUNT {
            self.synced = true;
        }
    }

    fn note_bad(&mut self) {
        self.consecutive_bad += 1;
        self.consecutive_ok = 0;
        if self.consecutive_bad >= UNSYNC_PACKET_AMOUNT {
            self.synced = false;
        }
    }
}

/// UDP receiver producing validated, 188-byte TS packets.
pub struct Receiver {
    socket: UdpSocket,
    recv_buf: Vec<u8>,
    sync: SyncState,
}

impl Receiver {
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self, CaptureError> {
        let addr = SocketAddr::new(ip, port);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| CaptureError::SocketBind { addr: addr.to_string(), source })?;
        tracing::info!(%addr, "bound UDP receiver socket");
        Ok(Receiver {
            socket,
            recv_buf: vec![0u8; RECV_BUFFER_SIZE],
            sync: SyncState::new(),
        })
    }

    /// Receive one UDP datagram and return the validated TS packets it
    /// contained, in order. May return an empty vector if the datagram was
    /// entirely noise or too short to complete a packet.
    pub async fn recv_packets(&mut self) -> Result<Vec<Bytes>, CaptureError> {
        let n = self
            .socket
            .recv(&mut self.recv_buf)
            .await
            .map_err(CaptureError::SocketRecv)?;
        Ok(self.sync.feed(&self.recv_buf[..n]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(sync_ok: bool, error_indicator: bool) -> Vec<u8> {
        let mut data = vec![0u8; TS_PACKET_SIZE];
        data[0] = if sync_ok { 0x47 } else { 0x00 };
        data[1] = if error_indicator { 0x80 } else { 0x00 };
        data
    }

    #[test]
    fn test_feed_single_clean_datagram_yields_packets() {
        let mut sync = SyncState::new();
        let mut datagram = Vec::new();
        for _ in 0..7 {
            datagram.extend_from_slice(&packet(true, false));
        }
        let packets = sync.feed(&datagram);
        assert_eq!(packets.len(), 7);
    }

    #[test]
    fn test_feed_drops_transport_error_indicator_packets() {
        let mut sync = SyncState::new();
        let mut datagram = Vec::new();
        datagram.extend_from_slice(&packet(true, true));
        datagram.extend_from_slice(&packet(true, false));
        let packets = sync.feed(&datagram);
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn test_feed_resyncs_across_garbage_prefix() {
        let mut sync = SyncState::new();
        let mut datagram = vec![0xAA, 0xBB, 0xCC];
        datagram.extend_from_slice(&packet(true, false));
        let packets = sync.feed(&datagram);
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn test_synced_state_set_after_threshold() {
        let mut sync = SyncState::new();
        let mut datagram = Vec::new();
        for _ in 0..SYNC_PACKET_AMOUNT {
            datagram.extend_from_slice(&packet(true, false));
        }
        sync.feed(&datagram);
        assert!(sync.synced);
    }

    #[test]
    fn test_loses_sync_after_consecutive_bad_packets() {
        let mut sync = SyncState::new();
        let mut good = Vec::new();
        for _ in 0..SYNC_PACKET_AMOUNT {
            good.extend_from_slice(&packet(true, false));
        }
        sync.feed(&good);
        assert!(sync.synced);

        // Force UNSYNC_PACKET_AMOUNT consecutive bad sync bytes at aligned offsets.
        let mut bad = Vec::new();
        for _ in 0..UNSYNC_PACKET_AMOUNT {
            bad.extend_from_slice(&packet(false, false));
        }
        sync.feed(&bad);
        assert!(!sync.synced);
    }

    #[test]
    fn test_no_sync_byte_clears_carry() {
        let mut sync = SyncState::new();
        let datagram = vec![0xAA; 512];
        let packets = sync.feed(&datagram);
        assert!(packets.is_empty());
        assert!(sync.carry.is_empty());
    }
}
