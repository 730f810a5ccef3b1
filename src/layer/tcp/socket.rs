use crate::config::{IPV4_PAYLOAD_MTU, TCP_MAX_UNACKED};
use crate::wire::{Ipv4Address, SeqNumber};

/// Retransmission storage for one segment, header and payload included.
pub(crate) const SEGMENT_BUF_LEN: usize = IPV4_PAYLOAD_MTU;

/// A copy of a sent segment retained until the peer acknowledges it.
pub(crate) struct SentSegment {
    len: usize,

    /// Our sequence number directly after this segment. The slot is released
    /// once an acknowledgement covers it.
    pub(crate) end_seq: SeqNumber,

    /// Aging ticks accumulated while waiting for that acknowledgement.
    pub(crate) aging_ticks: u32,

    buf: [u8; SEGMENT_BUF_LEN],
}

impl SentSegment {
    fn new(bytes: &[u8], end_seq: SeqNumber) -> Self {
        let mut buf = [0; SEGMENT_BUF_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        SentSegment {
            len: bytes.len(),
            end_seq,
            aging_ticks: 0,
            buf,
        }
    }

    /// The retained segment bytes, TCP header first.
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// One entry of the socket table: the whole state of one connection.
///
/// Entries are never relocated. A [`SocketId`] therefore stays meaningful
/// for the entire life of the connection, and upper layers reference
/// connections by identifier rather than by holding borrows across events.
///
/// [`SocketId`]: super::SocketId
pub struct Socket {
    pub(crate) valid: bool,

    pub(crate) remote_ip: Ipv4Address,
    pub(crate) local_port: u16,
    pub(crate) remote_port: u16,

    /// Expected sequence number of the next inbound segment; equally, the
    /// acknowledgement number we will send next.
    pub(crate) remote_seq: SeqNumber,

    /// The acknowledgement number most recently *put on the wire*. Lagging
    /// behind `remote_seq` means an ACK is owed; a data segment sent from a
    /// delivery callback settles the debt without a separate bare ACK.
    pub(crate) remote_seq_sent: SeqNumber,

    /// Most recent sequence number we sent.
    pub(crate) local_seq: SeqNumber,

    /// Initial sequence number chosen by us.
    pub(crate) local_initial_seq: SeqNumber,

    /// Initial sequence number the peer sent in its SYN.
    pub(crate) remote_initial_seq: SeqNumber,

    /// Ticks since the last inbound segment. Reserved for idle-session
    /// eviction, which is currently not performed.
    pub(crate) idle_ticks: u32,

    /// Sent-but-unacknowledged segments, oldest slots released first by
    /// whatever acknowledgement covers them.
    pub(crate) unacked: [Option<SentSegment>; TCP_MAX_UNACKED],
}

impl Socket {
    pub(crate) fn empty() -> Self {
        const NO_SEGMENT: Option<SentSegment> = None;
        Socket {
            valid: false,
            remote_ip: Ipv4Address::new(0, 0, 0, 0),
            local_port: 0,
            remote_port: 0,
            remote_seq: SeqNumber(0),
            remote_seq_sent: SeqNumber(0),
            local_seq: SeqNumber(0),
            local_initial_seq: SeqNumber(0),
            remote_initial_seq: SeqNumber(0),
            idle_ticks: 0,
            unacked: [NO_SEGMENT; TCP_MAX_UNACKED],
        }
    }

    /// The peer's address.
    pub fn remote_ip(&self) -> Ipv4Address {
        self.remote_ip
    }

    /// The port we are serving this connection on.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// The peer's port.
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Most recent sequence number we sent.
    pub fn local_seq(&self) -> SeqNumber {
        self.local_seq
    }

    /// Next sequence number expected from the peer.
    pub fn remote_seq(&self) -> SeqNumber {
        self.remote_seq
    }

    /// Number of segments sent but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.unacked.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn matches(&self, remote_ip: Ipv4Address, local_port: u16, remote_port: u16) -> bool {
        self.valid
            && self.remote_ip == remote_ip
            && self.local_port == local_port
            && self.remote_port == remote_port
    }

    /// Drop all connection state, releasing retained segments.
    pub(crate) fn clear(&mut self) {
        *self = Socket::empty();
    }

    /// Retain a copy of a sent segment. Fails when all slots are occupied.
    pub(crate) fn record_sent(&mut self, bytes: &[u8], end_seq: SeqNumber) -> bool {
        match self.unacked.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(SentSegment::new(bytes, end_seq));
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_free_unacked_slot(&self) -> bool {
        self.unacked.iter().any(|slot| slot.is_none())
    }

    /// Release every retained segment the acknowledgement covers.
    pub(crate) fn release_acked(&mut self, ack: SeqNumber) {
        for slot in self.unacked.iter_mut() {
            if slot.as_ref().map_or(false, |sent| sent.end_seq <= ack) {
                *slot = None;
            }
        }
    }
}
