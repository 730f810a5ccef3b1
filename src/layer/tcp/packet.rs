use super::socket::Socket;
use super::table::SocketId;
use crate::config::TCP_RX_WINDOW;
use crate::layer::arp::NeighborLookup;
use crate::layer::ip;
use crate::nic::Device;
use crate::wire::{tcp, tcp_segment, IpProtocol, Ipv4Address, SeqNumber, TcpFlags};

/// An outbound data segment under construction.
///
/// Allocated by [`SocketTx::get_tx_segment`] with ports, sequence numbers
/// and the ACK flag prefilled. The caller writes payload bytes through
/// [`payload_mut`] and either sends or cancels; dropping an unsent segment
/// releases its frame.
///
/// [`payload_mut`]: Self::payload_mut
pub struct TxSegment {
    pub(super) packet: ip::TxPacket,
    pub(super) header_len: usize,
}

impl TxSegment {
    /// Return the payload capacity as a mutable byte slice.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let header_len = self.header_len;
        &mut self.packet.payload_mut()[header_len..]
    }
}

/// A borrowed view of one established connection, open for sending.
///
/// Bundles the socket entry with the IPv4 transmit path, so upper-layer
/// callbacks can answer inline: sends issued from a delivery callback carry
/// the acknowledgement for the data just delivered.
pub struct SocketTx<'a, D, N> {
    pub(super) id: SocketId,
    pub(super) socket: &'a mut Socket,
    pub(super) ip: ip::Sender<'a, D, N>,
}

impl<'a, D: Device, N: NeighborLookup> SocketTx<'a, D, N> {
    /// The stable identifier of this connection.
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// Read-only connection state.
    pub fn socket(&self) -> &Socket {
        &*self.socket
    }

    /// Query whether the driver can currently hand out a transmit frame.
    pub fn is_tx_buffer_available(&self) -> bool {
        self.ip.is_tx_buffer_available()
    }

    /// Allocate a data segment towards the peer.
    ///
    /// Ports, `seq`, `ack`, window and the ACK flag are prefilled. Returns
    /// `None` when the connection is gone, the peer's station cannot be
    /// resolved, or the driver is out of transmit buffers.
    pub fn get_tx_segment(&mut self) -> Option<TxSegment> {
        if !self.socket.valid {
            return None;
        }

        let mut packet = self
            .ip
            .get_tx_packet(self.socket.remote_ip, IpProtocol::Tcp)
            .ok()?;
        {
            let segment = tcp_segment::new_unchecked_mut(packet.payload_mut());
            segment.set_src_port(self.socket.local_port);
            segment.set_dst_port(self.socket.remote_port);
            segment.set_seq_number(self.socket.local_seq);
            segment.set_ack_number(self.socket.remote_seq);
            segment.set_header_len(tcp::HEADER_LEN as u8);
            segment.set_flags(TcpFlags::ACK);
            segment.set_window_len(TCP_RX_WINDOW);
            segment.set_checksum(0);
            segment.set_urgent_at(0);
        }
        Some(TxSegment {
            packet,
            header_len: tcp::HEADER_LEN,
        })
    }

    /// Send a data segment carrying `payload_len` bytes.
    ///
    /// Tags the segment PSH, advances our sequence number, retains a copy
    /// for retransmission and acknowledges everything received so far. Fails
    /// by giving the segment back when all retransmission slots are taken;
    /// the caller backs off until an aging tick or an acknowledgement frees
    /// one.
    pub fn send_tx_segment(
        &mut self,
        mut segment: TxSegment,
        payload_len: usize,
    ) -> Result<(), TxSegment> {
        if !self.socket.valid || !self.socket.has_free_unacked_slot() {
            return Err(segment);
        }

        let segment_len = segment.header_len + payload_len;
        self.socket.local_seq += payload_len;

        let src_addr = self.ip.src_addr();
        {
            let bytes = &mut segment.packet.payload_mut()[..segment_len];
            let view = tcp_segment::new_unchecked_mut(bytes);
            view.add_flags(TcpFlags::PSH);
            view.fill_checksum(src_addr, self.socket.remote_ip);
            self.socket.record_sent(view.as_bytes(), self.socket.local_seq);
        }

        self.socket.remote_seq_sent = self.socket.remote_seq;
        self.ip.send_tx_packet(segment.packet, segment_len);
        Ok(())
    }

    /// Release a segment that will not be sent, without touching sequence
    /// numbers.
    pub fn cancel_tx_segment(&mut self, segment: TxSegment) {
        // Dropping the frame returns the buffer; nothing was recorded yet.
        drop(segment);
    }

    /// Close the connection from our side.
    ///
    /// Emits FIN+ACK and clears the entry immediately, releasing retained
    /// segments. No callback fires for a close the server itself requested.
    pub fn close(&mut self) {
        if !self.socket.valid {
            return;
        }
        emit_control(
            &mut self.ip,
            self.socket,
            TcpFlags::FIN | TcpFlags::ACK,
            None,
        );
        self.socket.clear();
    }
}

/// Emit a payload-free segment for a connection: a SYN+ACK, a bare ACK or a
/// FIN+ACK. Returns whether a frame actually went out.
pub(super) fn emit_control<D, N>(
    ip: &mut ip::Sender<'_, D, N>,
    socket: &Socket,
    flags: TcpFlags,
    mss: Option<u16>,
) -> bool
where
    D: Device,
    N: NeighborLookup,
{
    let seq = if flags.syn() {
        socket.local_initial_seq
    } else {
        socket.local_seq
    };
    emit_raw(
        ip,
        socket.remote_ip,
        socket.local_port,
        socket.remote_port,
        seq,
        socket.remote_seq,
        flags,
        mss,
    )
}

/// Emit a payload-free segment without a socket, e.g. a RST+ACK refusal.
pub(super) fn emit_raw<D, N>(
    ip: &mut ip::Sender<'_, D, N>,
    remote_ip: Ipv4Address,
    local_port: u16,
    remote_port: u16,
    seq: SeqNumber,
    ack: SeqNumber,
    flags: TcpFlags,
    mss: Option<u16>,
) -> bool
where
    D: Device,
    N: NeighborLookup,
{
    let mut packet = match ip.get_tx_packet(remote_ip, IpProtocol::Tcp) {
        Ok(packet) => packet,
        Err(_) => return false,
    };

    let header_len = tcp::HEADER_LEN + if mss.is_some() { 4 } else { 0 };
    let src_addr = ip.src_addr();
    {
        let segment = tcp_segment::new_unchecked_mut(&mut packet.payload_mut()[..header_len]);
        segment.set_src_port(local_port);
        segment.set_dst_port(remote_port);
        segment.set_seq_number(seq);
        segment.set_ack_number(ack);
        segment.set_header_len(header_len as u8);
        segment.set_flags(flags);
        segment.set_window_len(TCP_RX_WINDOW);
        segment.set_checksum(0);
        segment.set_urgent_at(0);
        if let Some(mss) = mss {
            segment.set_mss_option(mss);
        }
        segment.fill_checksum(src_addr, remote_ip);
    }

    ip.send_tx_packet(packet, header_len);
    true
}
