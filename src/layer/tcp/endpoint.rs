use super::packet::{emit_control, emit_raw, SocketTx};
use super::socket::Socket;
use super::table::{SocketId, SocketTable};
use super::Handler;
use crate::config::{TCP_MSS, TCP_RETRANSMIT_TIMEOUT};
use crate::layer::arp::NeighborLookup;
use crate::layer::ip;
use crate::nic::Device;
use crate::wire::{checksum, tcp_segment, Ipv4Address, SeqNumber, TcpFlags};

/// The TCP endpoint: the socket table and the state machine driving it.
pub struct Endpoint {
    table: SocketTable,
}

impl Endpoint {
    pub fn new() -> Self {
        Endpoint {
            table: SocketTable::new(),
        }
    }

    /// Find the connection for a 4-tuple.
    pub fn lookup(
        &self,
        remote_ip: Ipv4Address,
        local_port: u16,
        remote_port: u16,
    ) -> Option<SocketId> {
        self.table.lookup(remote_ip, local_port, remote_port)
    }

    /// Read a connection's state, if it is still established.
    pub fn get(&self, id: SocketId) -> Option<&Socket> {
        let socket = self.table.get(id);
        socket.valid.then_some(socket)
    }

    /// Borrow an established connection for sending outside of a callback.
    pub fn socket_tx<'a, D: Device, N: NeighborLookup>(
        &'a mut self,
        ip: &'a ip::Endpoint,
        device: &'a mut D,
        neighbors: &'a N,
        id: SocketId,
    ) -> Option<SocketTx<'a, D, N>> {
        let socket = self.table.get_mut(id);
        if !socket.valid {
            return None;
        }
        Some(SocketTx {
            id,
            socket,
            ip: ip.sender(device, neighbors),
        })
    }

    /// Close a connection from the server side.
    ///
    /// Emits FIN+ACK and releases the entry at once; retained segments are
    /// dropped with it.
    pub fn close_socket<D: Device, N: NeighborLookup>(
        &mut self,
        ip: &ip::Endpoint,
        device: &mut D,
        neighbors: &N,
        id: SocketId,
    ) {
        if let Some(mut tx) = self.socket_tx(ip, device, neighbors, id) {
            tx.close();
        }
    }

    /// Process one inbound segment already validated for IPv4 delivery.
    ///
    /// `prelude` is the pseudo-header sum precomputed by the IPv4 layer.
    pub(crate) fn receive<D, N, H>(
        &mut self,
        ip: &ip::Endpoint,
        device: &mut D,
        neighbors: &N,
        handler: &mut H,
        src_addr: Ipv4Address,
        prelude: u16,
        segment: &[u8],
    ) where
        D: Device,
        N: NeighborLookup,
        H: Handler<D, N>,
    {
        let seg = match tcp_segment::new_checked(segment) {
            Ok(seg) => seg,
            Err(_) => return,
        };

        // The segment checksum folds over the pseudo-header prelude and the
        // entire segment, checksum field included.
        if checksum::data_seeded(segment, prelude) != !0 {
            net_trace!("tcp: dropping segment with bad checksum");
            return;
        }

        let flags = seg.flags();
        if flags.rst() {
            self.on_rst::<D, N, H>(handler, src_addr, seg);
        } else if flags.syn() && !flags.ack() {
            self.on_syn(ip, device, neighbors, handler, src_addr, seg);
        } else if flags.ack() {
            self.on_ack(ip, device, neighbors, handler, src_addr, seg);
        }
        // Anything else carries no state transition for a server endpoint.
    }

    /// The peer tore the connection down. No reply, even if nothing matches.
    fn on_rst<D, N, H>(&mut self, handler: &mut H, src_addr: Ipv4Address, seg: &tcp_segment)
    where
        D: Device,
        N: NeighborLookup,
        H: Handler<D, N>,
    {
        let Some(id) = self.table.lookup(src_addr, seg.dst_port(), seg.src_port()) else {
            return;
        };
        net_debug!("tcp: reset by {}:{}", src_addr, seg.src_port());
        self.table.get_mut(id).clear();
        handler.on_connection_closed(id);
    }

    /// A connection attempt.
    fn on_syn<D, N, H>(
        &mut self,
        ip: &ip::Endpoint,
        device: &mut D,
        neighbors: &N,
        handler: &mut H,
        src_addr: Ipv4Address,
        seg: &tcp_segment,
    ) where
        D: Device,
        N: NeighborLookup,
        H: Handler<D, N>,
    {
        let local_port = seg.dst_port();
        let remote_port = seg.src_port();

        if !handler.is_port_open(local_port) {
            self.refuse(ip, device, neighbors, src_addr, seg);
            return;
        }

        if let Some(id) = self.table.lookup(src_addr, local_port, remote_port) {
            let socket = self.table.get_mut(id);
            if socket.remote_initial_seq == seg.seq_number() {
                // Our SYN+ACK was lost; repeat it from the recorded state.
                emit_control(
                    &mut ip.sender(device, neighbors),
                    socket,
                    TcpFlags::SYN | TcpFlags::ACK,
                    Some(TCP_MSS as u16),
                );
                return;
            }
            // A fresh ISN means the peer restarted; the old conversation is
            // over. The entry is reused by the handshake below.
            socket.clear();
            handler.on_connection_closed(id);
        }

        let Some(id) = self.table.allocate(src_addr, local_port, remote_port) else {
            net_debug!("tcp: socket table full, refusing {}:{}", src_addr, remote_port);
            self.refuse(ip, device, neighbors, src_addr, seg);
            return;
        };

        let isn = handler.generate_isn();
        let socket = self.table.get_mut(id);
        socket.remote_initial_seq = seg.seq_number();
        socket.remote_seq = seg.seq_number() + 1;
        socket.remote_seq_sent = socket.remote_seq;
        socket.local_initial_seq = isn;
        socket.local_seq = isn;

        emit_control(
            &mut ip.sender(device, neighbors),
            socket,
            TcpFlags::SYN | TcpFlags::ACK,
            Some(TCP_MSS as u16),
        );

        // Our SYN occupies one unit of sequence space whether or not the
        // reply made it out; a repeat comes from the recorded ISN above.
        socket.local_seq = isn + 1;

        net_debug!("tcp: accepted {}:{} on port {}", src_addr, remote_port, local_port);
        let mut tx = SocketTx {
            id,
            socket,
            ip: ip.sender(device, neighbors),
        };
        handler.on_connection_accepted(&mut tx);
    }

    /// An established-connection segment: acknowledgement bookkeeping,
    /// payload delivery, teardown on FIN.
    fn on_ack<D, N, H>(
        &mut self,
        ip: &ip::Endpoint,
        device: &mut D,
        neighbors: &N,
        handler: &mut H,
        src_addr: Ipv4Address,
        seg: &tcp_segment,
    ) where
        D: Device,
        N: NeighborLookup,
        H: Handler<D, N>,
    {
        let Some(id) = self.table.lookup(src_addr, seg.dst_port(), seg.src_port()) else {
            return;
        };

        {
            let socket = self.table.get_mut(id);

            // Strictly in-order delivery: anything that is not the next
            // expected segment is dropped without acknowledgement, and the
            // peer retransmits from where we stand.
            if seg.seq_number() != socket.remote_seq {
                net_trace!("tcp: out-of-order segment from {}", src_addr);
                return;
            }

            socket.idle_ticks = 0;
            socket.release_acked(seg.ack_number());
        }

        let payload = seg.payload_slice();
        if !payload.is_empty() {
            let socket = self.table.get_mut(id);
            socket.remote_seq += payload.len();
            let mut tx = SocketTx {
                id,
                socket,
                ip: ip.sender(device, neighbors),
            };
            handler.on_rx_data(&mut tx, payload);
        }

        let socket = self.table.get_mut(id);
        if !socket.valid {
            // The upper layer closed the connection during delivery.
            return;
        }

        if seg.flags().fin() {
            socket.remote_seq += 1;
            handler.on_connection_closed(id);
            emit_control(
                &mut ip.sender(device, neighbors),
                socket,
                TcpFlags::FIN | TcpFlags::ACK,
                None,
            );
            net_debug!("tcp: connection from {} closed by peer", src_addr);
            socket.clear();
        } else if socket.remote_seq_sent != socket.remote_seq {
            // Nothing sent during delivery carried the acknowledgement, so
            // it goes out on its own.
            let sent = emit_control(
                &mut ip.sender(device, neighbors),
                socket,
                TcpFlags::ACK,
                None,
            );
            if sent {
                socket.remote_seq_sent = socket.remote_seq;
            }
        }
    }

    /// Refuse a connection attempt with RST+ACK so the peer fails fast.
    fn refuse<D, N>(
        &mut self,
        ip: &ip::Endpoint,
        device: &mut D,
        neighbors: &N,
        src_addr: Ipv4Address,
        seg: &tcp_segment,
    ) where
        D: Device,
        N: NeighborLookup,
    {
        emit_raw(
            &mut ip.sender(device, neighbors),
            src_addr,
            seg.dst_port(),
            seg.src_port(),
            SeqNumber(0),
            seg.seq_number() + seg.sequence_len(),
            TcpFlags::RST | TcpFlags::ACK,
            None,
        );
    }

    /// The 10 Hz aging tick: drive retransmission and idle accounting.
    ///
    /// Every retained segment ages by one tick; a segment that reaches
    /// `TCP_RETRANSMIT_TIMEOUT` is put on the wire again unchanged, with a
    /// freshly computed checksum, and starts aging anew. When no transmit
    /// frame can be had the segment simply stays due and is retried on the
    /// next tick.
    pub fn on_aging_tick_10x<D, N>(&mut self, ip: &ip::Endpoint, device: &mut D, neighbors: &N)
    where
        D: Device,
        N: NeighborLookup,
    {
        let src_addr = ip.config().address;
        for socket in self.table.sockets_mut() {
            if !socket.valid {
                continue;
            }
            socket.idle_ticks = socket.idle_ticks.saturating_add(1);
            // TODO: close sessions whose idle_ticks exceed a bound, once the
            // upper layers can veto it

            let remote_ip = socket.remote_ip;
            for slot in socket.unacked.iter_mut() {
                let Some(sent) = slot else {
                    continue;
                };
                sent.aging_ticks += 1;
                if sent.aging_ticks < TCP_RETRANSMIT_TIMEOUT {
                    continue;
                }

                let mut sender = ip.sender(device, neighbors);
                let Ok(mut packet) = sender.get_tx_packet(remote_ip, crate::wire::IpProtocol::Tcp)
                else {
                    continue;
                };

                let bytes = sent.bytes();
                let len = bytes.len();
                packet.payload_mut()[..len].copy_from_slice(bytes);
                let view = tcp_segment::new_unchecked_mut(&mut packet.payload_mut()[..len]);
                view.fill_checksum(src_addr, remote_ip);

                net_trace!("tcp: retransmitting {} bytes to {}", len, remote_ip);
                sender.send_tx_packet(packet, len);
                sent.aging_ticks = 0;
            }
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new()
    }
}
