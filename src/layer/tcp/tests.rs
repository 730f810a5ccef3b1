use super::{Handler, SocketId, SocketTx};
use crate::config::{TCP_MAX_UNACKED, TCP_MSS, TCP_RETRANSMIT_TIMEOUT, TCP_TABLE_WAYS};
use crate::layer::arp::NeighborLookup;
use crate::layer::ip;
use crate::nic::{loopback::Loopback, Device, TxFrame};
use crate::wire::{
    ethernet, ethernet_frame, ipv4, ipv4_packet, tcp_segment, EtherType, EthernetAddress,
    IpProtocol, Ipv4Address, SeqNumber, TcpFlags,
};
use crate::Stack;

const HOST_MAC: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 0x01]);
const PEER_MAC: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 0x02]);
const HOST_IP: Ipv4Address = Ipv4Address::new(10, 1, 1, 1);
const PEER_IP: Ipv4Address = Ipv4Address::new(10, 1, 1, 2);

const OPEN_PORT: u16 = 22;
const CLOSED_PORT: u16 = 23;
const CLIENT_PORT: u16 = 40000;
const CLIENT_ISN: u32 = 0x1000_0000;
const SERVER_ISN: u32 = 0x5555_aaaa;

struct Neighbors;

impl NeighborLookup for Neighbors {
    fn lookup(&self, addr: Ipv4Address) -> Option<EthernetAddress> {
        (addr == PEER_IP).then_some(PEER_MAC)
    }
}

#[derive(Default)]
struct TestHandler {
    isn: u32,
    accepted: usize,
    closed: Vec<SocketId>,
    received: Vec<u8>,
    /// Send received payloads straight back from the delivery callback.
    echo: bool,
    /// Payload to push from the accept callback.
    send_on_accept: Option<Vec<u8>>,
}

fn send_data<D: Device, N: NeighborLookup>(socket: &mut SocketTx<'_, D, N>, data: &[u8]) {
    let mut segment = socket.get_tx_segment().expect("segment allocated");
    segment.payload_mut()[..data.len()].copy_from_slice(data);
    assert!(socket.send_tx_segment(segment, data.len()).is_ok());
}

impl<D: Device, N: NeighborLookup> Handler<D, N> for TestHandler {
    fn is_port_open(&mut self, port: u16) -> bool {
        port == OPEN_PORT
    }

    fn generate_isn(&mut self) -> SeqNumber {
        SeqNumber::new(self.isn)
    }

    fn on_connection_accepted(&mut self, socket: &mut SocketTx<'_, D, N>) {
        self.accepted += 1;
        if let Some(data) = self.send_on_accept.take() {
            send_data(socket, &data);
        }
    }

    fn on_rx_data(&mut self, socket: &mut SocketTx<'_, D, N>, data: &[u8]) {
        self.received.extend_from_slice(data);
        if self.echo {
            send_data(socket, data);
        }
    }

    fn on_connection_closed(&mut self, id: SocketId) {
        self.closed.push(id);
    }
}

struct Fixture {
    stack: Stack,
    nic: Loopback<8>,
    handler: TestHandler,
}

/// A parsed outbound segment, both checksums verified along the way.
struct Parsed {
    flags: TcpFlags,
    seq: u32,
    ack: u32,
    payload: Vec<u8>,
    mss: Option<u16>,
}

fn parse(frame: &TxFrame) -> Parsed {
    assert_eq!(frame.header().dst_addr(), PEER_MAC);
    let packet = ipv4_packet::new_checked(frame.payload()).unwrap();
    assert!(packet.verify_checksum());
    assert_eq!(packet.src_addr(), HOST_IP);
    assert_eq!(packet.dst_addr(), PEER_IP);
    assert_eq!(packet.protocol(), IpProtocol::Tcp);

    let segment = tcp_segment::new_checked(packet.payload_slice()).unwrap();
    assert!(segment.verify_checksum(packet.src_addr(), packet.dst_addr()));
    assert_eq!(segment.src_port(), OPEN_PORT);
    assert_eq!(segment.dst_port(), CLIENT_PORT);
    Parsed {
        flags: segment.flags(),
        seq: segment.seq_number().to_u32(),
        ack: segment.ack_number().to_u32(),
        payload: segment.payload_slice().to_vec(),
        mss: segment.mss_option(),
    }
}

fn client_frame(
    src_port: u16,
    dst_port: u16,
    flags: TcpFlags,
    seq: u32,
    ack: u32,
    payload: &[u8],
) -> Vec<u8> {
    let tcp_len = 20 + payload.len();
    let total_len = ipv4::HEADER_LEN + tcp_len;
    let mut bytes = vec![0u8; ethernet::HEADER_LEN + total_len];

    let frame = ethernet_frame::new_unchecked_mut(&mut bytes);
    frame.set_dst_addr(HOST_MAC);
    frame.set_src_addr(PEER_MAC);
    frame.set_ethertype(EtherType::Ipv4);

    let packet = ipv4_packet::new_unchecked_mut(frame.payload_mut());
    packet.set_version(4);
    packet.set_header_len(ipv4::HEADER_LEN as u8);
    packet.set_total_len(total_len as u16);
    packet.clear_flags();
    packet.set_ttl(64);
    packet.set_protocol(IpProtocol::Tcp);
    packet.set_src_addr(PEER_IP);
    packet.set_dst_addr(HOST_IP);
    packet.fill_checksum();

    let segment = tcp_segment::new_unchecked_mut(packet.payload_mut_slice());
    segment.set_src_port(src_port);
    segment.set_dst_port(dst_port);
    segment.set_seq_number(SeqNumber::new(seq));
    segment.set_ack_number(SeqNumber::new(ack));
    segment.set_header_len(20);
    segment.set_flags(flags);
    segment.set_window_len(4096);
    segment.set_urgent_at(0);
    segment.payload_mut_slice().copy_from_slice(payload);
    segment.fill_checksum(PEER_IP, HOST_IP);

    bytes
}

fn fixture() -> Fixture {
    Fixture {
        stack: Stack::new(ip::Config {
            address: HOST_IP,
            broadcast: Ipv4Address::new(10, 1, 1, 255),
            gateway: Ipv4Address::new(10, 1, 1, 254),
        }),
        nic: Loopback::new(HOST_MAC),
        handler: TestHandler {
            isn: SERVER_ISN,
            ..TestHandler::default()
        },
    }
}

impl Fixture {
    fn feed(&mut self, flags: TcpFlags, seq: u32, ack: u32, payload: &[u8]) {
        let frame = client_frame(CLIENT_PORT, OPEN_PORT, flags, seq, ack, payload);
        self.stack
            .on_rx_frame(&mut self.nic, &Neighbors, &mut self.handler, &frame);
    }

    fn tick(&mut self) {
        self.stack.on_aging_tick_10x(&mut self.nic, &Neighbors);
    }

    fn out(&mut self) -> Option<TxFrame> {
        self.nic.dequeue()
    }

    /// Run the three-way handshake and return the connection.
    fn establish(&mut self) -> SocketId {
        self.feed(TcpFlags::SYN, CLIENT_ISN, 0, &[]);
        let synack = parse(&self.out().expect("SYN+ACK emitted"));
        assert!(synack.flags.syn() && synack.flags.ack());
        self.feed(
            TcpFlags::ACK,
            CLIENT_ISN.wrapping_add(1),
            synack.seq.wrapping_add(1),
            &[],
        );
        assert!(self.out().is_none(), "handshake ACK needs no reply");
        self.stack
            .tcp()
            .lookup(PEER_IP, OPEN_PORT, CLIENT_PORT)
            .expect("socket established")
    }
}

#[test]
fn handshake_creates_one_socket() {
    let mut fix = fixture();
    fix.feed(TcpFlags::SYN, CLIENT_ISN, 0, &[]);

    let synack = parse(&fix.out().expect("SYN+ACK emitted"));
    assert!(synack.flags.syn() && synack.flags.ack());
    assert!(!synack.flags.rst() && !synack.flags.fin());
    assert_eq!(synack.seq, SERVER_ISN);
    assert_eq!(synack.ack, CLIENT_ISN + 1);
    assert_eq!(synack.mss, Some(TCP_MSS as u16));
    assert!(synack.payload.is_empty());
    assert_eq!(fix.handler.accepted, 1);

    let id = fix
        .stack
        .tcp()
        .lookup(PEER_IP, OPEN_PORT, CLIENT_PORT)
        .expect("exactly this tuple is established");
    let socket = fix.stack.tcp().get(id).unwrap();
    assert_eq!(socket.local_seq(), SeqNumber::new(SERVER_ISN + 1));
    assert_eq!(socket.remote_seq(), SeqNumber::new(CLIENT_ISN + 1));
    assert_eq!(
        fix.stack.tcp().lookup(PEER_IP, OPEN_PORT, CLIENT_PORT + 1),
        None
    );
}

#[test]
fn syn_to_closed_port_is_refused() {
    let mut fix = fixture();
    let frame = client_frame(CLIENT_PORT, CLOSED_PORT, TcpFlags::SYN, CLIENT_ISN, 0, &[]);
    fix.stack
        .on_rx_frame(&mut fix.nic, &Neighbors, &mut fix.handler, &frame);

    let reply = fix.out().expect("RST+ACK emitted");
    let packet = ipv4_packet::new_checked(reply.payload()).unwrap();
    let segment = tcp_segment::new_checked(packet.payload_slice()).unwrap();
    assert!(segment.flags().rst() && segment.flags().ack());
    assert_eq!(segment.seq_number(), SeqNumber::new(0));
    assert_eq!(segment.ack_number(), SeqNumber::new(CLIENT_ISN + 1));
    assert_eq!(
        fix.stack.tcp().lookup(PEER_IP, CLOSED_PORT, CLIENT_PORT),
        None
    );
    assert_eq!(fix.handler.accepted, 0);
}

#[test]
fn full_line_refuses_further_connections() {
    let mut fix = fixture();

    // These ports hash to the same table line (their rotated forms agree in
    // the low bits), so they compete for the same ways.
    let ports = [40000u16, 40256, 40512, 40768, 41024];
    assert_eq!(ports.len(), TCP_TABLE_WAYS + 1);

    for &port in &ports[..TCP_TABLE_WAYS] {
        let frame = client_frame(port, OPEN_PORT, TcpFlags::SYN, CLIENT_ISN, 0, &[]);
        fix.stack
            .on_rx_frame(&mut fix.nic, &Neighbors, &mut fix.handler, &frame);
        let reply = fix.out().expect("SYN+ACK emitted");
        let packet = ipv4_packet::new_checked(reply.payload()).unwrap();
        let segment = tcp_segment::new_checked(packet.payload_slice()).unwrap();
        assert!(segment.flags().syn() && segment.flags().ack());
    }

    let frame = client_frame(ports[TCP_TABLE_WAYS], OPEN_PORT, TcpFlags::SYN, CLIENT_ISN, 0, &[]);
    fix.stack
        .on_rx_frame(&mut fix.nic, &Neighbors, &mut fix.handler, &frame);
    let reply = fix.out().expect("refusal emitted");
    let packet = ipv4_packet::new_checked(reply.payload()).unwrap();
    let segment = tcp_segment::new_checked(packet.payload_slice()).unwrap();
    assert!(segment.flags().rst() && segment.flags().ack());
}

#[test]
fn duplicate_syn_repeats_the_syn_ack() {
    let mut fix = fixture();
    fix.feed(TcpFlags::SYN, CLIENT_ISN, 0, &[]);
    let first = parse(&fix.out().unwrap());

    fix.feed(TcpFlags::SYN, CLIENT_ISN, 0, &[]);
    let second = parse(&fix.out().unwrap());

    assert!(second.flags.syn() && second.flags.ack());
    assert_eq!(second.seq, first.seq);
    assert_eq!(second.ack, first.ack);
    assert_eq!(fix.handler.accepted, 1, "no second accept callback");
}

#[test]
fn restarted_peer_supersedes_the_old_connection() {
    let mut fix = fixture();
    let old = fix.establish();

    fix.feed(TcpFlags::SYN, CLIENT_ISN + 0x100, 0, &[]);
    let synack = parse(&fix.out().unwrap());
    assert!(synack.flags.syn() && synack.flags.ack());
    assert_eq!(synack.ack, CLIENT_ISN + 0x101);
    assert_eq!(fix.handler.closed, vec![old]);
    assert_eq!(fix.handler.accepted, 2);
}

#[test]
fn out_of_order_segment_changes_nothing() {
    let mut fix = fixture();
    let id = fix.establish();

    fix.feed(
        TcpFlags::ACK | TcpFlags::PSH,
        CLIENT_ISN + 11,
        SERVER_ISN + 1,
        b"out of order",
    );

    assert!(fix.out().is_none(), "no acknowledgement for a gap");
    assert!(fix.handler.received.is_empty());
    let socket = fix.stack.tcp().get(id).unwrap();
    assert_eq!(socket.remote_seq(), SeqNumber::new(CLIENT_ISN + 1));
}

#[test]
fn in_order_data_is_delivered_and_acknowledged() {
    let mut fix = fixture();
    fix.establish();

    let payload = b"hello, world";
    fix.feed(
        TcpFlags::ACK | TcpFlags::PSH,
        CLIENT_ISN + 1,
        SERVER_ISN + 1,
        payload,
    );

    assert_eq!(fix.handler.received, payload);
    let ack = parse(&fix.out().expect("bare ACK emitted"));
    assert!(fix.out().is_none());
    assert!(ack.flags.ack() && !ack.flags.psh() && !ack.flags.syn());
    assert!(ack.payload.is_empty());
    assert_eq!(ack.seq, SERVER_ISN + 1);
    assert_eq!(ack.ack, CLIENT_ISN + 1 + payload.len() as u32);
}

#[test]
fn reply_sent_from_the_callback_carries_the_ack() {
    let mut fix = fixture();
    fix.handler.echo = true;
    fix.establish();

    let payload = b"echo me";
    fix.feed(
        TcpFlags::ACK | TcpFlags::PSH,
        CLIENT_ISN + 1,
        SERVER_ISN + 1,
        payload,
    );

    let reply = parse(&fix.out().expect("echoed data emitted"));
    assert!(fix.out().is_none(), "no separate bare ACK");
    assert!(reply.flags.ack() && reply.flags.psh());
    assert_eq!(reply.seq, SERVER_ISN + 1);
    assert_eq!(reply.ack, CLIENT_ISN + 1 + payload.len() as u32);
    assert_eq!(reply.payload, payload);
}

#[test]
fn peer_fin_tears_the_connection_down() {
    let mut fix = fixture();
    let id = fix.establish();

    fix.feed(
        TcpFlags::FIN | TcpFlags::ACK,
        CLIENT_ISN + 1,
        SERVER_ISN + 1,
        &[],
    );

    let finack = parse(&fix.out().expect("FIN+ACK emitted"));
    assert!(finack.flags.fin() && finack.flags.ack());
    assert_eq!(finack.ack, CLIENT_ISN + 2);
    assert_eq!(fix.handler.closed, vec![id]);
    assert!(fix.stack.tcp().get(id).is_none());
    assert_eq!(fix.stack.tcp().lookup(PEER_IP, OPEN_PORT, CLIENT_PORT), None);

    // The tuple is dead; a straggler gets silence.
    fix.feed(
        TcpFlags::ACK | TcpFlags::PSH,
        CLIENT_ISN + 2,
        SERVER_ISN + 2,
        b"straggler",
    );
    assert!(fix.out().is_none());
    assert_eq!(fix.handler.closed.len(), 1);
}

#[test]
fn rst_clears_the_socket_silently() {
    let mut fix = fixture();
    let id = fix.establish();

    fix.feed(TcpFlags::RST, CLIENT_ISN + 1, 0, &[]);
    assert!(fix.out().is_none(), "a reset draws no reply");
    assert_eq!(fix.handler.closed, vec![id]);
    assert!(fix.stack.tcp().get(id).is_none());

    fix.feed(
        TcpFlags::ACK | TcpFlags::PSH,
        CLIENT_ISN + 1,
        SERVER_ISN + 1,
        b"ghost",
    );
    assert!(fix.out().is_none());
}

#[test]
fn unacknowledged_data_is_retransmitted() {
    let mut fix = fixture();
    fix.handler.echo = true;
    let id = fix.establish();

    let payload: Vec<u8> = (0..100).collect();
    fix.feed(
        TcpFlags::ACK | TcpFlags::PSH,
        CLIENT_ISN + 1,
        SERVER_ISN + 1,
        &payload,
    );
    let original = fix.out().expect("echoed data emitted");
    assert_eq!(fix.stack.tcp().get(id).unwrap().in_flight(), 1);

    for _ in 1..TCP_RETRANSMIT_TIMEOUT {
        fix.tick();
        assert!(fix.out().is_none(), "not due yet");
    }
    fix.tick();
    let retransmit = fix.out().expect("segment retransmitted");
    assert_eq!(retransmit.as_bytes(), original.as_bytes());

    // Acknowledged data stops aging out.
    fix.feed(
        TcpFlags::ACK,
        CLIENT_ISN + 1 + payload.len() as u32,
        SERVER_ISN + 1 + payload.len() as u32,
        &[],
    );
    assert!(fix.out().is_none());
    assert_eq!(fix.stack.tcp().get(id).unwrap().in_flight(), 0);

    for _ in 0..2 * TCP_RETRANSMIT_TIMEOUT {
        fix.tick();
    }
    assert!(fix.out().is_none(), "nothing left to retransmit");
}

#[test]
fn send_window_is_bounded() {
    let mut fix = fixture();
    let id = fix.establish();

    {
        let mut tx = fix
            .stack
            .socket_tx(&mut fix.nic, &Neighbors, id)
            .expect("connection is open");
        for _ in 0..TCP_MAX_UNACKED {
            send_data(&mut tx, b"x");
        }
        let segment = tx.get_tx_segment().unwrap();
        match tx.send_tx_segment(segment, 1) {
            Ok(()) => panic!("ring should be full"),
            Err(segment) => tx.cancel_tx_segment(segment),
        }
    }

    assert_eq!(fix.stack.tcp().get(id).unwrap().in_flight(), TCP_MAX_UNACKED);
    assert_eq!(fix.nic.queued(), TCP_MAX_UNACKED);

    // One acknowledgement covering everything drains the ring.
    while fix.out().is_some() {}
    fix.feed(
        TcpFlags::ACK,
        CLIENT_ISN + 1,
        SERVER_ISN + 1 + TCP_MAX_UNACKED as u32,
        &[],
    );
    assert_eq!(fix.stack.tcp().get(id).unwrap().in_flight(), 0);
}

#[test]
fn cancelled_segment_leaves_no_trace() {
    let mut fix = fixture();
    let id = fix.establish();
    let before = fix.stack.tcp().get(id).unwrap().local_seq();

    {
        let mut tx = fix
            .stack
            .socket_tx(&mut fix.nic, &Neighbors, id)
            .expect("connection is open");
        let segment = tx.get_tx_segment().unwrap();
        tx.cancel_tx_segment(segment);
    }

    assert_eq!(fix.stack.tcp().get(id).unwrap().local_seq(), before);
    assert_eq!(fix.stack.tcp().get(id).unwrap().in_flight(), 0);
    assert!(fix.nic.queued() == 0);
}

#[test]
fn server_close_emits_fin_and_clears() {
    let mut fix = fixture();
    let id = fix.establish();

    fix.stack.close_socket(&mut fix.nic, &Neighbors, id);

    let fin = parse(&fix.out().expect("FIN+ACK emitted"));
    assert!(fin.flags.fin() && fin.flags.ack());
    assert_eq!(fin.seq, SERVER_ISN + 1);
    assert!(fix.stack.tcp().get(id).is_none());
    // A close we asked for is not reported back to us.
    assert!(fix.handler.closed.is_empty());
}

#[test]
fn sequence_numbers_survive_the_wrap() {
    let mut fix = fixture();
    fix.handler.isn = 0xffff_fff0;
    fix.handler.send_on_accept = Some(vec![0x42; 32]);

    fix.feed(TcpFlags::SYN, CLIENT_ISN, 0, &[]);
    let synack = parse(&fix.out().expect("SYN+ACK emitted"));
    assert_eq!(synack.seq, 0xffff_fff0);
    let data = parse(&fix.out().expect("accept payload emitted"));
    assert_eq!(data.seq, 0xffff_fff1);
    assert_eq!(data.payload.len(), 32);

    let id = fix.stack.tcp().lookup(PEER_IP, OPEN_PORT, CLIENT_PORT).unwrap();
    let socket = fix.stack.tcp().get(id).unwrap();
    assert_eq!(socket.local_seq(), SeqNumber::new(0x0000_0011));
    assert_eq!(socket.in_flight(), 1);

    // An acknowledgement past the wrap point clears the ring.
    fix.feed(TcpFlags::ACK, CLIENT_ISN + 1, 0x0000_0011, &[]);
    assert_eq!(fix.stack.tcp().get(id).unwrap().in_flight(), 0);
}
