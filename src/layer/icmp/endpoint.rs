use crate::layer::arp::NeighborLookup;
use crate::layer::ip;
use crate::nic::Device;
use crate::wire::{icmpv4, icmpv4_packet, IpProtocol, Ipv4Address};

/// The ICMPv4 endpoint.
#[derive(Default)]
pub struct Endpoint {
    /// Drop echo requests instead of answering them.
    ///
    /// Off by default; some deployments prefer not to answer pings.
    deny_echo: bool,
}

impl Endpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_deny_echo(&mut self, deny: bool) {
        self.deny_echo = deny;
    }

    /// Process one inbound ICMPv4 message.
    pub(crate) fn receive<D, N>(
        &self,
        ip: &mut ip::Sender<'_, D, N>,
        src_addr: Ipv4Address,
        payload: &[u8],
    ) where
        D: Device,
        N: NeighborLookup,
    {
        let packet = match icmpv4_packet::new_checked(payload) {
            Ok(packet) => packet,
            Err(_) => return,
        };
        if !packet.verify_checksum() {
            net_trace!("icmpv4: dropping message with bad checksum");
            return;
        }

        match packet.msg_type() {
            icmpv4::Message::EchoRequest if !self.deny_echo => {
                self.answer_echo(ip, src_addr, packet)
            }
            _ => {}
        }
    }

    /// Answer an echo request, mirroring identifier, sequence and data.
    fn answer_echo<D, N>(&self, ip: &mut ip::Sender<'_, D, N>, src_addr: Ipv4Address, request: &icmpv4_packet)
    where
        D: Device,
        N: NeighborLookup,
    {
        let mut packet = match ip.get_tx_packet(src_addr, IpProtocol::Icmp) {
            Ok(packet) => packet,
            Err(_) => return,
        };

        let len = request.as_bytes().len();
        let buffer = match packet.payload_mut().get_mut(..len) {
            Some(buffer) => buffer,
            None => return,
        };
        buffer.copy_from_slice(request.as_bytes());

        let reply = icmpv4_packet::new_unchecked_mut(buffer);
        reply.set_msg_type(icmpv4::Message::EchoReply);
        reply.set_msg_code(0);
        reply.fill_checksum();

        ip.send_tx_packet(packet, len);
    }
}
