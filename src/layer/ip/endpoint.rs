use super::packet::TxPacket;
use crate::layer::arp::NeighborLookup;
use crate::layer::{icmp, tcp, Error, Result};
use crate::nic::Device;
use crate::wire::{checksum, ipv4, ipv4_packet, EtherType, EthernetAddress, IpProtocol, Ipv4Address};

/// The address configuration of the single interface.
///
/// Built once at bring-up; the receive and transmit paths only ever read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Our unicast address.
    pub address: Ipv4Address,

    /// The directed broadcast address of our subnet.
    pub broadcast: Ipv4Address,

    /// The default gateway, for resolvers that route off-subnet traffic.
    pub gateway: Ipv4Address,
}

/// How an IPv4 destination address relates to this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    /// Our own unicast address.
    UnicastUs,
    /// The directed or limited broadcast address.
    Broadcast,
    /// A multicast group address.
    Multicast,
    /// Someone else's unicast address.
    UnicastOther,
}

impl Config {
    /// Classify a destination address against this configuration.
    pub fn address_type(&self, addr: Ipv4Address) -> AddressType {
        if addr == self.address {
            AddressType::UnicastUs
        } else if addr == self.broadcast || addr.is_limited_broadcast() {
            AddressType::Broadcast
        } else if addr.is_multicast() {
            AddressType::Multicast
        } else {
            AddressType::UnicastOther
        }
    }
}

/// The IPv4 endpoint.
pub struct Endpoint {
    config: Config,
}

/// The IPv4 transmit path, borrowed for the duration of one event.
pub struct Sender<'a, D, N> {
    config: &'a Config,
    device: &'a mut D,
    neighbors: &'a N,
}

impl Endpoint {
    pub fn new(config: Config) -> Self {
        Endpoint { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Classify a destination address.
    pub fn address_type(&self, addr: Ipv4Address) -> AddressType {
        self.config.address_type(addr)
    }

    /// Borrow the transmit path.
    pub fn sender<'a, D: Device, N: NeighborLookup>(
        &'a self,
        device: &'a mut D,
        neighbors: &'a N,
    ) -> Sender<'a, D, N> {
        Sender {
            config: &self.config,
            device,
            neighbors,
        }
    }

    /// Process one inbound Ethernet payload declared to carry IPv4.
    ///
    /// The slice is exactly the received Ethernet payload; the driver
    /// guarantees the underlying buffer is at least one MTU long. Anything
    /// that fails validation is dropped without a reply.
    pub fn receive<D, N, H>(
        &self,
        device: &mut D,
        neighbors: &N,
        icmp: &icmp::Endpoint,
        tcp: &mut tcp::Endpoint,
        handler: &mut H,
        payload: &[u8],
    ) where
        D: Device,
        N: NeighborLookup,
        H: tcp::Handler<D, N>,
    {
        if payload.len() < ipv4::HEADER_LEN {
            return;
        }
        let packet = ipv4_packet::new_unchecked(payload);

        // The checksum runs over the declared header length in wire order,
        // before any field is trusted.
        if !packet.verify_checksum() {
            net_trace!("ipv4: dropping packet with bad header checksum");
            return;
        }

        // A fixed 20-byte header; options are not accepted.
        if packet.version() != 4 || usize::from(packet.header_len()) != ipv4::HEADER_LEN {
            return;
        }

        let total_len = usize::from(packet.total_len());
        if total_len < ipv4::HEADER_LEN || total_len > payload.len() {
            return;
        }

        // No reserved flag, no fragments. DF is ignored, as are DSCP/ECN
        // and TTL.
        if packet.reserved_flag() || packet.more_frags() || packet.frag_offset() != 0 {
            return;
        }

        let addr_type = self.address_type(packet.dst_addr());
        if addr_type == AddressType::UnicastOther {
            return;
        }

        let src_addr = packet.src_addr();
        let upper = &payload[ipv4::HEADER_LEN..total_len];

        match packet.protocol() {
            // Pings to unicast or broadcast get answered; multicast ICMP is
            // not interesting to an endpoint host.
            IpProtocol::Icmp if addr_type != AddressType::Multicast => {
                icmp.receive(&mut self.sender(device, neighbors), src_addr, upper);
            }

            // A connection-oriented flow only makes sense on our unicast
            // address.
            IpProtocol::Tcp if addr_type == AddressType::UnicastUs => {
                let prelude = checksum::pseudo_header(
                    src_addr,
                    packet.dst_addr(),
                    IpProtocol::Tcp,
                    upper.len() as u16,
                );
                tcp.receive(self, device, neighbors, handler, src_addr, prelude, upper);
            }

            IpProtocol::Udp if addr_type == AddressType::UnicastUs => {
                // TODO: dispatch to a UDP endpoint once one exists
                net_trace!("ipv4: udp datagram from {} ignored", src_addr);
            }

            _ => {}
        }
    }
}

impl<'a, D: Device, N: NeighborLookup> Sender<'a, D, N> {
    /// Our own address, the source of everything this path sends.
    pub fn src_addr(&self) -> Ipv4Address {
        self.config.address
    }

    /// Query whether the driver can currently hand out a transmit frame.
    pub fn is_tx_buffer_available(&self) -> bool {
        self.device.is_tx_buffer_available()
    }

    /// Allocate an outbound packet with a prefilled header.
    ///
    /// Fails with [`Error::Unreachable`] when the destination station cannot
    /// be resolved and with [`Error::Exhausted`] when the driver is out of
    /// transmit buffers; the caller retries on a later event. Sending to our
    /// own address is [`Error::Illegal`].
    pub fn get_tx_packet(&mut self, dst_addr: Ipv4Address, protocol: IpProtocol) -> Result<TxPacket> {
        let dst_station = match self.config.address_type(dst_addr) {
            // TODO: map well-known multicast groups to their reserved
            // station addresses instead of falling through to broadcast
            AddressType::Multicast | AddressType::Broadcast => EthernetAddress::BROADCAST,

            AddressType::UnicastOther => self
                .neighbors
                .lookup(dst_addr)
                // TODO: kick the resolver with a query here so that the
                // caller's retry can succeed
                .ok_or(Error::Unreachable)?,

            AddressType::UnicastUs => return Err(Error::Illegal),
        };

        let frame = self
            .device
            .get_tx_frame(EtherType::Ipv4, dst_station)
            .ok_or(Error::Exhausted)?;
        Ok(TxPacket::prepare(frame, self.config.address, dst_addr, protocol))
    }

    /// Finalize a packet allocated by [`get_tx_packet`] and hand it to the
    /// driver.
    ///
    /// [`get_tx_packet`]: Self::get_tx_packet
    pub fn send_tx_packet(&mut self, mut packet: TxPacket, upper_len: usize) {
        let total_len = ipv4::HEADER_LEN + upper_len;
        {
            let header = packet.packet_mut();
            header.set_total_len(total_len as u16);
            header.fill_checksum();
        }
        let mut frame = packet.into_frame();
        frame.set_payload_len(total_len);
        self.device.send_tx_frame(frame);
    }
}
