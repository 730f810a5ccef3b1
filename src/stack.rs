use crate::layer::arp::NeighborLookup;
use crate::layer::tcp::SocketId;
use crate::layer::{icmp, ip, tcp};
use crate::nic::Device;
use crate::wire::{ethernet_frame, EtherType};

/// The assembled stack, driven by one cooperative event loop.
///
/// Two event sources exist: the driver delivers inbound frames through
/// [`on_rx_frame`], and a periodic timer fires [`on_aging_tick_10x`]. Both
/// run to completion; upper-layer callbacks execute synchronously on the
/// receive path's stack.
///
/// The device, the neighbor cache and the upper-layer handler are borrowed
/// per event rather than owned, so the caller keeps them between events and
/// remains free to reconfigure the endpoints while no event is in flight.
///
/// [`on_rx_frame`]: Self::on_rx_frame
/// [`on_aging_tick_10x`]: Self::on_aging_tick_10x
pub struct Stack {
    ipv4: ip::Endpoint,
    icmp: icmp::Endpoint,
    tcp: tcp::Endpoint,
}

impl Stack {
    pub fn new(config: ip::Config) -> Self {
        Stack {
            ipv4: ip::Endpoint::new(config),
            icmp: icmp::Endpoint::new(),
            tcp: tcp::Endpoint::new(),
        }
    }

    pub fn ipv4(&self) -> &ip::Endpoint {
        &self.ipv4
    }

    pub fn icmp_mut(&mut self) -> &mut icmp::Endpoint {
        &mut self.icmp
    }

    pub fn tcp(&self) -> &tcp::Endpoint {
        &self.tcp
    }

    /// The driver's entry point for one received frame.
    ///
    /// `frame` is the complete Ethernet frame as received; the underlying
    /// buffer must be at least one MTU long. Frames not addressed to this
    /// station and protocols nobody handles are dropped silently.
    pub fn on_rx_frame<D, N, H>(
        &mut self,
        device: &mut D,
        neighbors: &N,
        handler: &mut H,
        frame: &[u8],
    ) where
        D: Device,
        N: NeighborLookup,
        H: tcp::Handler<D, N>,
    {
        let frame = match ethernet_frame::new_checked(frame) {
            Ok(frame) => frame,
            Err(_) => return,
        };

        let dst_addr = frame.dst_addr();
        if dst_addr != device.link_addr() && !dst_addr.is_multicast() {
            return;
        }

        match frame.ethertype() {
            EtherType::Ipv4 => self.ipv4.receive(
                device,
                neighbors,
                &self.icmp,
                &mut self.tcp,
                handler,
                frame.payload(),
            ),
            // Address resolution is handled by an external resolver that
            // sees the same frames.
            EtherType::Arp => {}
            _ => {}
        }
    }

    /// The timer's entry point, nominally at 10 Hz.
    pub fn on_aging_tick_10x<D, N>(&mut self, device: &mut D, neighbors: &N)
    where
        D: Device,
        N: NeighborLookup,
    {
        self.tcp.on_aging_tick_10x(&self.ipv4, device, neighbors);
    }

    /// Borrow an established connection for sending outside of a callback.
    pub fn socket_tx<'a, D: Device, N: NeighborLookup>(
        &'a mut self,
        device: &'a mut D,
        neighbors: &'a N,
        id: SocketId,
    ) -> Option<tcp::SocketTx<'a, D, N>> {
        self.tcp.socket_tx(&self.ipv4, device, neighbors, id)
    }

    /// Close a connection from the server side.
    pub fn close_socket<D, N>(&mut self, device: &mut D, neighbors: &N, id: SocketId)
    where
        D: Device,
        N: NeighborLookup,
    {
        self.tcp.close_socket(&self.ipv4, device, neighbors, id);
    }
}
