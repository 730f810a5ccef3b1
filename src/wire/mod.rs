//! Wire formats of the implemented protocols.
//!
//! Each protocol module exposes an unsized byte wrapper (`ethernet`, `ipv4`,
//! `tcp`, `icmpv4`) that overlays a driver-owned buffer and reads or writes
//! header fields through explicit network-endian accessors. Multi-byte fields
//! stay in network order in the buffer; conversion happens at the accessor,
//! never by rewriting the packet in place.

pub mod checksum;
mod error;
pub mod ethernet;
pub mod icmpv4;
pub mod ipv4;
pub mod tcp;

pub use self::error::{Error, Result};
pub use self::ethernet::{ethernet_frame, Address as EthernetAddress, EtherType};
pub use self::icmpv4::icmpv4_packet;
pub use self::ipv4::{ipv4_packet, Address as Ipv4Address};
pub use self::tcp::{tcp_segment, Flags as TcpFlags, SeqNumber};

pub(crate) mod field {
    pub type Field = core::ops::Range<usize>;
    pub type Rest = core::ops::RangeFrom<usize>;
}

enum_with_unknown! {
    /// The protocol field of an IPv4 header.
    pub enum IpProtocol(u8) {
        Icmp = 1,
        Tcp = 6,
        Udp = 17,
    }
}

impl core::fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            IpProtocol::Icmp => write!(f, "ICMP"),
            IpProtocol::Tcp => write!(f, "TCP"),
            IpProtocol::Udp => write!(f, "UDP"),
            IpProtocol::Unknown(id) => write!(f, "0x{:02x}", id),
        }
    }
}
