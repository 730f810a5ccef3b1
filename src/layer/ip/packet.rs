use crate::nic::TxFrame;
use crate::wire::{ipv4, ipv4_packet, IpProtocol, Ipv4Address};

/// An outbound IPv4 packet under construction.
///
/// Wraps the transmit frame it lives in, keeping the packet pinned at the
/// frame's fixed payload offset. The header is prefilled on allocation; the
/// total length and checksum are finalized by [`Sender::send_tx_packet`].
///
/// [`Sender::send_tx_packet`]: super::Sender::send_tx_packet
pub struct TxPacket {
    frame: TxFrame,
}

impl TxPacket {
    pub(super) fn prepare(
        mut frame: TxFrame,
        src_addr: Ipv4Address,
        dst_addr: Ipv4Address,
        protocol: IpProtocol,
    ) -> Self {
        let packet = ipv4_packet::new_unchecked_mut(frame.payload_mut());
        packet.set_version(4);
        packet.set_header_len(ipv4::HEADER_LEN as u8);
        packet.set_dscp_ecn(0);
        packet.set_total_len(0);
        packet.set_ident(0);
        packet.clear_flags();
        packet.set_dont_frag(true);
        packet.set_ttl(0xff);
        packet.set_protocol(protocol);
        packet.set_checksum(0);
        packet.set_src_addr(src_addr);
        packet.set_dst_addr(dst_addr);
        TxPacket { frame }
    }

    /// View the IPv4 header.
    pub(crate) fn packet_mut(&mut self) -> &mut ipv4_packet {
        ipv4_packet::new_unchecked_mut(self.frame.payload_mut())
    }

    /// Return the upper-layer payload capacity as a mutable byte slice.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.frame.payload_mut()[ipv4::HEADER_LEN..]
    }

    pub(super) fn into_frame(self) -> TxFrame {
        self.frame
    }
}
