//! The contract between the stack and the link-layer driver.
//!
//! The driver owns all frame storage. Inbound frames reach the stack as
//! short-lived byte-slice borrows through [`Stack::on_rx_frame`]; outbound
//! frames are [`TxFrame`] values handed out by [`Device::get_tx_frame`],
//! filled in place by the protocol layers and returned through
//! [`Device::send_tx_frame`]. Ownership of the buffer moves with the value,
//! which makes the frame/packet coupling explicit: an IPv4 packet always
//! starts at the fixed 14-byte payload offset of its frame.
//!
//! [`Stack::on_rx_frame`]: crate::Stack::on_rx_frame

pub mod loopback;

use crate::config::IPV4_PAYLOAD_MTU;
use crate::wire::{ethernet, ethernet_frame, ipv4, EtherType, EthernetAddress};

/// Capacity of a transmit frame: link header, IP header and a full payload.
pub const FRAME_BUFFER_LEN: usize = ethernet::HEADER_LEN + ipv4::HEADER_LEN + IPV4_PAYLOAD_MTU;

/// An owned, fixed-capacity Ethernet frame in flight to the driver.
///
/// Dropping a frame without sending it cancels the transmission.
pub struct TxFrame {
    len: usize,
    buf: [u8; FRAME_BUFFER_LEN],
}

impl TxFrame {
    /// Create a frame with the Ethernet header filled in and an empty payload.
    pub fn new(ethertype: EtherType, dst_addr: EthernetAddress, src_addr: EthernetAddress) -> Self {
        let mut frame = Self::zeroed();
        frame.len = ethernet::HEADER_LEN;
        let header = ethernet_frame::new_unchecked_mut(&mut frame.buf);
        header.set_dst_addr(dst_addr);
        header.set_src_addr(src_addr);
        header.set_ethertype(ethertype);
        frame
    }

    /// Create an all-zero frame, e.g. as backing storage for a driver pool.
    pub fn zeroed() -> Self {
        TxFrame {
            len: ethernet::HEADER_LEN,
            buf: [0; FRAME_BUFFER_LEN],
        }
    }

    /// View the Ethernet header and payload.
    pub fn header(&self) -> &ethernet_frame {
        ethernet_frame::new_unchecked(&self.buf)
    }

    /// Return the full payload capacity as a mutable byte slice.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        ethernet_frame::new_unchecked_mut(&mut self.buf).payload_mut()
    }

    /// Return the filled part of the payload.
    pub fn payload(&self) -> &[u8] {
        &self.header().payload()[..self.len - ethernet::HEADER_LEN]
    }

    /// Declare how many payload bytes were filled in.
    ///
    /// # Panics
    /// `len` must not exceed the payload capacity.
    pub fn set_payload_len(&mut self, len: usize) {
        assert!(len <= FRAME_BUFFER_LEN - ethernet::HEADER_LEN);
        self.len = ethernet::HEADER_LEN + len;
    }

    /// Return the frame as it goes on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// A link-layer driver.
///
/// Implementations must hand out receive buffers of at least one full MTU,
/// regardless of the received length; the IPv4 path relies on being able to
/// read up to a declared header length even when that length field is
/// corrupt.
pub trait Device {
    /// The station address frames are sent from.
    fn link_addr(&self) -> EthernetAddress;

    /// Query whether a transmit buffer can currently be allocated.
    fn is_tx_buffer_available(&self) -> bool;

    /// Allocate a transmit frame with the link header prefilled.
    ///
    /// Returns `None` when the transmit pool is exhausted; the caller backs
    /// off and retries on a later event.
    fn get_tx_frame(&mut self, ethertype: EtherType, dst_addr: EthernetAddress)
        -> Option<TxFrame>;

    /// Queue a finished frame for transmission.
    fn send_tx_frame(&mut self, frame: TxFrame);
}
