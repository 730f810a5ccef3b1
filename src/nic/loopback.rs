//! A software device that queues transmitted frames for inspection.
//!
//! Mainly useful in tests: the stack's output can be dequeued and fed back
//! through the receive path, or picked apart with the wire views.

use super::{Device, TxFrame};
use crate::wire::{EtherType, EthernetAddress};

/// A loopback device with a fixed transmit queue of `N` frames.
pub struct Loopback<const N: usize> {
    addr: EthernetAddress,
    queue: [TxFrame; N],
    head: usize,
    len: usize,
}

impl<const N: usize> Loopback<N> {
    /// Create a device with the given station address and an empty queue.
    pub fn new(addr: EthernetAddress) -> Self {
        Loopback {
            addr,
            queue: core::array::from_fn(|_| TxFrame::zeroed()),
            head: 0,
            len: 0,
        }
    }

    /// Take the oldest queued frame.
    pub fn dequeue(&mut self) -> Option<TxFrame> {
        if self.len == 0 {
            return None;
        }
        let frame = core::mem::replace(&mut self.queue[self.head], TxFrame::zeroed());
        self.head = (self.head + 1) % N;
        self.len -= 1;
        Some(frame)
    }

    /// Number of frames waiting in the queue.
    pub fn queued(&self) -> usize {
        self.len
    }
}

impl<const N: usize> Device for Loopback<N> {
    fn link_addr(&self) -> EthernetAddress {
        self.addr
    }

    fn is_tx_buffer_available(&self) -> bool {
        self.len < N
    }

    fn get_tx_frame(
        &mut self,
        ethertype: EtherType,
        dst_addr: EthernetAddress,
    ) -> Option<TxFrame> {
        if !self.is_tx_buffer_available() {
            return None;
        }
        Some(TxFrame::new(ethertype, dst_addr, self.addr))
    }

    fn send_tx_frame(&mut self, frame: TxFrame) {
        if self.len == N {
            // Queue overrun; the frame is lost, as it would be on real hardware.
            return;
        }
        let tail = (self.head + self.len) % N;
        self.queue[tail] = frame;
        self.len += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn queue_in_order() {
        let mut nic: Loopback<2> = Loopback::new(EthernetAddress([2, 0, 0, 0, 0, 1]));
        assert!(nic.is_tx_buffer_available());

        for ident in [0x11u8, 0x22] {
            let mut frame = nic
                .get_tx_frame(EtherType::Ipv4, EthernetAddress::BROADCAST)
                .unwrap();
            frame.payload_mut()[0] = ident;
            frame.set_payload_len(1);
            nic.send_tx_frame(frame);
        }

        assert!(!nic.is_tx_buffer_available());
        assert_eq!(nic.dequeue().unwrap().payload(), &[0x11]);
        assert_eq!(nic.dequeue().unwrap().payload(), &[0x22]);
        assert!(nic.dequeue().is_none());
    }
}
