//! The IPv4 receive and transmit paths.
//!
//! Receive validates the header in wire order, classifies the destination
//! and dispatches by protocol; transmit resolves the destination station,
//! prefills a header on a fresh driver frame and finalizes length and
//! checksum when the upper layer hands the packet back.

mod endpoint;
mod packet;


pub use self::endpoint::{AddressType, Config, Endpoint, Sender};
pub use self::packet::TxPacket;
