//! The server-side TCP endpoint.
//!
//! Connections live in a fixed, set-associative socket table; see
//! [`SocketTable`] for the geometry. The receive path drives the state
//! machine directly from inbound segments, the transmit path hands data
//! segments to the IPv4 layer while retaining a copy for retransmission, and
//! the aging tick replays whatever the peer has not acknowledged in time.
//!
//! Upper-layer protocols plug in through the [`Handler`] trait and talk back
//! to an established connection through [`SocketTx`], which stays usable from
//! within the handler callbacks themselves.

mod endpoint;
mod packet;
mod socket;
mod table;

#[cfg(test)]
mod tests;

pub use self::endpoint::Endpoint;
pub use self::packet::{SocketTx, TxSegment};
pub use self::socket::Socket;
pub use self::table::{SocketId, SocketTable};

use crate::layer::arp::NeighborLookup;
use crate::nic::Device;
use crate::wire::SeqNumber;

/// The capability set an upper-layer protocol exposes to the TCP endpoint.
///
/// All callbacks run synchronously on the stack of the event that triggered
/// them. A handler may send or close through the given [`SocketTx`] right
/// away. After [`on_connection_closed`] the socket identifier is dead and
/// must not be used again.
///
/// [`on_connection_closed`]: Handler::on_connection_closed
pub trait Handler<D: Device, N: NeighborLookup> {
    /// Query whether a listening service exists on this port.
    fn is_port_open(&mut self, port: u16) -> bool;

    /// Choose the initial sequence number for a new connection.
    ///
    /// Implementations should draw on the best randomness the platform has;
    /// predictable sequence numbers invite connection hijacking.
    fn generate_isn(&mut self) -> SeqNumber;

    /// A handshake completed on an open port.
    fn on_connection_accepted(&mut self, socket: &mut SocketTx<'_, D, N>) {
        let _ = socket;
    }

    /// In-order payload bytes arrived on an established connection.
    fn on_rx_data(&mut self, socket: &mut SocketTx<'_, D, N>, data: &[u8]) {
        let _ = (socket, data);
    }

    /// The connection is gone: the peer finished or reset it, or it was
    /// superseded by a new handshake.
    fn on_connection_closed(&mut self, id: SocketId) {
        let _ = id;
    }
}
