//! The processing logic of the protocol layers.
//!
//! Each layer owns an `Endpoint` holding its local state: the IPv4 endpoint
//! its address configuration, the TCP endpoint the socket table, the ICMP
//! endpoint its answering policy. Endpoints stay open to reconfiguration
//! between events; during an event they borrow their collaborators (the
//! device, the neighbor cache, the upper-layer handler) for exactly the
//! duration of that event, which keeps the whole stack free of interior
//! mutability and re-entrant in the single-threaded sense.

pub mod arp;
pub mod icmp;
pub mod ip;
pub mod tcp;

/// The result type of layer processing.
pub type Result<T> = core::result::Result<T, Error>;

/// The error type of layer processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation is not permitted, e.g. sending to the host's own address.
    Illegal,

    /// No link-layer address is known for the destination. Retrying after
    /// the resolver has done its work may succeed.
    Unreachable,

    /// A fixed-capacity resource is full; retrying after cleanup may succeed.
    Exhausted,
}
