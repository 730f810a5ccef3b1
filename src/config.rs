//! Compile-time sizing of every statically provisioned table and buffer.
//!
//! There is no runtime configuration for any of these; changing a value means
//! rebuilding the stack. All sizes are chosen for small bare-metal targets
//! and can be raised freely where memory allows.

/// Largest IPv4 payload carried in a single frame.
///
/// This is the IP *payload* budget: a full frame is the 14-byte Ethernet
/// header, the 20-byte IPv4 header and up to this many payload bytes.
pub const IPV4_PAYLOAD_MTU: usize = 1480;

/// Maximum segment size advertised to TCP peers, the IPv4 payload budget
/// minus the TCP header.
pub const TCP_MSS: usize = IPV4_PAYLOAD_MTU - 20;

/// Receive window advertised on every outbound segment.
///
/// Kept a flat value: the stack delivers inbound payloads synchronously and
/// never buffers, so the window only bounds the peer's burst size.
pub const TCP_RX_WINDOW: u16 = 2048;

/// Sent-but-unacknowledged segments retained per socket.
///
/// Bounds both the retransmission storage and the number of data segments a
/// caller may have in flight before `send_tx_segment` starts failing.
pub const TCP_MAX_UNACKED: usize = 4;

/// Aging ticks before an unacknowledged segment is retransmitted.
///
/// The aging timer runs at nominally 10 Hz, so the default of 2 retransmits
/// after roughly 200 ms without an ACK.
pub const TCP_RETRANSMIT_TIMEOUT: u32 = 2;

/// Associativity of the socket table.
pub const TCP_TABLE_WAYS: usize = 4;

/// Lines per way of the socket table.
///
/// A 4-tuple hash picks the line; the ways of that line are probed linearly.
/// Total socket capacity is `TCP_TABLE_WAYS * TCP_TABLE_LINES`.
pub const TCP_TABLE_LINES: usize = 8;
