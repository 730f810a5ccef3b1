//! A static, heap-free IPv4/TCP stack for bare-metal servers.
//!
//! All state is provisioned at compile time: the socket table, retransmission
//! buffers and transmit frames are fixed-size values, and nothing on the hot
//! path allocates. The stack is driven cooperatively by two event sources, the
//! link driver's receive dispatch and a periodic aging tick; see [`Stack`].
//!
//! Protocol layers are split the classical way: `wire` holds the packet
//! formats as typed views over byte slices, `layer` the processing state of
//! each protocol, and `nic` the contract with the link-layer driver.
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

#[macro_use]
mod macros;

pub mod config;
pub mod layer;
pub mod nic;
pub mod wire;

mod stack;

pub use stack::Stack;
