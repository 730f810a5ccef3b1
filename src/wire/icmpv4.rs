use byteorder::{ByteOrder, NetworkEndian};

use super::checksum;
use super::field::{Field, Rest};
use super::{Error, Result};

enum_with_unknown! {
    /// ICMPv4 message type.
    pub enum Message(u8) {
        EchoReply = 0,
        EchoRequest = 8,
    }
}

byte_wrapper! {
    /// A byte sequence representing an ICMPv4 packet.
    icmpv4_packet
}

mod field {
    use super::{Field, Rest};

    pub const TYPE: usize = 0;
    pub const CODE: usize = 1;
    pub const CHECKSUM: Field = 2..4;

    pub const ECHO_IDENT: Field = 4..6;
    pub const ECHO_SEQNO: Field = 6..8;
    pub const ECHO_DATA: Rest = 8..;
}

/// Length of an ICMPv4 echo header.
pub const ECHO_HEADER_LEN: usize = field::ECHO_DATA.start;

impl icmpv4_packet {
    /// Imbue a raw octet buffer with ICMPv4 packet structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with ICMPv4 packet structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// Ensure that no echo accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < ECHO_HEADER_LEN {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Unwrap the packet as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Return the message type field.
    #[inline]
    pub fn msg_type(&self) -> Message {
        Message::from(self.0[field::TYPE])
    }

    /// Return the message code field.
    #[inline]
    pub fn msg_code(&self) -> u8 {
        self.0[field::CODE]
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the echo identifier field.
    #[inline]
    pub fn echo_ident(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::ECHO_IDENT])
    }

    /// Return the echo sequence number field.
    #[inline]
    pub fn echo_seq_no(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::ECHO_SEQNO])
    }

    /// Return the echo data as a byte slice.
    pub fn echo_data(&self) -> &[u8] {
        &self.0[field::ECHO_DATA]
    }

    /// Validate the checksum over the whole message.
    pub fn verify_checksum(&self) -> bool {
        checksum::data(&self.0) == !0
    }

    /// Set the message type field.
    #[inline]
    pub fn set_msg_type(&mut self, value: Message) {
        self.0[field::TYPE] = value.into()
    }

    /// Set the message code field.
    #[inline]
    pub fn set_msg_code(&mut self, value: u8) {
        self.0[field::CODE] = value
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the echo identifier field.
    #[inline]
    pub fn set_echo_ident(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::ECHO_IDENT], value)
    }

    /// Set the echo sequence number field.
    #[inline]
    pub fn set_echo_seq_no(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::ECHO_SEQNO], value)
    }

    /// Return the echo data as a mutable byte slice.
    pub fn echo_data_mut(&mut self) -> &mut [u8] {
        &mut self.0[field::ECHO_DATA]
    }

    /// Compute and fill in the checksum over the whole message.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let value = !checksum::data(&self.0);
        self.set_checksum(value)
    }
}

impl AsRef<[u8]> for icmpv4_packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static ECHO_BYTES: [u8; 12] = [
        0x08, 0x00, 0x21, 0x04, //
        0x12, 0x34, 0x00, 0x01, //
        0x61, 0x62, 0x63, 0x64,
    ];

    #[test]
    fn deconstruct() {
        let packet = icmpv4_packet::new_checked(&ECHO_BYTES[..]).unwrap();
        assert_eq!(packet.msg_type(), Message::EchoRequest);
        assert_eq!(packet.msg_code(), 0);
        assert_eq!(packet.checksum(), 0x2104);
        assert_eq!(packet.echo_ident(), 0x1234);
        assert_eq!(packet.echo_seq_no(), 1);
        assert_eq!(packet.echo_data(), b"abcd");
        assert!(packet.verify_checksum());
    }

    #[test]
    fn construct() {
        let mut bytes = [0u8; 12];
        let packet = icmpv4_packet::new_unchecked_mut(&mut bytes);
        packet.set_msg_type(Message::EchoRequest);
        packet.set_msg_code(0);
        packet.set_echo_ident(0x1234);
        packet.set_echo_seq_no(1);
        packet.echo_data_mut().copy_from_slice(b"abcd");
        packet.fill_checksum();
        assert_eq!(packet.as_bytes(), &ECHO_BYTES[..]);
    }

    #[test]
    fn corrupt_checksum_detected() {
        let mut bytes = ECHO_BYTES;
        bytes[4] ^= 0xff;
        assert!(!icmpv4_packet::new_unchecked(&bytes).verify_checksum());
    }
}
