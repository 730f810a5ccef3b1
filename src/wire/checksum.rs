//! The Internet checksum kernel shared by IPv4, ICMPv4 and TCP.

use byteorder::{ByteOrder, NetworkEndian};

use super::{ipv4, IpProtocol};

/// Compute the one's-complement sum of 16-bit big-endian words over `data`.
///
/// Carries are folded back into the low 16 bits after every addition; a
/// trailing odd byte is treated as if padded with a zero byte on the right.
/// The returned sum is *not* complemented. A caller placing the value on the
/// wire complements it; a caller validating a packet sums over the data with
/// the checksum field included and expects `0xffff`.
pub fn data(data: &[u8]) -> u16 {
    data_seeded(data, 0)
}

/// Like [`data`], but seeds the sum, e.g. with a pseudo-header prelude.
pub fn data_seeded(data: &[u8], initial: u16) -> u16 {
    let mut sum = u32::from(initial);
    let mut words = data.chunks_exact(2);

    for word in words.by_ref() {
        sum += u32::from(NetworkEndian::read_u16(word));
        sum = (sum >> 16) + (sum & 0xffff);
    }

    // An odd trailing byte is the high half of its 16-bit word.
    if let [last] = *words.remainder() {
        sum += u32::from(last) << 8;
        sum = (sum >> 16) + (sum & 0xffff);
    }

    sum as u16
}

/// Fold several partial sums into one.
pub fn combine(sums: &[u16]) -> u16 {
    let mut total: u32 = sums.iter().copied().map(u32::from).sum();
    while total >> 16 != 0 {
        total = (total >> 16) + (total & 0xffff);
    }
    total as u16
}

/// Sum the IPv4 pseudo-header for an upper-layer checksum.
///
/// Covers source address, destination address, a zero byte, the protocol
/// byte and the upper-layer length, all in network order. The result seeds
/// the sum over the upper-layer segment itself.
pub fn pseudo_header(
    src_addr: ipv4::Address,
    dst_addr: ipv4::Address,
    protocol: IpProtocol,
    length: u16,
) -> u16 {
    let mut prelude = [0u8; 12];
    prelude[0..4].copy_from_slice(src_addr.as_bytes());
    prelude[4..8].copy_from_slice(dst_addr.as_bytes());
    prelude[9] = protocol.into();
    NetworkEndian::write_u16(&mut prelude[10..12], length);
    data(&prelude)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_input_returns_seed() {
        assert_eq!(data(&[]), 0);
        assert_eq!(data_seeded(&[], 0x1234), 0x1234);
    }

    #[test]
    fn single_byte_is_high_half() {
        assert_eq!(data(&[0xab]), 0xab00);
        assert_eq!(data(&[0xab, 0x00]), 0xab00);
    }

    #[test]
    fn odd_input_equals_zero_padded() {
        let odd = [0x12, 0x34, 0x56, 0x78, 0x9a];
        let padded = [0x12, 0x34, 0x56, 0x78, 0x9a, 0x00];
        assert_eq!(data(&odd), data(&padded));
    }

    #[test]
    fn carries_fold() {
        // 0xffff + 0x0001 wraps to 0x0001 in one's complement.
        assert_eq!(data(&[0xff, 0xff, 0x00, 0x01]), 0x0001);
    }

    #[test]
    fn concatenation_is_associative() {
        let bytes = [0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04];
        for split in (0..=bytes.len()).step_by(2) {
            let (a, b) = bytes.split_at(split);
            assert_eq!(combine(&[data(a), data(b)]), data(&bytes));
            assert_eq!(data_seeded(b, data(a)), data(&bytes));
        }
    }

    #[test]
    fn mutation_changes_sum() {
        let bytes = [0x45, 0x00, 0x00, 0x28, 0x1c, 0x46, 0x40, 0x00];
        let reference = data(&bytes);
        let mut mutated = bytes;
        for i in 0..bytes.len() {
            for flip in 1..=3u8 {
                mutated[i] = bytes[i] ^ flip;
                assert_ne!(data(&mutated), reference, "byte {} flip {}", i, flip);
            }
            mutated[i] = bytes[i];
        }
    }

    #[test]
    fn pseudo_header_matches_manual_prelude() {
        let src = ipv4::Address::new(192, 168, 1, 1);
        let dst = ipv4::Address::new(192, 168, 1, 2);
        let manual = [
            192, 168, 1, 1, //
            192, 168, 1, 2, //
            0, 6, 0, 32,
        ];
        assert_eq!(pseudo_header(src, dst, IpProtocol::Tcp, 32), data(&manual));
    }
}
