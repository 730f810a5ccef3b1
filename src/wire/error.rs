use core::fmt;

/// The error type for packet parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer is shorter than the minimum or declared packet length.
    Truncated,

    /// A checksum did not verify. The packet is dropped; checksummed data is
    /// never handed to an upper layer.
    WrongChecksum,

    /// The packet was recognized but is self-contradictory, e.g. a header
    /// length field below the fixed header size.
    Malformed,

    /// Parsing would depend on a feature this stack does not implement, such
    /// as IP options or fragment reassembly.
    Unsupported,
}

/// The result type for packet parsing.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated => write!(f, "truncated packet"),
            Error::WrongChecksum => write!(f, "checksum error"),
            Error::Malformed => write!(f, "malformed packet"),
            Error::Unsupported => write!(f, "unsupported feature"),
        }
    }
}
