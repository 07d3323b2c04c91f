//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Incomplete header or block (need more data)
    #[error("incomplete {0}")]
    Incomplete(&'static str),

    /// Unsupported packet version
    #[error("version unsupported: {0}")]
    Version(u8),

    /// Size limit exceeded
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// TLV runs past the end of its block
    #[error("tlv at offset {offset} overruns block end {end}")]
    TlvOverrun {
        /// Offset of the offending TLV
        offset: usize,
        /// End of the enclosing block
        end: usize,
    },

    /// Malformed structure
    #[error("malformed {0}")]
    Malformed(&'static str),
}
