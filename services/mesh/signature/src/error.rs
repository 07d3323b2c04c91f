//! Signature engine error types.

use mesh_wire::WireError;
use thiserror::Error;

use crate::registry::PolicyHandle;

/// Signature engine errors
#[derive(Error, Debug)]
pub enum SignatureError {
    /// A hash function with this id is already registered
    #[error("hash function {0} already registered")]
    DuplicateHash(u8),

    /// A crypt function with this id is already registered
    #[error("crypt function {0} already registered")]
    DuplicateCrypt(u8),

    /// Policy handle not registered
    #[error("unknown signature policy {0}")]
    UnknownPolicy(PolicyHandle),

    /// Policy is registered but its hash or crypt function is missing
    #[error("signature policy {0} is not active")]
    Inactive(PolicyHandle),

    /// Source specific signature without a local address
    #[error("no local address for source specific signature")]
    NoLocalAddress,

    /// Key id does not fit its 1-byte length field
    #[error("key id too long: {0} bytes")]
    KeyIdTooLong(usize),

    /// Hash or crypt function failed
    #[error("{algorithm} transform failed: {reason}")]
    Transform {
        /// Which transform failed
        algorithm: &'static str,
        /// Failure description
        reason: String,
    },

    /// Crypt output larger than the function declared
    #[error("signature too long: {len} > {max}")]
    SignatureTooLong {
        /// Produced length
        len: usize,
        /// Declared maximum
        max: usize,
    },

    /// Caller provided buffer cannot hold the result
    #[error("buffer too small: need {need}, have {have}")]
    BufferTooSmall {
        /// Required bytes
        need: usize,
        /// Available bytes
        have: usize,
    },

    /// A 16 bit length field would overflow
    #[error("length field overflow: {0}")]
    LengthOverflow(usize),

    /// Malformed packet or message
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}
