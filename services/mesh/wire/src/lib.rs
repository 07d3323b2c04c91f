//! RFC5444 packet and message wire format for mesh.
//!
//! This crate provides the low-level pieces of the generalized MANET
//! packet/message format that the signature engine rewrites in place:
//! header layouts, TLV block tokenizing, a parsed per-packet/per-message
//! context and builders for well-formed buffers.
//!
//! ## Wire Format
//!
//! ```text
//! packet:  [version|flags:1] [seqno:2]? [tlv-block]? [message]*
//! message: [type:1] [flags|addr-len:1] [size:2]
//!          [originator:addr-len]? [hop-limit:1]? [hop-count:1]? [seqno:2]?
//!          [tlv-block] [address blocks]*
//! tlv-block: [length:2] [tlv]*
//! tlv:     [type:1] [flags:1] [type-ext:1]? [length:1|2]? [value]?
//! ```
//!
//! All multi-byte fields are big-endian.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod context;
pub mod error;
pub mod header;
pub mod tlv;

// Re-export main types
pub use codec::{MessageBuilder, PacketBuilder};
pub use context::{MessageIter, TlvBlockContext};
pub use error::WireError;
pub use header::{
    ContextKind, HeaderLayout, MessageFlags, MessageHeader, PacketFlags, PacketHeader,
    MAX_ADDR_LEN, MAX_PACKET_SIZE, MESSAGE_FIXED_HEADER_SIZE, RFC5444_VERSION,
    TLV_BLOCK_HEADER_SIZE,
};
pub use tlv::{
    encode_tlv_block, ext_tlv_size, IcvExtension, RawTlv, TlvBlock, TlvEntry, TlvFlags, TlvIter,
    ICV_TLV_TYPE, MAX_SHORT_VALUE_LEN,
};
