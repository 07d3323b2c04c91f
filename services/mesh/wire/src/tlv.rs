//! TLV and TLV block parsing.
//!
//! A TLV block is a big-endian 16 bit length followed by that many bytes of
//! TLVs. Each TLV is `[type][flags][type-ext?][index?][length?][value?]`
//! where the presence and width of every optional field is driven by the
//! flags byte. Getting the width of the length field wrong shifts every
//! following offset, so all of it is decoded in one place.

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::header::TLV_BLOCK_HEADER_SIZE;
use crate::WireError;

/// Packet and message TLV type of the RFC7182 integrity check value
pub const ICV_TLV_TYPE: u8 = 5;

/// Largest value that still fits a 1-byte length field
pub const MAX_SHORT_VALUE_LEN: usize = 255;

bitflags! {
    /// TLV flags byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TlvFlags: u8 {
        /// Type extension byte present
        const TYPE_EXT = 0x80;
        /// Single index byte present (address block TLVs only)
        const SINGLE_INDEX = 0x40;
        /// Start and stop index bytes present (address block TLVs only)
        const MULTI_INDEX = 0x20;
        /// Value present
        const VALUE = 0x10;
        /// Length field is two bytes
        const EXT_VALUE = 0x08;
        /// Value is split across the indexed addresses
        const MULTIVALUE = 0x04;
    }
}

/// Type extensions of the ICV TLV
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IcvExtension {
    /// Generic ICV without defined content
    Generic = 0,
    /// Cryptographic function over a hash of the content
    CryptHash = 1,
    /// Same as `CryptHash`, with the source address prepended to the content
    SrcSpecCryptHash = 2,
}

impl TryFrom<u8> for IcvExtension {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IcvExtension::Generic),
            1 => Ok(IcvExtension::CryptHash),
            2 => Ok(IcvExtension::SrcSpecCryptHash),
            _ => Err(WireError::Malformed("icv type extension")),
        }
    }
}

/// One decoded TLV, positions are absolute offsets into the parsed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvEntry {
    /// TLV type
    pub tlv_type: u8,
    /// Type extension (0 if not present)
    pub type_ext: u8,
    /// Flags byte
    pub flags: TlvFlags,
    /// Offset of the type byte
    pub offset: usize,
    /// Encoded length including all header bytes
    pub encoded_len: usize,
    /// Offset of the first value byte
    pub value_offset: usize,
    /// Length of the value
    pub value_len: usize,
}

impl TlvEntry {
    /// Decode the TLV starting at `offset`, which must end before `end`
    pub fn decode(buf: &[u8], offset: usize, end: usize) -> Result<Self, WireError> {
        let end = end.min(buf.len());
        let overrun = WireError::TlvOverrun { offset, end };

        if offset + 2 > end {
            return Err(overrun);
        }
        let tlv_type = buf[offset];
        let flags = TlvFlags::from_bits_truncate(buf[offset + 1]);
        let mut idx = offset + 2;

        let mut type_ext = 0;
        if flags.contains(TlvFlags::TYPE_EXT) {
            if idx >= end {
                return Err(overrun);
            }
            type_ext = buf[idx];
            idx += 1;
        }

        if flags.contains(TlvFlags::SINGLE_INDEX | TlvFlags::MULTI_INDEX) {
            return Err(WireError::Malformed("tlv with both index flags"));
        }
        if flags.contains(TlvFlags::SINGLE_INDEX) {
            idx += 1;
        } else if flags.contains(TlvFlags::MULTI_INDEX) {
            idx += 2;
        }

        let value_len = if flags.contains(TlvFlags::VALUE) {
            if flags.contains(TlvFlags::EXT_VALUE) {
                if idx + 2 > end {
                    return Err(overrun);
                }
                let len = u16::from_be_bytes([buf[idx], buf[idx + 1]]) as usize;
                idx += 2;
                len
            } else {
                if idx + 1 > end {
                    return Err(overrun);
                }
                let len = buf[idx] as usize;
                idx += 1;
                len
            }
        } else if flags.contains(TlvFlags::EXT_VALUE) {
            return Err(WireError::Malformed("extended length without value"));
        } else {
            0
        };

        if idx + value_len > end {
            return Err(overrun);
        }

        Ok(Self {
            tlv_type,
            type_ext,
            flags,
            offset,
            encoded_len: idx + value_len - offset,
            value_offset: idx,
            value_len,
        })
    }

    /// Value bytes of this TLV inside `buf`
    pub fn value<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.value_offset..self.value_offset + self.value_len]
    }

    /// Offset of the first byte after this TLV
    pub fn end(&self) -> usize {
        self.offset + self.encoded_len
    }
}

/// Position of a TLV block inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvBlock {
    /// Offset of the 2-byte block length
    pub offset: usize,
    /// Length of the TLVs inside the block
    pub len: usize,
}

impl TlvBlock {
    /// Decode the block header at `offset`
    pub fn decode(buf: &[u8], offset: usize) -> Result<Self, WireError> {
        let raw = buf
            .get(offset..offset + TLV_BLOCK_HEADER_SIZE)
            .ok_or(WireError::Incomplete("tlv block header"))?;
        let len = u16::from_be_bytes([raw[0], raw[1]]) as usize;
        if offset + TLV_BLOCK_HEADER_SIZE + len > buf.len() {
            return Err(WireError::Incomplete("tlv block"));
        }
        Ok(Self { offset, len })
    }

    /// Offset of the first TLV
    pub fn content_offset(&self) -> usize {
        self.offset + TLV_BLOCK_HEADER_SIZE
    }

    /// Offset of the first byte after the block
    pub fn end(&self) -> usize {
        self.content_offset() + self.len
    }

    /// Iterate over the TLVs of this block
    pub fn entries<'a>(&self, buf: &'a [u8]) -> TlvIter<'a> {
        TlvIter {
            buf,
            pos: self.content_offset(),
            end: self.end(),
            failed: false,
        }
    }
}

/// Iterator over the TLVs of one block
#[derive(Debug)]
pub struct TlvIter<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
    failed: bool,
}

impl Iterator for TlvIter<'_> {
    type Item = Result<TlvEntry, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.end {
            return None;
        }
        match TlvEntry::decode(self.buf, self.pos, self.end) {
            Ok(entry) => {
                self.pos = entry.end();
                Some(Ok(entry))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Encoded size of a TLV with a type extension and a value of `value_len` bytes
pub fn ext_tlv_size(value_len: usize) -> usize {
    if value_len > MAX_SHORT_VALUE_LEN {
        5 + value_len
    } else {
        4 + value_len
    }
}

/// A TLV to be encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTlv {
    /// TLV type
    pub tlv_type: u8,
    /// Optional type extension
    pub type_ext: Option<u8>,
    /// Optional value
    pub value: Option<Vec<u8>>,
}

impl RawTlv {
    /// TLV without type extension
    pub fn new(tlv_type: u8, value: Option<Vec<u8>>) -> Self {
        Self {
            tlv_type,
            type_ext: None,
            value,
        }
    }

    /// TLV with type extension
    pub fn with_ext(tlv_type: u8, type_ext: u8, value: Option<Vec<u8>>) -> Self {
        Self {
            tlv_type,
            type_ext: Some(type_ext),
            value,
        }
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        let mut len = 2;
        if self.type_ext.is_some() {
            len += 1;
        }
        if let Some(value) = &self.value {
            len += if value.len() > MAX_SHORT_VALUE_LEN { 2 } else { 1 };
            len += value.len();
        }
        len
    }

    /// Encode this TLV
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        let mut flags = TlvFlags::empty();
        flags.set(TlvFlags::TYPE_EXT, self.type_ext.is_some());
        if let Some(value) = &self.value {
            if value.len() > u16::MAX as usize {
                return Err(WireError::Size(value.len()));
            }
            flags |= TlvFlags::VALUE;
            flags.set(TlvFlags::EXT_VALUE, value.len() > MAX_SHORT_VALUE_LEN);
        }

        buf.put_u8(self.tlv_type);
        buf.put_u8(flags.bits());
        if let Some(ext) = self.type_ext {
            buf.put_u8(ext);
        }
        if let Some(value) = &self.value {
            if flags.contains(TlvFlags::EXT_VALUE) {
                buf.put_u16(value.len() as u16);
            } else {
                buf.put_u8(value.len() as u8);
            }
            buf.put_slice(value);
        }
        Ok(())
    }
}

/// Encode a complete TLV block (length field plus TLVs)
pub fn encode_tlv_block(buf: &mut BytesMut, tlvs: &[RawTlv]) -> Result<(), WireError> {
    let len: usize = tlvs.iter().map(RawTlv::encoded_len).sum();
    if len > u16::MAX as usize {
        return Err(WireError::Size(len));
    }
    buf.put_u16(len as u16);
    for tlv in tlvs {
        tlv.encode(buf)?;
    }
    Ok(())
}
