//! Packet and message header layouts.
//!
//! RFC5444 headers are variable length: the packet header grows by a
//! sequence number, the message header by originator, hop limit, hop count
//! and sequence number. [`HeaderLayout`] records where each optional field
//! sits so the signature code can zero or skip it without re-parsing.

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::WireError;

/// Packet version (RFC5444 only defines version 0)
pub const RFC5444_VERSION: u8 = 0;

/// Default maximum packet size
pub const MAX_PACKET_SIZE: usize = 1500;

/// Size of the fixed part of a message header (type, flags, size)
pub const MESSAGE_FIXED_HEADER_SIZE: usize = 4;

/// Longest address a message header can announce
pub const MAX_ADDR_LEN: u8 = 16;

/// Size of a TLV block length field
pub const TLV_BLOCK_HEADER_SIZE: usize = 2;

bitflags! {
    /// Packet header flags (low nibble of the first packet byte)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PacketFlags: u8 {
        /// Packet sequence number present
        const HAS_SEQNO = 0x08;
        /// Packet TLV block present
        const HAS_TLV = 0x04;
    }
}

bitflags! {
    /// Message header flags (high nibble of the second message byte)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MessageFlags: u8 {
        /// Originator address present
        const ORIGINATOR = 0x80;
        /// Hop limit present
        const HOP_LIMIT = 0x40;
        /// Hop count present
        const HOP_COUNT = 0x20;
        /// Message sequence number present
        const SEQNO = 0x10;
    }
}

/// Decoded packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Packet flags
    pub flags: PacketFlags,
    /// Packet sequence number
    pub seqno: Option<u16>,
}

impl PacketHeader {
    /// Decode the packet header from the start of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let first = *buf.first().ok_or(WireError::Incomplete("packet header"))?;
        let version = first >> 4;
        if version != RFC5444_VERSION {
            return Err(WireError::Version(version));
        }

        let flags = PacketFlags::from_bits_truncate(first & 0x0F);
        let seqno = if flags.contains(PacketFlags::HAS_SEQNO) {
            if buf.len() < 3 {
                return Err(WireError::Incomplete("packet sequence number"));
            }
            Some(u16::from_be_bytes([buf[1], buf[2]]))
        } else {
            None
        };

        Ok(Self { flags, seqno })
    }

    /// Header length in bytes
    pub fn header_len(&self) -> usize {
        if self.seqno.is_some() {
            3
        } else {
            1
        }
    }

    /// Encode the packet header
    pub fn encode(&self, buf: &mut BytesMut) {
        let mut flags = self.flags;
        flags.set(PacketFlags::HAS_SEQNO, self.seqno.is_some());
        buf.put_u8((RFC5444_VERSION << 4) | flags.bits());
        if let Some(seqno) = self.seqno {
            buf.put_u16(seqno);
        }
    }
}

/// Decoded message header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Message type
    pub msg_type: u8,
    /// Message flags
    pub flags: MessageFlags,
    /// Address length used inside this message (1..=16)
    pub addr_len: u8,
    /// Total message size including header
    pub size: u16,
    /// Originator address
    pub originator: Option<SmallVec<[u8; 16]>>,
    /// Hop limit
    pub hop_limit: Option<u8>,
    /// Hop count
    pub hop_count: Option<u8>,
    /// Message sequence number
    pub seqno: Option<u16>,
}

impl MessageHeader {
    /// Decode the message header from the start of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < MESSAGE_FIXED_HEADER_SIZE {
            return Err(WireError::Incomplete("message header"));
        }

        let msg_type = buf[0];
        let flags = MessageFlags::from_bits_truncate(buf[1] & 0xF0);
        let addr_len = (buf[1] & 0x0F) + 1;
        let size = u16::from_be_bytes([buf[2], buf[3]]);

        let mut idx = MESSAGE_FIXED_HEADER_SIZE;
        let originator = if flags.contains(MessageFlags::ORIGINATOR) {
            Some(SmallVec::from_slice(take(buf, &mut idx, addr_len as usize)?))
        } else {
            None
        };
        let hop_limit = if flags.contains(MessageFlags::HOP_LIMIT) {
            Some(take(buf, &mut idx, 1)?[0])
        } else {
            None
        };
        let hop_count = if flags.contains(MessageFlags::HOP_COUNT) {
            Some(take(buf, &mut idx, 1)?[0])
        } else {
            None
        };
        let seqno = if flags.contains(MessageFlags::SEQNO) {
            let raw = take(buf, &mut idx, 2)?;
            Some(u16::from_be_bytes([raw[0], raw[1]]))
        } else {
            None
        };

        let header = Self {
            msg_type,
            flags,
            addr_len,
            size,
            originator,
            hop_limit,
            hop_count,
            seqno,
        };

        let size = header.size as usize;
        if size < header.header_len() + TLV_BLOCK_HEADER_SIZE {
            return Err(WireError::Malformed("message size smaller than header"));
        }
        if size > buf.len() {
            return Err(WireError::Incomplete("message body"));
        }
        Ok(header)
    }

    /// Header length in bytes
    pub fn header_len(&self) -> usize {
        let mut len = MESSAGE_FIXED_HEADER_SIZE;
        if self.originator.is_some() {
            len += self.addr_len as usize;
        }
        if self.hop_limit.is_some() {
            len += 1;
        }
        if self.hop_count.is_some() {
            len += 1;
        }
        if self.seqno.is_some() {
            len += 2;
        }
        len
    }

    /// Encode the message header; `size` is written as stored
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        if !(1..=MAX_ADDR_LEN).contains(&self.addr_len) {
            return Err(WireError::Malformed("address length"));
        }

        let mut flags = MessageFlags::empty();
        flags.set(MessageFlags::ORIGINATOR, self.originator.is_some());
        flags.set(MessageFlags::HOP_LIMIT, self.hop_limit.is_some());
        flags.set(MessageFlags::HOP_COUNT, self.hop_count.is_some());
        flags.set(MessageFlags::SEQNO, self.seqno.is_some());

        buf.put_u8(self.msg_type);
        buf.put_u8(flags.bits() | ((self.addr_len - 1) & 0x0F));
        buf.put_u16(self.size);
        if let Some(originator) = &self.originator {
            buf.put_slice(originator);
        }
        if let Some(hop_limit) = self.hop_limit {
            buf.put_u8(hop_limit);
        }
        if let Some(hop_count) = self.hop_count {
            buf.put_u8(hop_count);
        }
        if let Some(seqno) = self.seqno {
            buf.put_u16(seqno);
        }
        Ok(())
    }
}

fn take<'a>(buf: &'a [u8], idx: &mut usize, len: usize) -> Result<&'a [u8], WireError> {
    let field = buf
        .get(*idx..*idx + len)
        .ok_or(WireError::Incomplete("message header"))?;
    *idx += len;
    Ok(field)
}

/// Whether a TLV block belongs to a packet or to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKind {
    /// Packet TLV block
    Packet,
    /// Message TLV block of the given message type
    Message {
        /// Message type
        msg_type: u8,
    },
}

impl ContextKind {
    /// Message type, `None` for packets
    pub fn msg_type(&self) -> Option<u8> {
        match self {
            ContextKind::Packet => None,
            ContextKind::Message { msg_type } => Some(*msg_type),
        }
    }
}

/// Byte offsets of the header fields the signature code has to touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    /// Packet or message
    pub kind: ContextKind,
    /// Length of the header preceding the first TLV block
    pub header_len: usize,
    /// Offset of the hop limit byte
    pub hop_limit_offset: Option<usize>,
    /// Offset of the hop count byte
    pub hop_count_offset: Option<usize>,
    /// Offset of the sequence number
    pub seqno_offset: Option<usize>,
    /// Whether a TLV block follows the header
    pub has_tlv_block: bool,
}

impl HeaderLayout {
    /// Layout of a packet header
    pub fn of_packet(buf: &[u8]) -> Result<Self, WireError> {
        let header = PacketHeader::decode(buf)?;
        Ok(Self {
            kind: ContextKind::Packet,
            header_len: header.header_len(),
            hop_limit_offset: None,
            hop_count_offset: None,
            seqno_offset: header.seqno.map(|_| 1),
            has_tlv_block: header.flags.contains(PacketFlags::HAS_TLV),
        })
    }

    /// Layout of a message header
    pub fn of_message(buf: &[u8]) -> Result<Self, WireError> {
        let header = MessageHeader::decode(buf)?;

        let mut idx = MESSAGE_FIXED_HEADER_SIZE;
        if header.originator.is_some() {
            idx += header.addr_len as usize;
        }
        let hop_limit_offset = header.hop_limit.map(|_| {
            idx += 1;
            idx - 1
        });
        let hop_count_offset = header.hop_count.map(|_| {
            idx += 1;
            idx - 1
        });
        let seqno_offset = header.seqno.map(|_| idx);

        Ok(Self {
            kind: ContextKind::Message {
                msg_type: header.msg_type,
            },
            header_len: header.header_len(),
            hop_limit_offset,
            hop_count_offset,
            seqno_offset,
            has_tlv_block: true,
        })
    }

    /// Layout for either kind
    pub fn decode(kind: ContextKind, buf: &[u8]) -> Result<Self, WireError> {
        match kind {
            ContextKind::Packet => Self::of_packet(buf),
            ContextKind::Message { .. } => Self::of_message(buf),
        }
    }

    /// Whether this is a message layout
    pub fn is_message(&self) -> bool {
        matches!(self.kind, ContextKind::Message { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_header_decode() {
        let header = PacketHeader::decode(&[0x0C, 0x12, 0x34]).unwrap();
        assert!(header.flags.contains(PacketFlags::HAS_TLV));
        assert_eq!(header.seqno, Some(0x1234));
        assert_eq!(header.header_len(), 3);

        assert_eq!(PacketHeader::decode(&[0x10]), Err(WireError::Version(1)));
        assert!(PacketHeader::decode(&[0x08, 0x00]).is_err());
    }

    #[test]
    fn test_message_header_round_trip() {
        let header = MessageHeader {
            msg_type: 1,
            flags: MessageFlags::empty(),
            addr_len: 4,
            size: 20,
            originator: Some(SmallVec::from_slice(&[10, 0, 0, 1])),
            hop_limit: Some(255),
            hop_count: Some(0),
            seqno: Some(7),
        };

        let mut buf = BytesMut::new();
        header.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), header.header_len());
        buf.resize(20, 0);

        let mut decoded = MessageHeader::decode(&buf).unwrap();
        assert!(decoded.flags.contains(MessageFlags::HOP_LIMIT | MessageFlags::SEQNO));
        decoded.flags = MessageFlags::empty();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_message_layout_offsets() {
        // type 7, originator + hop limit + hop count + seqno, addr_len 4
        let mut buf = vec![7, 0xF3, 0x00, 16, 10, 0, 0, 1, 64, 3, 0x00, 0x2A, 0, 0];
        buf.resize(16, 0);

        let layout = HeaderLayout::of_message(&buf).unwrap();
        assert_eq!(layout.kind, ContextKind::Message { msg_type: 7 });
        assert_eq!(layout.header_len, 12);
        assert_eq!(layout.hop_limit_offset, Some(8));
        assert_eq!(layout.hop_count_offset, Some(9));
        assert_eq!(layout.seqno_offset, Some(10));
    }

    #[test]
    fn test_message_size_validation() {
        // size field claims more bytes than available
        assert!(MessageHeader::decode(&[1, 0x03, 0x00, 0x20, 0, 0]).is_err());
        // size field smaller than header + tlv block
        assert!(MessageHeader::decode(&[1, 0x03, 0x00, 0x04, 0, 0]).is_err());
    }

    #[test]
    fn test_message_header_address_length_range() {
        let mut header = MessageHeader {
            msg_type: 1,
            flags: MessageFlags::empty(),
            addr_len: 0,
            size: 4,
            originator: None,
            hop_limit: None,
            hop_count: None,
            seqno: None,
        };

        let mut buf = BytesMut::new();
        assert_eq!(
            header.encode(&mut buf),
            Err(WireError::Malformed("address length"))
        );
        assert!(buf.is_empty());

        header.addr_len = 17;
        assert!(header.encode(&mut buf).is_err());

        header.addr_len = 16;
        header.encode(&mut buf).unwrap();
        assert_eq!(buf[1] & 0x0F, 15);
    }
}
