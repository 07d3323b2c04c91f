//! Builders for RFC5444 messages and packets.

use bytes::{BufMut, Bytes, BytesMut};
use smallvec::SmallVec;

use crate::header::{MessageFlags, MessageHeader, PacketFlags, PacketHeader, TLV_BLOCK_HEADER_SIZE};
use crate::tlv::{encode_tlv_block, RawTlv};
use crate::WireError;

/// Message builder
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    header: MessageHeader,
    tlvs: Vec<RawTlv>,
    body: Bytes,
}

impl MessageBuilder {
    /// Create a new message builder for the given type and address length.
    /// The address length must be within 1..=16.
    pub fn new(msg_type: u8, addr_len: u8) -> Self {
        Self {
            header: MessageHeader {
                msg_type,
                flags: MessageFlags::empty(),
                addr_len,
                size: 0,
                originator: None,
                hop_limit: None,
                hop_count: None,
                seqno: None,
            },
            tlvs: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Set the originator address (must be `addr_len` bytes)
    pub fn originator(mut self, addr: &[u8]) -> Self {
        self.header.originator = Some(SmallVec::from_slice(addr));
        self
    }

    /// Set the hop limit
    pub fn hop_limit(mut self, hop_limit: u8) -> Self {
        self.header.hop_limit = Some(hop_limit);
        self
    }

    /// Set the hop count
    pub fn hop_count(mut self, hop_count: u8) -> Self {
        self.header.hop_count = Some(hop_count);
        self
    }

    /// Set the message sequence number
    pub fn seqno(mut self, seqno: u16) -> Self {
        self.header.seqno = Some(seqno);
        self
    }

    /// Append a message TLV
    pub fn tlv(mut self, tlv: RawTlv) -> Self {
        self.tlvs.push(tlv);
        self
    }

    /// Set the bytes following the message TLV block (address blocks)
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Build the message
    pub fn build(mut self) -> Result<Bytes, WireError> {
        if let Some(originator) = &self.header.originator {
            if originator.len() != self.header.addr_len as usize {
                return Err(WireError::Malformed("originator length"));
            }
        }

        let tlv_len: usize = self.tlvs.iter().map(RawTlv::encoded_len).sum();
        let size = self.header.header_len() + TLV_BLOCK_HEADER_SIZE + tlv_len + self.body.len();
        if size > u16::MAX as usize {
            return Err(WireError::Size(size));
        }
        self.header.size = size as u16;

        let mut buf = BytesMut::with_capacity(size);
        self.header.encode(&mut buf)?;
        encode_tlv_block(&mut buf, &self.tlvs)?;
        buf.put_slice(&self.body);

        Ok(buf.freeze())
    }
}

/// Packet builder
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    seqno: Option<u16>,
    tlvs: Vec<RawTlv>,
    messages: Vec<Bytes>,
}

impl PacketBuilder {
    /// Create a new packet builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the packet sequence number
    pub fn seqno(mut self, seqno: u16) -> Self {
        self.seqno = Some(seqno);
        self
    }

    /// Append a packet TLV; a packet without TLVs carries no TLV block
    pub fn tlv(mut self, tlv: RawTlv) -> Self {
        self.tlvs.push(tlv);
        self
    }

    /// Append an encoded message
    pub fn message(mut self, message: Bytes) -> Self {
        self.messages.push(message);
        self
    }

    /// Build the packet
    pub fn build(self) -> Result<Bytes, WireError> {
        let mut flags = PacketFlags::empty();
        flags.set(PacketFlags::HAS_TLV, !self.tlvs.is_empty());

        let header = PacketHeader {
            flags,
            seqno: self.seqno,
        };

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        if !self.tlvs.is_empty() {
            encode_tlv_block(&mut buf, &self.tlvs)?;
        }
        for message in &self.messages {
            buf.put_slice(message);
        }
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderLayout;

    #[test]
    fn test_message_builder_size_field() {
        let msg = MessageBuilder::new(1, 4)
            .originator(&[192, 168, 1, 1])
            .hop_limit(255)
            .hop_count(0)
            .seqno(42)
            .tlv(RawTlv::new(7, Some(vec![1, 2, 3])))
            .body(Bytes::from_static(&[0xAB; 6]))
            .build()
            .unwrap();

        let header = MessageHeader::decode(&msg).unwrap();
        assert_eq!(header.size as usize, msg.len());
        assert_eq!(header.hop_limit, Some(255));
        assert_eq!(header.seqno, Some(42));
        assert_eq!(msg.len(), 12 + 2 + 6 + 6);
    }

    #[test]
    fn test_bad_originator_length() {
        let result = MessageBuilder::new(1, 4).originator(&[1, 2]).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_packet_builder_flags() {
        let bare = PacketBuilder::new().build().unwrap();
        assert_eq!(&bare[..], &[0x00]);

        let with_tlv = PacketBuilder::new()
            .seqno(9)
            .tlv(RawTlv::new(1, None))
            .build()
            .unwrap();
        let layout = HeaderLayout::of_packet(&with_tlv).unwrap();
        assert!(layout.has_tlv_block);
        assert_eq!(layout.header_len, 3);
        assert_eq!(&with_tlv[..], &[0x0C, 0x00, 0x09, 0x00, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_message_builder_rejects_address_length() {
        for addr_len in [0, 17] {
            assert_eq!(
                MessageBuilder::new(1, addr_len).build(),
                Err(WireError::Malformed("address length"))
            );
        }
        assert!(MessageBuilder::new(1, 16).build().is_ok());
    }
}
