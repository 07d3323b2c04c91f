//! Parsed view of a packet or message and its first TLV block.

use smallvec::SmallVec;
use tracing::trace;

use crate::header::{ContextKind, HeaderLayout, MessageHeader};
use crate::tlv::{TlvBlock, TlvEntry};
use crate::WireError;

/// A packet or message together with the TLVs of its first TLV block
#[derive(Debug, Clone)]
pub struct TlvBlockContext<'a> {
    buffer: &'a [u8],
    layout: HeaderLayout,
    block: Option<TlvBlock>,
    tlvs: SmallVec<[TlvEntry; 8]>,
}

impl<'a> TlvBlockContext<'a> {
    /// Parse a complete packet
    pub fn packet(buf: &'a [u8]) -> Result<Self, WireError> {
        let layout = HeaderLayout::of_packet(buf)?;
        Self::parse(buf, layout)
    }

    /// Parse one message; bytes beyond its size field are not part of it
    pub fn message(buf: &'a [u8]) -> Result<Self, WireError> {
        let header = MessageHeader::decode(buf)?;
        let buf = &buf[..header.size as usize];
        let layout = HeaderLayout::of_message(buf)?;
        Self::parse(buf, layout)
    }

    fn parse(buffer: &'a [u8], layout: HeaderLayout) -> Result<Self, WireError> {
        let block = if layout.has_tlv_block {
            Some(TlvBlock::decode(buffer, layout.header_len)?)
        } else {
            None
        };

        let tlvs: SmallVec<[TlvEntry; 8]> = match &block {
            Some(block) => block.entries(buffer).collect::<Result<_, _>>()?,
            None => SmallVec::new(),
        };
        trace!(
            "Parsed {:?}: {} bytes, {} tlvs in first block",
            layout.kind,
            buffer.len(),
            tlvs.len()
        );

        Ok(Self {
            buffer,
            layout,
            block,
            tlvs,
        })
    }

    /// Packet or message
    pub fn kind(&self) -> ContextKind {
        self.layout.kind
    }

    /// Header layout
    pub fn layout(&self) -> &HeaderLayout {
        &self.layout
    }

    /// Raw bytes of the packet or message
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// First TLV block, if present
    pub fn tlv_block(&self) -> Option<TlvBlock> {
        self.block
    }

    /// All TLVs of the first block, in wire order
    pub fn tlvs(&self) -> &[TlvEntry] {
        &self.tlvs
    }

    /// TLVs of one type, in wire order
    pub fn tlvs_of_type(&self, tlv_type: u8) -> impl Iterator<Item = &TlvEntry> + '_ {
        self.tlvs.iter().filter(move |tlv| tlv.tlv_type == tlv_type)
    }

    /// Value of a TLV of this context
    pub fn value(&self, tlv: &TlvEntry) -> &'a [u8] {
        tlv.value(self.buffer)
    }

    /// Offset of the first byte after the header and TLV block
    pub fn body_offset(&self) -> usize {
        self.block
            .map(|block| block.end())
            .unwrap_or(self.layout.header_len)
    }

    /// Messages carried by a packet; empty for message contexts
    pub fn messages(&self) -> MessageIter<'a> {
        let pos = match self.layout.kind {
            ContextKind::Packet => self.body_offset(),
            ContextKind::Message { .. } => self.buffer.len(),
        };
        MessageIter {
            buf: self.buffer,
            pos,
            failed: false,
        }
    }
}

/// Iterator over the messages following a packet header
#[derive(Debug)]
pub struct MessageIter<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<&'a [u8], WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        match MessageHeader::decode(&self.buf[self.pos..]) {
            Ok(header) => {
                let start = self.pos;
                self.pos += header.size as usize;
                Some(Ok(&self.buf[start..self.pos]))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{MessageBuilder, PacketBuilder};
    use crate::tlv::{RawTlv, ICV_TLV_TYPE};

    #[test]
    fn test_message_context() {
        let msg = MessageBuilder::new(3, 4)
            .hop_limit(16)
            .tlv(RawTlv::new(1, Some(vec![1, 2])))
            .tlv(RawTlv::with_ext(ICV_TLV_TYPE, 1, Some(vec![0, 0, 0, 9])))
            .build()
            .unwrap();

        let ctx = TlvBlockContext::message(&msg).unwrap();
        assert_eq!(ctx.kind(), ContextKind::Message { msg_type: 3 });
        assert_eq!(ctx.tlvs().len(), 2);

        let icv: Vec<_> = ctx.tlvs_of_type(ICV_TLV_TYPE).collect();
        assert_eq!(icv.len(), 1);
        assert_eq!(ctx.value(icv[0]), &[0, 0, 0, 9]);
        assert_eq!(ctx.body_offset(), msg.len());
    }

    #[test]
    fn test_packet_messages() {
        let first = MessageBuilder::new(1, 4).build().unwrap();
        let second = MessageBuilder::new(2, 4).seqno(5).build().unwrap();

        let pkt = PacketBuilder::new()
            .seqno(1)
            .message(first.clone())
            .message(second.clone())
            .build()
            .unwrap();

        let ctx = TlvBlockContext::packet(&pkt).unwrap();
        assert!(ctx.tlv_block().is_none());
        assert!(ctx.tlvs().is_empty());

        let messages: Vec<_> = ctx.messages().collect::<Result<_, _>>().unwrap();
        assert_eq!(messages, vec![&first[..], &second[..]]);
    }

    #[test]
    fn test_message_ignores_trailing_bytes() {
        let msg = MessageBuilder::new(1, 4).build().unwrap();
        let mut buf = msg.to_vec();
        buf.extend_from_slice(&[0xFF; 8]);

        let ctx = TlvBlockContext::message(&buf).unwrap();
        assert_eq!(ctx.buffer().len(), msg.len());
    }
}
