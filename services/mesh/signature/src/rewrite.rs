//! Byte level rewriting of packets and messages.
//!
//! Stripping produces the canonical form that gets signed: hop limit and
//! hop count zeroed and all ICV TLVs removed from the first TLV block.
//! Splicing inserts a signature TLV as the first entry of that block.
//! Both keep every length field consistent and validate before writing.

use mesh_wire::{
    ext_tlv_size, HeaderLayout, IcvExtension, PacketFlags, TlvBlock, TlvFlags, ICV_TLV_TYPE,
    MAX_SHORT_VALUE_LEN, TLV_BLOCK_HEADER_SIZE,
};

use crate::policy::SignatureKey;
use crate::SignatureError;

/// Offset of the message size field
const MESSAGE_SIZE_OFFSET: usize = 2;

/// An ICV TLV about to be written
#[derive(Debug, Clone, Copy)]
pub struct SignatureTlv<'a> {
    /// Plain or source specific signature
    pub extension: IcvExtension,
    /// Hash and crypt ids
    pub key: SignatureKey,
    /// Key id, at most 255 bytes
    pub key_id: &'a [u8],
    /// Crypt output
    pub signature: &'a [u8],
}

impl SignatureTlv<'_> {
    /// Length of the TLV value
    pub fn value_len(&self) -> usize {
        3 + self.key_id.len() + self.signature.len()
    }

    /// Encoded length of the whole TLV
    pub fn encoded_len(&self) -> usize {
        ext_tlv_size(self.value_len())
    }

    fn write(&self, dst: &mut [u8]) {
        let value_len = self.value_len();
        let mut flags = TlvFlags::TYPE_EXT | TlvFlags::VALUE;
        if value_len > MAX_SHORT_VALUE_LEN {
            flags |= TlvFlags::EXT_VALUE;
        }

        dst[0] = ICV_TLV_TYPE;
        dst[1] = flags.bits();
        dst[2] = self.extension as u8;
        let mut idx = 3;
        if value_len > MAX_SHORT_VALUE_LEN {
            dst[idx..idx + 2].copy_from_slice(&(value_len as u16).to_be_bytes());
            idx += 2;
        } else {
            dst[idx] = value_len as u8;
            idx += 1;
        }

        dst[idx] = self.key.hash;
        dst[idx + 1] = self.key.crypt;
        dst[idx + 2] = self.key_id.len() as u8;
        idx += 3;
        dst[idx..idx + self.key_id.len()].copy_from_slice(self.key_id);
        idx += self.key_id.len();
        dst[idx..idx + self.signature.len()].copy_from_slice(self.signature);
    }
}

fn write_u16(buf: &mut [u8], offset: usize, value: usize) -> Result<(), SignatureError> {
    let value = u16::try_from(value).map_err(|_| SignatureError::LengthOverflow(value))?;
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    Ok(())
}

/// Copy `src` into `dst` in canonical signing form, returning the length
/// written. The sequence number is left untouched.
pub fn strip_signatures(
    src: &[u8],
    layout: &HeaderLayout,
    dst: &mut [u8],
) -> Result<usize, SignatureError> {
    if dst.len() < src.len() {
        return Err(SignatureError::BufferTooSmall {
            need: src.len(),
            have: dst.len(),
        });
    }

    let header_len = layout.header_len;
    dst[..header_len].copy_from_slice(&src[..header_len]);
    for offset in [layout.hop_limit_offset, layout.hop_count_offset]
        .into_iter()
        .flatten()
    {
        dst[offset] = 0;
    }

    if !layout.has_tlv_block {
        dst[header_len..src.len()].copy_from_slice(&src[header_len..]);
        return Ok(src.len());
    }

    let block = TlvBlock::decode(src, header_len)?;
    let mut out = block.content_offset();
    let mut block_len = block.len;

    for entry in block.entries(src) {
        let entry = entry?;
        if entry.tlv_type == ICV_TLV_TYPE {
            block_len -= entry.encoded_len;
            continue;
        }
        dst[out..out + entry.encoded_len].copy_from_slice(&src[entry.offset..entry.end()]);
        out += entry.encoded_len;
    }

    if block_len > 0 || layout.is_message() {
        write_u16(dst, header_len, block_len)?;
    } else {
        // empty packet TLV block disappears with its header
        out -= TLV_BLOCK_HEADER_SIZE;
        dst[0] &= !PacketFlags::HAS_TLV.bits();
    }

    let rest = &src[block.end()..];
    dst[out..out + rest.len()].copy_from_slice(rest);
    out += rest.len();

    if layout.is_message() {
        write_u16(dst, MESSAGE_SIZE_OFFSET, out)?;
    }
    Ok(out)
}

/// Insert `tlv` as the first entry of the first TLV block of the content in
/// `buf[..len]`, creating the block for packets without one.
///
/// Returns the new content length. Nothing is written on failure.
pub fn splice_signature(
    buf: &mut [u8],
    len: usize,
    layout: &HeaderLayout,
    tlv: &SignatureTlv<'_>,
) -> Result<usize, SignatureError> {
    if tlv.key_id.len() > MAX_SHORT_VALUE_LEN {
        return Err(SignatureError::KeyIdTooLong(tlv.key_id.len()));
    }
    if tlv.value_len() > u16::MAX as usize {
        return Err(SignatureError::LengthOverflow(tlv.value_len()));
    }

    let block_offset = layout.header_len;
    let create_block = !layout.has_tlv_block;
    let tlv_size = tlv.encoded_len();

    let (insert_at, block_len, grow) = if create_block {
        (block_offset, tlv_size, tlv_size + TLV_BLOCK_HEADER_SIZE)
    } else {
        let block = TlvBlock::decode(&buf[..len], block_offset)?;
        (block.content_offset(), block.len + tlv_size, tlv_size)
    };

    let new_len = len + grow;
    if new_len > buf.len() {
        return Err(SignatureError::BufferTooSmall {
            need: new_len,
            have: buf.len(),
        });
    }
    if block_len > u16::MAX as usize {
        return Err(SignatureError::LengthOverflow(block_len));
    }
    if layout.is_message() && new_len > u16::MAX as usize {
        return Err(SignatureError::LengthOverflow(new_len));
    }

    buf.copy_within(insert_at..len, insert_at + grow);
    if create_block {
        buf[0] |= PacketFlags::HAS_TLV.bits();
    }
    write_u16(buf, block_offset, block_len)?;
    tlv.write(&mut buf[block_offset + TLV_BLOCK_HEADER_SIZE..]);

    if layout.is_message() {
        write_u16(buf, MESSAGE_SIZE_OFFSET, new_len)?;
    }
    Ok(new_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_wire::{MessageBuilder, PacketBuilder, RawTlv, TlvBlockContext};

    fn signed_message() -> Vec<u8> {
        MessageBuilder::new(1, 4)
            .originator(&[10, 0, 0, 1])
            .hop_limit(16)
            .hop_count(3)
            .seqno(0x1234)
            .tlv(RawTlv::new(7, Some(vec![1, 2])))
            .tlv(RawTlv::with_ext(ICV_TLV_TYPE, 1, Some(vec![0, 0, 0, 9, 9])))
            .tlv(RawTlv::new(8, None))
            .build()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_strip_message() {
        let src = signed_message();
        let ctx = TlvBlockContext::message(&src).unwrap();
        let mut dst = vec![0u8; src.len()];

        let len = strip_signatures(&src, ctx.layout(), &mut dst).unwrap();
        let stripped = TlvBlockContext::message(&dst[..len]).unwrap();

        assert_eq!(len, src.len() - (4 + 5));
        assert_eq!(u16::from_be_bytes([dst[2], dst[3]]) as usize, len);
        assert_eq!(stripped.tlvs().len(), 2);
        assert_eq!(stripped.tlvs_of_type(ICV_TLV_TYPE).count(), 0);

        let layout = stripped.layout();
        assert_eq!(dst[layout.hop_limit_offset.unwrap()], 0);
        assert_eq!(dst[layout.hop_count_offset.unwrap()], 0);
        let seq = layout.seqno_offset.unwrap();
        assert_eq!(&dst[seq..seq + 2], &[0x12, 0x34]);
    }

    #[test]
    fn test_strip_is_idempotent() {
        let src = signed_message();
        let layout = *TlvBlockContext::message(&src).unwrap().layout();
        let mut once = vec![0u8; src.len()];
        let n1 = strip_signatures(&src, &layout, &mut once).unwrap();

        let layout = *TlvBlockContext::message(&once[..n1]).unwrap().layout();
        let mut twice = vec![0u8; n1];
        let n2 = strip_signatures(&once[..n1], &layout, &mut twice).unwrap();

        assert_eq!(once[..n1], twice[..n2]);
    }

    #[test]
    fn test_strip_removes_empty_packet_block() {
        let msg = MessageBuilder::new(1, 4).build().unwrap();
        let src = PacketBuilder::new()
            .tlv(RawTlv::with_ext(ICV_TLV_TYPE, 1, Some(vec![0, 0, 0, 1])))
            .message(msg.clone())
            .build()
            .unwrap();
        let layout = *TlvBlockContext::packet(&src).unwrap().layout();
        let mut dst = vec![0u8; src.len()];

        let len = strip_signatures(&src, &layout, &mut dst).unwrap();

        assert_eq!(len, 1 + msg.len());
        assert_eq!(dst[0] & PacketFlags::HAS_TLV.bits(), 0);
        assert_eq!(&dst[1..len], &msg[..]);
    }

    #[test]
    fn test_strip_rejects_short_destination() {
        let src = signed_message();
        let layout = *TlvBlockContext::message(&src).unwrap().layout();
        let mut dst = vec![0u8; 4];
        assert!(matches!(
            strip_signatures(&src, &layout, &mut dst),
            Err(SignatureError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_splice_into_message() {
        let src = MessageBuilder::new(1, 4)
            .tlv(RawTlv::new(7, Some(vec![1])))
            .build()
            .unwrap();
        let mut buf = vec![0u8; 128];
        buf[..src.len()].copy_from_slice(&src);
        let layout = HeaderLayout::of_message(&src).unwrap();

        let tlv = SignatureTlv {
            extension: IcvExtension::CryptHash,
            key: SignatureKey::new(3, 3),
            key_id: b"k",
            signature: &[0xaa; 32],
        };
        let len = splice_signature(&mut buf, src.len(), &layout, &tlv).unwrap();

        assert_eq!(len, src.len() + 4 + 36);
        let ctx = TlvBlockContext::message(&buf[..len]).unwrap();
        assert_eq!(ctx.buffer().len(), len);
        assert_eq!(ctx.tlvs()[0].tlv_type, ICV_TLV_TYPE);
        assert_eq!(ctx.tlvs()[0].type_ext, 1);
        assert_eq!(ctx.tlvs()[1].tlv_type, 7);
        let value = ctx.value(&ctx.tlvs()[0]);
        assert_eq!(&value[..4], &[3, 3, 1, b'k']);
    }

    #[test]
    fn test_splice_creates_packet_block() {
        let msg = MessageBuilder::new(1, 4).build().unwrap();
        let src = PacketBuilder::new().message(msg.clone()).build().unwrap();
        let mut buf = vec![0u8; 128];
        buf[..src.len()].copy_from_slice(&src);
        let layout = HeaderLayout::of_packet(&src).unwrap();
        assert!(!layout.has_tlv_block);

        let tlv = SignatureTlv {
            extension: IcvExtension::CryptHash,
            key: SignatureKey::new(0, 0),
            key_id: &[],
            signature: &[1, 2, 3],
        };
        let len = splice_signature(&mut buf, src.len(), &layout, &tlv).unwrap();

        assert_eq!(len, src.len() + 2 + 4 + 6);
        let ctx = TlvBlockContext::packet(&buf[..len]).unwrap();
        assert_eq!(ctx.tlvs().len(), 1);
        let messages: Vec<_> = ctx.messages().collect::<Result<_, _>>().unwrap();
        assert_eq!(messages, vec![&msg[..]]);
    }

    #[test]
    fn test_splice_uses_extended_length() {
        let src = MessageBuilder::new(1, 4).build().unwrap();
        let mut buf = vec![0u8; 512];
        buf[..src.len()].copy_from_slice(&src);
        let layout = HeaderLayout::of_message(&src).unwrap();

        let signature = vec![7u8; 300];
        let tlv = SignatureTlv {
            extension: IcvExtension::CryptHash,
            key: SignatureKey::new(0, 0),
            key_id: &[],
            signature: &signature,
        };
        let len = splice_signature(&mut buf, src.len(), &layout, &tlv).unwrap();

        assert_eq!(len, src.len() + 5 + 303);
        let ctx = TlvBlockContext::message(&buf[..len]).unwrap();
        let entry = ctx.tlvs()[0];
        assert!(entry.flags.contains(TlvFlags::EXT_VALUE));
        assert_eq!(entry.value_len, 303);
    }

    #[test]
    fn test_splice_without_room_leaves_buffer_untouched() {
        let src = MessageBuilder::new(1, 4).build().unwrap();
        let mut buf = src.to_vec();
        let layout = HeaderLayout::of_message(&src).unwrap();

        let tlv = SignatureTlv {
            extension: IcvExtension::CryptHash,
            key: SignatureKey::new(0, 0),
            key_id: &[],
            signature: &[1],
        };
        assert!(matches!(
            splice_signature(&mut buf, src.len(), &layout, &tlv),
            Err(SignatureError::BufferTooSmall { .. })
        ));
        assert_eq!(buf, src.to_vec());
    }
}
