//! Outgoing signature generation.

use std::net::IpAddr;

use mesh_wire::{ContextKind, HeaderLayout, IcvExtension, WireError, MAX_SHORT_VALUE_LEN};
use tracing::{debug, trace, warn};

use crate::registry::{PolicyHandle, SignatureRegistry};
use crate::rewrite::{splice_signature, strip_signatures, SignatureTlv};
use crate::scratch::SignatureScratch;
use crate::verify::ip_octets;
use crate::SignatureError;

/// The interface a packet or message is about to be sent on
pub trait OutboundTarget {
    /// Local address used for source specific signatures
    fn local_address(&self) -> Option<IpAddr>;
}

impl OutboundTarget for IpAddr {
    fn local_address(&self) -> Option<IpAddr> {
        Some(*self)
    }
}

impl OutboundTarget for Option<IpAddr> {
    fn local_address(&self) -> Option<IpAddr> {
        *self
    }
}

impl SignatureRegistry {
    /// Sign the content in `buf[..len]` with one policy.
    ///
    /// Returns the new content length. On error `buf` is left unchanged.
    pub fn add_signature(
        &self,
        handle: PolicyHandle,
        target: &dyn OutboundTarget,
        kind: ContextKind,
        buf: &mut [u8],
        len: usize,
        scratch: &mut SignatureScratch,
    ) -> Result<usize, SignatureError> {
        let entry = self
            .policy(handle)
            .ok_or(SignatureError::UnknownPolicy(handle))?;
        let policy = entry.policy();
        let resolved = entry
            .resolved()
            .ok_or(SignatureError::Inactive(handle))?;

        if !policy.applies_to(kind) {
            debug!("Signature policy '{}' does not apply to {:?}", policy.name(), kind);
            return Ok(len);
        }

        if len > buf.len() {
            return Err(SignatureError::BufferTooSmall {
                need: len,
                have: buf.len(),
            });
        }
        let content = &buf[..len];
        let layout = HeaderLayout::decode(kind, content)?;
        if layout.is_message() && u16::from_be_bytes([content[2], content[3]]) as usize != len {
            return Err(WireError::Malformed("message size field").into());
        }

        let key_id = policy.key_id();
        if key_id.len() > MAX_SHORT_VALUE_LEN {
            return Err(SignatureError::KeyIdTooLong(key_id.len()));
        }

        let signable = &mut scratch.signable;
        let mut idx = 0;
        if policy.is_source_specific() {
            let addr = target
                .local_address()
                .ok_or(SignatureError::NoLocalAddress)?;
            idx = ip_octets(addr, signable);
        }

        let key = policy.key();
        signable[idx] = key.hash;
        signable[idx + 1] = key.crypt;
        signable[idx + 2] = key_id.len() as u8;
        idx += 3;
        signable[idx..idx + key_id.len()].copy_from_slice(key_id);
        idx += key_id.len();
        idx += strip_signatures(content, &layout, &mut signable[idx..])?;

        let hash = resolved.hash.as_ref();
        let sig_len = resolved
            .crypt
            .crypt(hash, &signable[..idx], &mut scratch.crypt)?;
        let max = resolved.crypt.max_size(hash);
        if sig_len > max {
            return Err(SignatureError::SignatureTooLong { len: sig_len, max });
        }

        trace!("Signed data: {}", hex::encode(&signable[..idx]));
        trace!("Signature: {}", hex::encode(&scratch.crypt[..sig_len]));

        let tlv = SignatureTlv {
            extension: if policy.is_source_specific() {
                IcvExtension::SrcSpecCryptHash
            } else {
                IcvExtension::CryptHash
            },
            key,
            key_id,
            signature: &scratch.crypt[..sig_len],
        };
        splice_signature(buf, len, &layout, &tlv)
    }

    /// Sign with every active policy that applies to `kind`, in registry order.
    ///
    /// Returns the new content length. Any failure aborts the send and
    /// restores `buf[..len]` to the unsigned content.
    pub fn sign(
        &self,
        target: &dyn OutboundTarget,
        kind: ContextKind,
        buf: &mut [u8],
        len: usize,
        scratch: &mut SignatureScratch,
    ) -> Result<usize, SignatureError> {
        let have = buf.len().min(scratch.original.len());
        if len > have {
            return Err(SignatureError::BufferTooSmall { need: len, have });
        }
        scratch.original[..len].copy_from_slice(&buf[..len]);

        let mut signed = len;
        for entry in self.policies() {
            if !entry.is_active() || !entry.policy().applies_to(kind) {
                continue;
            }
            match self.add_signature(entry.handle(), target, kind, buf, signed, scratch) {
                Ok(new_len) => signed = new_len,
                Err(e) => {
                    warn!(
                        "Signature policy '{}' failed to sign {:?}: {}",
                        entry.policy().name(),
                        kind,
                        e
                    );
                    buf[..len].copy_from_slice(&scratch.original[..len]);
                    return Err(e);
                }
            }
        }
        Ok(signed)
    }
}
