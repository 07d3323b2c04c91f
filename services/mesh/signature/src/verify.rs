//! Incoming signature verification.

use std::fmt;
use std::net::IpAddr;

use mesh_wire::{ContextKind, IcvExtension, TlvBlockContext, ICV_TLV_TYPE};
use tracing::{debug, info, warn};

use crate::policy::{KeyIdCheck, SignatureKey};
use crate::registry::SignatureRegistry;
use crate::rewrite::strip_signatures;
use crate::scratch::{PassState, SignatureScratch};

/// What gets dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropScope {
    /// The whole packet
    Packet,
    /// The current message
    Message,
}

impl From<ContextKind> for DropScope {
    fn from(kind: ContextKind) -> Self {
        match kind {
            ContextKind::Packet => DropScope::Packet,
            ContextKind::Message { .. } => DropScope::Message,
        }
    }
}

/// Why something gets dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A mandatory policy found no valid signature
    MissingSignature,
    /// A policy rejected the key id of a signature
    KeyIdRejected,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingSignature => write!(f, "missing or invalid signature"),
            DropReason::KeyIdRejected => write!(f, "key id rejected"),
        }
    }
}

/// Outcome of verifying one packet or message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep processing
    Accept,
    /// Discard
    Drop {
        /// Packet or message
        scope: DropScope,
        /// Cause
        reason: DropReason,
    },
}

impl Verdict {
    fn drop(kind: ContextKind, reason: DropReason) -> Self {
        Verdict::Drop {
            scope: kind.into(),
            reason,
        }
    }

    /// Whether processing continues
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// A signature TLV that passed the format checks
struct Candidate<'a> {
    key: SignatureKey,
    source_specific: bool,
    prefix: &'a [u8],
    key_id: &'a [u8],
    signature: &'a [u8],
}

fn parse_candidate<'a>(extension: u8, value: &'a [u8]) -> Option<Candidate<'a>> {
    let source_specific = match IcvExtension::try_from(extension) {
        Ok(IcvExtension::CryptHash) => false,
        Ok(IcvExtension::SrcSpecCryptHash) => true,
        _ => {
            info!("Signature TLV with unknown type extension {}", extension);
            return None;
        }
    };

    if value.len() < 4 {
        info!("Signature TLV too short: {} bytes", value.len());
        return None;
    }

    let key_id_len = value[2] as usize;
    if value.len() <= 3 + key_id_len {
        info!(
            "Signature TLV too short for key id: {} <= 3 + {}",
            value.len(),
            key_id_len
        );
        return None;
    }

    Some(Candidate {
        key: SignatureKey::new(value[0], value[1]),
        source_specific,
        prefix: &value[..3 + key_id_len],
        key_id: &value[3..3 + key_id_len],
        signature: &value[3 + key_id_len..],
    })
}

pub(crate) fn ip_octets(addr: IpAddr, dst: &mut [u8]) -> usize {
    match addr {
        IpAddr::V4(v4) => {
            dst[..4].copy_from_slice(&v4.octets());
            4
        }
        IpAddr::V6(v6) => {
            dst[..16].copy_from_slice(&v6.octets());
            16
        }
    }
}

impl SignatureRegistry {
    /// Check the signatures of a packet or message received from `source`.
    ///
    /// Every policy applicable to the content that is marked drop-if-invalid
    /// needs at least one valid signature, otherwise the content is dropped.
    pub fn verify(
        &self,
        ctx: &TlvBlockContext<'_>,
        source: Option<IpAddr>,
        scratch: &mut SignatureScratch,
    ) -> Verdict {
        let kind = ctx.kind();
        let SignatureScratch {
            signable,
            crypt: crypt_scratch,
            states,
            ..
        } = scratch;

        states.clear();
        states.extend(self.policies().map(|entry| {
            let applicable = entry.policy().applies_to(kind);
            PassState {
                applicable,
                must_be_verified: applicable && entry.policy().is_drop_if_invalid(),
                verified: false,
            }
        }));

        if !states.iter().any(|s| s.applicable) {
            return Verdict::Accept;
        }

        for tlv in ctx.tlvs_of_type(ICV_TLV_TYPE) {
            let Some(candidate) = parse_candidate(tlv.type_ext, ctx.value(tlv)) else {
                continue;
            };

            let mut idx = 0;
            if candidate.source_specific {
                match source {
                    Some(addr) => idx = ip_octets(addr, signable),
                    None => {
                        info!("Source specific signature without source address");
                        continue;
                    }
                }
            }
            signable[idx..idx + candidate.prefix.len()].copy_from_slice(candidate.prefix);
            idx += candidate.prefix.len();

            let stripped = match strip_signatures(ctx.buffer(), ctx.layout(), &mut signable[idx..]) {
                Ok(len) => len,
                Err(e) => {
                    info!("Cannot canonicalize content for verification: {}", e);
                    continue;
                }
            };
            let content = &signable[..idx + stripped];

            for (state, entry) in states.iter_mut().zip(self.policies()) {
                let policy = entry.policy();
                if policy.key() != candidate.key || !state.applicable {
                    continue;
                }

                if policy.is_source_specific() != candidate.source_specific {
                    info!(
                        "Signature policy '{}' source specific flag does not match TLV",
                        policy.name()
                    );
                    continue;
                }

                match policy.check_key_id(candidate.key_id) {
                    KeyIdCheck::Okay => {}
                    KeyIdCheck::Ignore => continue,
                    KeyIdCheck::Drop => {
                        info!(
                            "Signature policy '{}' rejected key id {}",
                            policy.name(),
                            hex::encode(candidate.key_id)
                        );
                        return Verdict::drop(kind, DropReason::KeyIdRejected);
                    }
                }

                let Some(resolved) = entry.resolved() else {
                    debug!(
                        "Signature policy '{}' is inactive, cannot verify",
                        policy.name()
                    );
                    continue;
                };

                let valid = match resolved.crypt.verify(
                    resolved.hash.as_ref(),
                    candidate.signature,
                    content,
                    crypt_scratch,
                ) {
                    Ok(valid) => valid,
                    Err(e) => {
                        warn!(
                            "Signature policy '{}' failed to verify: {}",
                            policy.name(),
                            e
                        );
                        false
                    }
                };
                debug!(
                    "Signature policy '{}' ({}) verified: {}",
                    policy.name(),
                    candidate.key,
                    valid
                );
                // last matching signature decides
                state.verified = valid;
            }
        }

        for (state, entry) in states.iter().zip(self.policies()) {
            if state.must_be_verified && !state.verified {
                info!(
                    "Dropping {:?}: no valid signature for policy '{}'",
                    kind,
                    entry.policy().name()
                );
                return Verdict::drop(kind, DropReason::MissingSignature);
            }
        }
        Verdict::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use bytes::Bytes;
    use mesh_wire::{MessageBuilder, RawTlv, MAX_PACKET_SIZE};

    use crate::algorithm::{CRYPT_HMAC, HASH_SHA256};
    use crate::builtin::{HmacCrypt, Sha256Hash};
    use crate::policy::{MessageTypeScope, SignaturePolicy};

    const HELLO: u8 = 1;
    const LOCAL: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const KIND: ContextKind = ContextKind::Message { msg_type: HELLO };

    fn registry(drop_if_invalid: bool) -> SignatureRegistry {
        let mut registry = SignatureRegistry::with_identity(MAX_PACKET_SIZE);
        registry.add_hash(Arc::new(Sha256Hash)).unwrap();
        registry
            .add_crypt(Arc::new(HmacCrypt::new(b"shared secret".to_vec())))
            .unwrap();
        registry.add_policy(Arc::new(
            SignaturePolicy::new(
                "hmac",
                SignatureKey::new(HASH_SHA256, CRYPT_HMAC),
                MessageTypeScope::messages([HELLO]),
            )
            .drop_if_invalid(drop_if_invalid),
        ));
        registry
    }

    fn hello(tlvs: Vec<RawTlv>) -> Bytes {
        let mut builder = MessageBuilder::new(HELLO, 4)
            .originator(&[10, 0, 0, 1])
            .hop_limit(255)
            .hop_count(0)
            .seqno(42)
            .body(Bytes::from(vec![0x5a; 26]));
        for tlv in tlvs {
            builder = builder.tlv(tlv);
        }
        builder.build().unwrap()
    }

    fn icv(extension: u8, value: &[u8]) -> RawTlv {
        RawTlv::with_ext(ICV_TLV_TYPE, extension, Some(value.to_vec()))
    }

    /// Value of the signature TLV the registry produces for an unsigned hello
    fn valid_signature(registry: &SignatureRegistry) -> Vec<u8> {
        let msg = hello(Vec::new());
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        buf[..msg.len()].copy_from_slice(&msg);
        let len = registry
            .sign(&LOCAL, KIND, &mut buf, msg.len(), &mut SignatureScratch::default())
            .unwrap();
        let ctx = TlvBlockContext::message(&buf[..len]).unwrap();
        let tlv = ctx.tlvs_of_type(ICV_TLV_TYPE).next().unwrap();
        ctx.value(tlv).to_vec()
    }

    fn verify(registry: &SignatureRegistry, msg: &[u8]) -> Verdict {
        let ctx = TlvBlockContext::message(msg).unwrap();
        registry.verify(&ctx, None, &mut SignatureScratch::default())
    }

    #[test]
    fn test_parse_candidate_layout() {
        let value = [HASH_SHA256, CRYPT_HMAC, 2, 0xaa, 0xbb, 1, 2, 3];
        let candidate = parse_candidate(IcvExtension::CryptHash as u8, &value).unwrap();
        assert_eq!(candidate.key, SignatureKey::new(HASH_SHA256, CRYPT_HMAC));
        assert!(!candidate.source_specific);
        assert_eq!(candidate.prefix, &value[..5]);
        assert_eq!(candidate.key_id, &[0xaa, 0xbb]);
        assert_eq!(candidate.signature, &[1, 2, 3]);

        let candidate = parse_candidate(IcvExtension::SrcSpecCryptHash as u8, &value).unwrap();
        assert!(candidate.source_specific);
    }

    #[test]
    fn test_parse_candidate_rejects_malformed_values() {
        let ext = IcvExtension::CryptHash as u8;
        assert!(parse_candidate(9, &[HASH_SHA256, CRYPT_HMAC, 0, 1, 2]).is_none());
        assert!(parse_candidate(ext, &[HASH_SHA256, CRYPT_HMAC]).is_none());
        assert!(parse_candidate(ext, &[HASH_SHA256, CRYPT_HMAC, 0]).is_none());
        // key id fills the value, nothing left for the signature
        assert!(parse_candidate(ext, &[HASH_SHA256, CRYPT_HMAC, 2, 0xaa, 0xbb]).is_none());
        assert!(parse_candidate(ext, &[HASH_SHA256, CRYPT_HMAC, 8, 0xaa, 0xbb]).is_none());
        assert!(parse_candidate(ext, &[HASH_SHA256, CRYPT_HMAC, 0, 1]).is_some());
    }

    #[test]
    fn test_malformed_signature_tlvs_ignored() {
        let malformed = || {
            vec![
                icv(IcvExtension::CryptHash as u8, &[HASH_SHA256, CRYPT_HMAC]),
                icv(9, &[HASH_SHA256, CRYPT_HMAC, 0, 1, 2, 3]),
                icv(IcvExtension::CryptHash as u8, &[HASH_SHA256, CRYPT_HMAC, 8, 1, 2]),
            ]
        };
        let msg = hello(malformed());

        assert_eq!(verify(&registry(false), &msg), Verdict::Accept);
        assert_eq!(
            verify(&registry(true), &msg),
            Verdict::Drop {
                scope: DropScope::Message,
                reason: DropReason::MissingSignature
            }
        );

        let registry = registry(true);
        let mut tlvs = malformed();
        tlvs.push(icv(IcvExtension::CryptHash as u8, &valid_signature(&registry)));
        assert_eq!(verify(&registry, &hello(tlvs)), Verdict::Accept);
    }

    #[test]
    fn test_last_matching_signature_decides() {
        let registry = registry(true);
        let valid = valid_signature(&registry);
        let mut tampered = valid.clone();
        if let Some(last) = tampered.last_mut() {
            *last ^= 0xff;
        }
        let ext = IcvExtension::CryptHash as u8;

        let msg = hello(vec![icv(ext, &valid)]);
        assert_eq!(verify(&registry, &msg), Verdict::Accept);

        let msg = hello(vec![icv(ext, &valid), icv(ext, &tampered)]);
        assert_eq!(
            verify(&registry, &msg),
            Verdict::Drop {
                scope: DropScope::Message,
                reason: DropReason::MissingSignature
            }
        );

        let msg = hello(vec![icv(ext, &tampered), icv(ext, &valid)]);
        assert_eq!(verify(&registry, &msg), Verdict::Accept);
    }

    #[test]
    fn test_unsigned_content_without_applicable_policy_accepted() {
        let registry = registry(true);
        let msg = MessageBuilder::new(HELLO + 1, 4).build().unwrap();
        assert_eq!(verify(&registry, &msg), Verdict::Accept);
    }
}
