//! RFC7182 signatures for mesh packets and messages.
//!
//! Policies pair a hash function with a crypt function and decide which
//! packets and messages they cover. Outgoing content is signed by every
//! active policy in registry order; incoming content is accepted only if
//! each applicable mandatory policy finds at least one valid signature.
//!
//! Signatures are computed over a canonical form of the content: hop limit
//! and hop count zeroed and all ICV TLVs removed from the first TLV block,
//! prefixed by the hash id, crypt id and key id of the signature (and the
//! source address for source specific signatures).
//!
//! ## Example
//!
//! ```ignore
//! let mut registry = SignatureRegistry::with_identity(MAX_PACKET_SIZE);
//! registry.add_hash(Arc::new(Sha256Hash))?;
//! registry.add_crypt(Arc::new(HmacCrypt::new(secret)))?;
//! registry.add_policy(Arc::new(
//!     SignaturePolicy::new("hello", SignatureKey::new(3, 3), MessageTypeScope::messages([1]))
//!         .drop_if_invalid(true),
//! ));
//!
//! let mut scratch = SignatureScratch::new(MAX_PACKET_SIZE);
//! let len = registry.sign(&local_addr, kind, &mut buf, len, &mut scratch)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithm;
pub mod builtin;
pub mod error;
pub mod policy;
pub mod registry;
pub mod rewrite;
pub mod scratch;
pub mod sign;
pub mod verify;

// Re-export main types
pub use algorithm::{
    AlgorithmRegistry, CryptAlgorithm, HashAlgorithm, CRYPT_HMAC, CRYPT_IDENTITY, HASH_IDENTITY,
    HASH_SHA256,
};
pub use builtin::{HmacCrypt, IdentityCrypt, IdentityHash, Sha256Hash};
pub use error::SignatureError;
pub use policy::{KeyIdCheck, MessageTypeScope, SignatureKey, SignaturePolicy, SignatureScope};
pub use registry::{PolicyHandle, Postprocessor, RegisteredPolicy, SignatureRegistry};
pub use rewrite::{splice_signature, strip_signatures, SignatureTlv};
pub use scratch::{SignatureScratch, SIGNABLE_OVERHEAD};
pub use sign::OutboundTarget;
pub use verify::{DropReason, DropScope, Verdict};
