//! Hash and crypt function slots and their registry.
//!
//! An RFC7182 signature is `crypt(hash(content))`. Both halves are looked up
//! by their one-byte id, so a policy naming an id that is not registered yet
//! simply stays inactive until the function shows up.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{debug, info};

use crate::builtin::{IdentityCrypt, IdentityHash};
use crate::SignatureError;

/// RFC7182 hash function id of the identity hash
pub const HASH_IDENTITY: u8 = 0;
/// RFC7182 hash function id of SHA-256
pub const HASH_SHA256: u8 = 3;
/// RFC7182 crypt function id of the identity crypt
pub const CRYPT_IDENTITY: u8 = 0;
/// RFC7182 crypt function id of HMAC
pub const CRYPT_HMAC: u8 = 3;

/// A hash function slot
pub trait HashAlgorithm: Send + Sync + fmt::Debug {
    /// RFC7182 hash function id
    fn id(&self) -> u8;

    /// Largest digest this function produces
    fn output_size(&self) -> usize;

    /// Hash `src` into `dst`, returning the digest length
    fn hash(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, SignatureError>;
}

/// A crypt function slot, applied on top of a hash function
pub trait CryptAlgorithm: Send + Sync + fmt::Debug {
    /// RFC7182 crypt function id
    fn id(&self) -> u8;

    /// Largest signature this function produces together with `hash`
    fn max_size(&self, hash: &dyn HashAlgorithm) -> usize;

    /// Sign `src` into `dst`, returning the signature length
    fn crypt(
        &self,
        hash: &dyn HashAlgorithm,
        src: &[u8],
        dst: &mut [u8],
    ) -> Result<usize, SignatureError>;

    /// Check `signature` against `src`.
    ///
    /// `Ok(false)` means the signatures differ, `Err` that the local
    /// transform itself failed. The default re-signs `src` into `scratch`
    /// and compares length, then content.
    fn verify(
        &self,
        hash: &dyn HashAlgorithm,
        signature: &[u8],
        src: &[u8],
        scratch: &mut [u8],
    ) -> Result<bool, SignatureError> {
        let len = self.crypt(hash, src, scratch)?;

        if len != signature.len() {
            info!(
                "Signature has wrong length: {} != {}",
                len,
                signature.len()
            );
            return Ok(false);
        }

        let equal: bool = scratch[..len].ct_eq(signature).into();
        if !equal {
            debug!("Received signature: {}", hex::encode(signature));
            debug!("Expected signature: {}", hex::encode(&scratch[..len]));
        }
        Ok(equal)
    }
}

/// Registry of hash and crypt functions keyed by id
#[derive(Debug, Default, Clone)]
pub struct AlgorithmRegistry {
    hashes: BTreeMap<u8, Arc<dyn HashAlgorithm>>,
    crypts: BTreeMap<u8, Arc<dyn CryptAlgorithm>>,
}

impl AlgorithmRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the identity hash and crypt functions
    pub fn with_identity(max_packet_size: usize) -> Self {
        let mut registry = Self::new();
        registry
            .hashes
            .insert(HASH_IDENTITY, Arc::new(IdentityHash::new(max_packet_size)));
        registry.crypts.insert(CRYPT_IDENTITY, Arc::new(IdentityCrypt));
        registry
    }

    /// Register a hash function, failing if the id is taken
    pub fn add_hash(&mut self, hash: Arc<dyn HashAlgorithm>) -> Result<(), SignatureError> {
        let id = hash.id();
        if self.hashes.contains_key(&id) {
            return Err(SignatureError::DuplicateHash(id));
        }
        debug!("Registered hash function {}", id);
        self.hashes.insert(id, hash);
        Ok(())
    }

    /// Unregister a hash function
    pub fn remove_hash(&mut self, id: u8) -> Option<Arc<dyn HashAlgorithm>> {
        self.hashes.remove(&id)
    }

    /// Look up a hash function
    pub fn hash(&self, id: u8) -> Option<&Arc<dyn HashAlgorithm>> {
        self.hashes.get(&id)
    }

    /// Register a crypt function, failing if the id is taken
    pub fn add_crypt(&mut self, crypt: Arc<dyn CryptAlgorithm>) -> Result<(), SignatureError> {
        let id = crypt.id();
        if self.crypts.contains_key(&id) {
            return Err(SignatureError::DuplicateCrypt(id));
        }
        debug!("Registered crypt function {}", id);
        self.crypts.insert(id, crypt);
        Ok(())
    }

    /// Unregister a crypt function
    pub fn remove_crypt(&mut self, id: u8) -> Option<Arc<dyn CryptAlgorithm>> {
        self.crypts.remove(&id)
    }

    /// Look up a crypt function
    pub fn crypt(&self, id: u8) -> Option<&Arc<dyn CryptAlgorithm>> {
        self.crypts.get(&id)
    }

    /// Registered hash ids in ascending order
    pub fn hash_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.hashes.keys().copied()
    }

    /// Registered crypt ids in ascending order
    pub fn crypt_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.crypts.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::Sha256Hash;

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut registry = AlgorithmRegistry::new();
        registry.add_hash(Arc::new(IdentityHash::default())).unwrap();
        registry.add_crypt(Arc::new(IdentityCrypt)).unwrap();

        assert!(matches!(
            registry.add_hash(Arc::new(IdentityHash::default())),
            Err(SignatureError::DuplicateHash(HASH_IDENTITY))
        ));
        assert!(matches!(
            registry.add_crypt(Arc::new(IdentityCrypt)),
            Err(SignatureError::DuplicateCrypt(CRYPT_IDENTITY))
        ));
    }

    #[test]
    fn test_with_identity_registers_both_halves() {
        let mut registry = AlgorithmRegistry::with_identity(1000);
        assert_eq!(registry.hash(HASH_IDENTITY).map(|h| h.id()), Some(HASH_IDENTITY));
        assert_eq!(registry.crypt(CRYPT_IDENTITY).map(|c| c.id()), Some(CRYPT_IDENTITY));
        assert_eq!(
            registry.hash(HASH_IDENTITY).map(|h| h.output_size()),
            Some(1000 + crate::scratch::SIGNABLE_OVERHEAD)
        );

        assert!(matches!(
            registry.add_hash(Arc::new(IdentityHash::default())),
            Err(SignatureError::DuplicateHash(HASH_IDENTITY))
        ));
        assert!(matches!(
            registry.add_crypt(Arc::new(IdentityCrypt)),
            Err(SignatureError::DuplicateCrypt(CRYPT_IDENTITY))
        ));
    }

    #[test]
    fn test_lookup_and_remove() {
        let mut registry = AlgorithmRegistry::new();
        registry.add_hash(Arc::new(Sha256Hash)).unwrap();

        assert_eq!(registry.hash(HASH_SHA256).map(|h| h.id()), Some(HASH_SHA256));
        assert!(registry.hash(HASH_IDENTITY).is_none());

        assert!(registry.remove_hash(HASH_SHA256).is_some());
        assert!(registry.hash(HASH_SHA256).is_none());
        assert!(registry.remove_hash(HASH_SHA256).is_none());
    }

    #[test]
    fn test_default_verify_separates_mismatch_from_failure() {
        let hash = IdentityHash::default();
        let crypt = IdentityCrypt;
        let mut scratch = vec![0u8; 64];

        assert!(crypt.verify(&hash, b"abc", b"abc", &mut scratch).unwrap());
        assert!(!crypt.verify(&hash, b"abd", b"abc", &mut scratch).unwrap());
        assert!(!crypt.verify(&hash, b"ab", b"abc", &mut scratch).unwrap());

        // scratch too small for the local signature: transform failure
        let mut tiny = [0u8; 2];
        assert!(crypt.verify(&hash, b"abc", b"abc", &mut tiny).is_err());
    }
}
